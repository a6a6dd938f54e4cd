use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 探测失败原因
///
/// 网络层面的失败都通过 `CheckResult` 表达，不会作为错误向上传播。
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ProbeErrorKind {
    /// 请求超时
    #[error("probe timed out")]
    Timeout,

    /// 连接失败
    #[error("connection failed")]
    ConnectionFailed,

    /// HTTP 状态码不符合预期
    #[error("unexpected HTTP status {0}")]
    UnexpectedStatus(u16),

    /// 所有 ping 尝试均失败
    #[error("host unreachable")]
    Unreachable,

    /// 目标配置无效（不计入失败次数）
    #[error("invalid target: {0}")]
    InvalidTarget(String),
}

impl ProbeErrorKind {
    /// 是否为目标配置问题，而不是服务本身的故障
    pub fn is_invalid_target(&self) -> bool {
        matches!(self, ProbeErrorKind::InvalidTarget(_))
    }
}

/// 单次检查结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    /// 目标名称
    pub target: String,

    pub success: bool,

    /// 往返延迟（毫秒）
    pub latency_ms: Option<f64>,

    pub error: Option<ProbeErrorKind>,

    pub checked_at: DateTime<Utc>,
}

impl CheckResult {
    pub fn up(target: impl Into<String>, latency_ms: f64) -> Self {
        Self {
            target: target.into(),
            success: true,
            latency_ms: Some(latency_ms),
            error: None,
            checked_at: Utc::now(),
        }
    }

    pub fn down(target: impl Into<String>, error: ProbeErrorKind) -> Self {
        Self {
            target: target.into(),
            success: false,
            latency_ms: None,
            error: Some(error),
            checked_at: Utc::now(),
        }
    }

    pub fn at(mut self, checked_at: DateTime<Utc>) -> Self {
        self.checked_at = checked_at;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_serialization() {
        let json = serde_json::to_string(&ProbeErrorKind::UnexpectedStatus(503)).unwrap();
        assert_eq!(json, r#"{"kind":"unexpected_status","detail":503}"#);

        let json = serde_json::to_string(&ProbeErrorKind::Timeout).unwrap();
        assert_eq!(json, r#"{"kind":"timeout"}"#);
    }

    #[test]
    fn test_down_result_has_no_latency() {
        let result = CheckResult::down("db", ProbeErrorKind::Unreachable);
        assert!(!result.success);
        assert!(result.latency_ms.is_none());
        assert!(!result.error.as_ref().unwrap().is_invalid_target());
    }
}
