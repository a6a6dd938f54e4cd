use serde::{Deserialize, Serialize};
use std::fmt;

/// 监控目标类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    /// HTTP(S) 站点，发起 GET 检查
    Website,
    /// 主机/服务器，使用 ping 检查
    Server,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Website => "website",
            TargetKind::Server => "server",
        }
    }

    /// 未指定分类时仪表盘使用的默认分组
    pub fn default_category(&self) -> &'static str {
        match self {
            TargetKind::Website => "Websites",
            TargetKind::Server => "Servers",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 监控目标
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// 目标名称（全局唯一）
    pub name: String,

    /// 目标类型
    pub kind: TargetKind,

    /// URL 或主机地址
    pub address: String,

    /// 延迟阈值（毫秒），未设置时使用全局默认值
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_threshold_ms: Option<u64>,

    /// 仪表盘分组
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// 期望的 HTTP 状态码（仅 website），未设置时任何 2xx 都视为成功
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_status: Option<u16>,
}

impl Target {
    /// 创建站点目标，名称默认使用 URL
    pub fn website(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            name: url.clone(),
            kind: TargetKind::Website,
            address: url,
            latency_threshold_ms: None,
            category: None,
            expected_status: None,
        }
    }

    /// 创建服务器目标
    pub fn server(name: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: TargetKind::Server,
            address: host.into(),
            latency_threshold_ms: None,
            category: None,
            expected_status: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_threshold(mut self, threshold_ms: u64) -> Self {
        self.latency_threshold_ms = Some(threshold_ms);
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_expected_status(mut self, status: u16) -> Self {
        self.expected_status = Some(status);
        self
    }

    /// 仪表盘分组名
    pub fn category_name(&self) -> &str {
        self.category
            .as_deref()
            .unwrap_or_else(|| self.kind.default_category())
    }

    /// 生效的延迟阈值
    pub fn effective_threshold(&self, default_ms: u64) -> u64 {
        self.latency_threshold_ms.unwrap_or(default_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_website_uses_url_as_name() {
        let target = Target::website("https://example.com");
        assert_eq!(target.name, "https://example.com");
        assert_eq!(target.kind, TargetKind::Website);
        assert_eq!(target.category_name(), "Websites");
    }

    #[test]
    fn test_effective_threshold() {
        let target = Target::server("Edge Router", "203.0.113.10");
        assert_eq!(target.effective_threshold(100), 100);

        let target = target.with_threshold(60);
        assert_eq!(target.effective_threshold(100), 60);
    }

    #[test]
    fn test_deserialize_kind_lowercase() {
        let target: Target = serde_json::from_str(
            r#"{"name":"db","kind":"server","address":"10.0.0.5","category":"Core"}"#,
        )
        .unwrap();
        assert_eq!(target.kind, TargetKind::Server);
        assert_eq!(target.category_name(), "Core");
        assert!(target.latency_threshold_ms.is_none());
    }
}
