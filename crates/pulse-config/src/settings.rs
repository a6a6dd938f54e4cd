use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::ConfigError;

/// 监控参数
///
/// 默认值与最初的 Python 版本保持一致。
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MonitorSettings {
    /// 每次 ping 检查的最大尝试次数
    #[serde(default = "default_ping_attempts")]
    pub ping_attempts: u32,

    /// ping 尝试之间的间隔（毫秒）
    #[serde(default = "default_ping_delay_ms")]
    pub ping_delay_ms: u64,

    /// 单次 ping 超时（秒）
    #[serde(default = "default_ping_timeout_secs")]
    pub ping_timeout_secs: u64,

    /// HTTP 请求超时（秒）
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// 连续失败多少次判定为宕机
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// 连续成功多少次判定为恢复（1 表示立即恢复）
    #[serde(default = "default_recovery_threshold")]
    pub recovery_threshold: u32,

    /// 仪表盘刷新间隔（秒）
    #[serde(default = "default_update_interval_secs")]
    pub update_interval_secs: u64,

    /// 探测间隔（秒），未设置时与仪表盘刷新间隔一致
    #[serde(default)]
    pub probe_interval_secs: Option<u64>,

    /// 高延迟告警冷却时间（分钟）
    #[serde(default = "default_slow_alert_cooldown_minutes")]
    pub slow_alert_cooldown_minutes: u64,

    /// 默认延迟阈值（毫秒）
    #[serde(default = "default_latency_threshold_ms")]
    pub default_latency_threshold_ms: u64,

    /// 最大并发探测数
    #[serde(default = "default_max_concurrent_probes")]
    pub max_concurrent_probes: usize,

    /// 仪表盘展示的最近事件数量
    #[serde(default = "default_recent_incident_limit")]
    pub recent_incident_limit: usize,
}

impl MonitorSettings {
    /// 校验参数
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ping_attempts == 0 {
            return Err(ConfigError::out_of_range("ping_attempts", self.ping_attempts, 1));
        }
        if self.ping_timeout_secs == 0 {
            return Err(ConfigError::out_of_range("ping_timeout_secs", self.ping_timeout_secs, 1));
        }
        if self.http_timeout_secs == 0 {
            return Err(ConfigError::out_of_range("http_timeout_secs", self.http_timeout_secs, 1));
        }
        if self.failure_threshold == 0 {
            return Err(ConfigError::out_of_range("failure_threshold", self.failure_threshold, 1));
        }
        if self.recovery_threshold == 0 {
            return Err(ConfigError::out_of_range("recovery_threshold", self.recovery_threshold, 1));
        }
        if self.update_interval_secs == 0 {
            return Err(ConfigError::out_of_range(
                "update_interval_secs",
                self.update_interval_secs,
                1,
            ));
        }
        if self.probe_interval_secs == Some(0) {
            return Err(ConfigError::out_of_range("probe_interval_secs", 0, 1));
        }
        if self.default_latency_threshold_ms == 0 {
            return Err(ConfigError::out_of_range(
                "default_latency_threshold_ms",
                self.default_latency_threshold_ms,
                1,
            ));
        }
        if self.max_concurrent_probes == 0 {
            return Err(ConfigError::out_of_range(
                "max_concurrent_probes",
                self.max_concurrent_probes,
                1,
            ));
        }
        Ok(())
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_secs)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs.unwrap_or(self.update_interval_secs))
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn ping_delay(&self) -> Duration {
        Duration::from_millis(self.ping_delay_ms)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_secs(self.ping_timeout_secs)
    }

    /// 单个目标一次完整探测的上限时间
    pub fn probe_deadline(&self) -> Duration {
        let ping_budget = (self.ping_timeout() + self.ping_delay()) * self.ping_attempts;
        ping_budget.max(self.http_timeout()) + Duration::from_secs(1)
    }

    pub fn slow_alert_cooldown(&self) -> Duration {
        Duration::from_secs(self.slow_alert_cooldown_minutes * 60)
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            ping_attempts: default_ping_attempts(),
            ping_delay_ms: default_ping_delay_ms(),
            ping_timeout_secs: default_ping_timeout_secs(),
            http_timeout_secs: default_http_timeout_secs(),
            failure_threshold: default_failure_threshold(),
            recovery_threshold: default_recovery_threshold(),
            update_interval_secs: default_update_interval_secs(),
            probe_interval_secs: None,
            slow_alert_cooldown_minutes: default_slow_alert_cooldown_minutes(),
            default_latency_threshold_ms: default_latency_threshold_ms(),
            max_concurrent_probes: default_max_concurrent_probes(),
            recent_incident_limit: default_recent_incident_limit(),
        }
    }
}

// 默认值函数
fn default_ping_attempts() -> u32 {
    3
}

fn default_ping_delay_ms() -> u64 {
    500
}

fn default_ping_timeout_secs() -> u64 {
    2
}

fn default_http_timeout_secs() -> u64 {
    5
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_recovery_threshold() -> u32 {
    1
}

fn default_update_interval_secs() -> u64 {
    10
}

fn default_slow_alert_cooldown_minutes() -> u64 {
    30
}

fn default_latency_threshold_ms() -> u64 {
    100
}

fn default_max_concurrent_probes() -> usize {
    16
}

fn default_recent_incident_limit() -> usize {
    10
}
