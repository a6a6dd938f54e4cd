use serde::{Deserialize, Serialize};
use std::fmt;

/// 目标健康状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    #[default]
    Up,
    Down,
    /// 在线但延迟超过阈值
    Degraded,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Up => "Up",
            HealthStatus::Down => "Down",
            HealthStatus::Degraded => "Degraded",
        }
    }

    pub fn is_down(&self) -> bool {
        matches!(self, HealthStatus::Down)
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
