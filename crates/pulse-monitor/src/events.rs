use chrono::{DateTime, Utc};
use pulse_types::ProbeErrorKind;
use serde::Serialize;

/// 健康状态机产生的状态迁移事件
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HealthEvent {
    /// 连续失败达到阈值
    WentDown {
        target: String,
        at: DateTime<Utc>,
        /// 本轮连续失败中第一次失败的时间
        since: DateTime<Utc>,
        failures: u32,
        error: Option<ProbeErrorKind>,
    },
    /// 从 DOWN 恢复
    Recovered {
        target: String,
        at: DateTime<Utc>,
        latency_ms: Option<f64>,
    },
    /// 延迟超过阈值
    DegradedLatency {
        target: String,
        at: DateTime<Utc>,
        latency_ms: f64,
        threshold_ms: u64,
    },
    /// 延迟回到阈值以内
    LatencyRecovered {
        target: String,
        at: DateTime<Utc>,
        latency_ms: f64,
    },
}

impl HealthEvent {
    pub fn target(&self) -> &str {
        match self {
            HealthEvent::WentDown { target, .. }
            | HealthEvent::Recovered { target, .. }
            | HealthEvent::DegradedLatency { target, .. }
            | HealthEvent::LatencyRecovered { target, .. } => target,
        }
    }

    pub fn at(&self) -> DateTime<Utc> {
        match self {
            HealthEvent::WentDown { at, .. }
            | HealthEvent::Recovered { at, .. }
            | HealthEvent::DegradedLatency { at, .. }
            | HealthEvent::LatencyRecovered { at, .. } => *at,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            HealthEvent::WentDown { .. } => "went_down",
            HealthEvent::Recovered { .. } => "recovered",
            HealthEvent::DegradedLatency { .. } => "degraded_latency",
            HealthEvent::LatencyRecovered { .. } => "latency_recovered",
        }
    }
}
