use chrono::{DateTime, Utc};
use pulse_config::MonitorSettings;
use pulse_types::{CheckResult, HealthStatus, ProbeErrorKind};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::events::HealthEvent;

/// 状态切换所需的连续次数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthPolicy {
    pub failure_threshold: u32,
    pub recovery_threshold: u32,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            recovery_threshold: 1,
        }
    }
}

impl From<&MonitorSettings> for HealthPolicy {
    fn from(settings: &MonitorSettings) -> Self {
        Self {
            failure_threshold: settings.failure_threshold.max(1),
            recovery_threshold: settings.recovery_threshold.max(1),
        }
    }
}

/// 单个目标的健康记录
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HealthRecord {
    pub status: HealthStatus,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    /// 最近一次成功检查的延迟，失败时清空
    pub last_latency_ms: Option<f64>,
    pub last_error: Option<ProbeErrorKind>,
    pub last_checked: Option<DateTime<Utc>>,
    pub last_change: Option<DateTime<Utc>>,
    /// 当前连续失败中第一次失败的时间
    pub failing_since: Option<DateTime<Utc>>,
}

/// 健康状态机
///
/// UP 为初始状态。失败需连续达到 `failure_threshold` 才进入 DOWN，
/// 恢复需连续成功 `recovery_threshold` 次。延迟超过阈值时进入 DEGRADED，
/// 同一次越限只产生一次事件。
#[derive(Debug, Default)]
pub struct HealthTracker {
    records: HashMap<String, HealthRecord>,
}

impl HealthTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 为新目标建立初始记录
    pub fn ensure(&mut self, target: &str) {
        self.records.entry(target.to_string()).or_default();
    }

    pub fn remove(&mut self, target: &str) -> Option<HealthRecord> {
        self.records.remove(target)
    }

    pub fn get(&self, target: &str) -> Option<&HealthRecord> {
        self.records.get(target)
    }

    pub fn records(&self) -> &HashMap<String, HealthRecord> {
        &self.records
    }

    /// 处理一次检查结果，返回产生的状态迁移事件
    pub fn apply(
        &mut self,
        result: &CheckResult,
        threshold_ms: u64,
        policy: HealthPolicy,
    ) -> Vec<HealthEvent> {
        let now = result.checked_at;
        let name = result.target.as_str();
        let record = self.records.entry(name.to_string()).or_default();
        let mut events = Vec::new();

        record.last_checked = Some(now);

        if result.success {
            let latency_ms = result.latency_ms.unwrap_or_default();
            let slow = latency_ms > threshold_ms as f64;

            record.last_latency_ms = Some(latency_ms);
            record.last_error = None;
            record.consecutive_failures = 0;
            record.consecutive_successes = record.consecutive_successes.saturating_add(1);

            match record.status {
                HealthStatus::Down => {
                    if record.consecutive_successes >= policy.recovery_threshold {
                        info!(service = %name, latency_ms, "Service recovered");
                        events.push(HealthEvent::Recovered {
                            target: name.to_string(),
                            at: now,
                            latency_ms: Some(latency_ms),
                        });
                        record.last_change = Some(now);

                        if slow {
                            record.status = HealthStatus::Degraded;
                            events.push(Self::degraded(name, now, latency_ms, threshold_ms));
                        } else {
                            record.status = HealthStatus::Up;
                        }
                    } else {
                        debug!(
                            service = %name,
                            successes = record.consecutive_successes,
                            required = policy.recovery_threshold,
                            "Recovery pending"
                        );
                    }
                }
                HealthStatus::Up if slow => {
                    record.status = HealthStatus::Degraded;
                    record.last_change = Some(now);
                    events.push(Self::degraded(name, now, latency_ms, threshold_ms));
                }
                HealthStatus::Degraded if !slow => {
                    record.status = HealthStatus::Up;
                    record.last_change = Some(now);
                    info!(service = %name, latency_ms, "Latency back within threshold");
                    events.push(HealthEvent::LatencyRecovered {
                        target: name.to_string(),
                        at: now,
                        latency_ms,
                    });
                }
                _ => {}
            }

            if record.status != HealthStatus::Down {
                record.failing_since = None;
            }
        } else {
            record.last_latency_ms = None;
            record.last_error = result.error.clone();
            record.consecutive_successes = 0;
            record.consecutive_failures = record.consecutive_failures.saturating_add(1);
            let since = *record.failing_since.get_or_insert(now);

            if record.consecutive_failures >= policy.failure_threshold
                && record.status != HealthStatus::Down
            {
                record.status = HealthStatus::Down;
                record.last_change = Some(now);
                warn!(
                    service = %name,
                    failures = record.consecutive_failures,
                    error = ?result.error,
                    "Service went down"
                );
                events.push(HealthEvent::WentDown {
                    target: name.to_string(),
                    at: now,
                    since,
                    failures: record.consecutive_failures,
                    error: result.error.clone(),
                });
            } else {
                debug!(
                    service = %name,
                    failures = record.consecutive_failures,
                    status = %record.status,
                    "Check failed"
                );
            }
        }

        events
    }

    fn degraded(name: &str, at: DateTime<Utc>, latency_ms: f64, threshold_ms: u64) -> HealthEvent {
        warn!(service = %name, latency_ms, threshold_ms, "Latency above threshold");
        HealthEvent::DegradedLatency {
            target: name.to_string(),
            at,
            latency_ms,
            threshold_ms,
        }
    }
}
