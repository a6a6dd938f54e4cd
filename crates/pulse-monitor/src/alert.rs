use chrono::{DateTime, Duration, Utc};
use pulse_notify::{NotificationSink, NotifyMessage, Recipient};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::events::HealthEvent;
use crate::incident::{format_duration, Incident};

/// 告警类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Down,
    Degraded,
    Recovered,
}

/// 待投递的告警
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub kind: AlertKind,
    pub target: String,
    /// 广播消息
    pub message: NotifyMessage,
    /// 发给接收人的私信，仅 DOWN 告警有
    pub direct: Option<NotifyMessage>,
}

/// 一次告警投递的结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub broadcast: bool,
    pub delivered: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// 告警分发器
///
/// 维护 (目标, 告警类型) 的最后发送时间。DOWN 告警总是发送，
/// 慢响应告警在冷却期内被抑制，恢复时清空该目标的冷却记录。
#[derive(Debug)]
pub struct AlertDispatcher {
    cooldown: Duration,
    last_sent: HashMap<(String, AlertKind), DateTime<Utc>>,
}

impl AlertDispatcher {
    pub fn new(cooldown: std::time::Duration) -> Self {
        Self {
            cooldown: Self::to_chrono(cooldown),
            last_sent: HashMap::new(),
        }
    }

    fn to_chrono(cooldown: std::time::Duration) -> Duration {
        Duration::from_std(cooldown).unwrap_or_else(|_| Duration::days(365))
    }

    /// 配置热更新时调整冷却时间，已有记录保留
    pub fn set_cooldown(&mut self, cooldown: std::time::Duration) {
        self.cooldown = Self::to_chrono(cooldown);
    }

    pub fn last_sent(&self, target: &str, kind: AlertKind) -> Option<DateTime<Utc>> {
        self.last_sent.get(&(target.to_string(), kind)).copied()
    }

    /// 清除目标的所有冷却记录
    pub fn forget(&mut self, target: &str) {
        self.last_sent.retain(|(name, _), _| name != target);
    }

    fn record(&mut self, target: &str, kind: AlertKind, at: DateTime<Utc>) {
        self.last_sent.insert((target.to_string(), kind), at);
    }

    fn in_cooldown(&self, target: &str, kind: AlertKind, at: DateTime<Utc>) -> bool {
        self.last_sent(target, kind)
            .map(|last| at - last < self.cooldown)
            .unwrap_or(false)
    }

    /// 根据状态事件决定是否产生告警
    ///
    /// `incident` 为事件关联的故障记录，用于恢复消息中的停机时长。
    pub fn evaluate(&mut self, event: &HealthEvent, incident: Option<&Incident>) -> Option<Alert> {
        match event {
            HealthEvent::WentDown {
                target,
                at,
                since,
                failures,
                error,
            } => {
                self.record(target, AlertKind::Down, *at);

                let reason = error
                    .as_ref()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "no response".to_string());
                let message = NotifyMessage::critical(
                    format!("{} is DOWN", target),
                    format!(
                        "{} consecutive failed checks since {} ({})",
                        failures,
                        since.format("%Y-%m-%d %H:%M:%S UTC"),
                        reason
                    ),
                )
                .with_target(target)
                .with_timestamp(*at);

                let direct = NotifyMessage::critical(
                    format!("{} is DOWN", target),
                    format!("The following service is experiencing issues: {}", target),
                )
                .with_target(target)
                .with_timestamp(*at);

                Some(Alert {
                    kind: AlertKind::Down,
                    target: target.clone(),
                    message,
                    direct: Some(direct),
                })
            }
            HealthEvent::DegradedLatency {
                target,
                at,
                latency_ms,
                threshold_ms,
            } => {
                if self.in_cooldown(target, AlertKind::Degraded, *at) {
                    debug!(service = %target, latency_ms, "Slow response alert suppressed by cooldown");
                    return None;
                }
                self.record(target, AlertKind::Degraded, *at);

                let message = NotifyMessage::warning(
                    format!("{} is responding slowly", target),
                    format!(
                        "Latency {:.0} ms exceeds the {} ms threshold",
                        latency_ms, threshold_ms
                    ),
                )
                .with_target(target)
                .with_timestamp(*at);

                Some(Alert {
                    kind: AlertKind::Degraded,
                    target: target.clone(),
                    message,
                    direct: None,
                })
            }
            HealthEvent::Recovered { target, at, .. } => {
                self.forget(target);

                let content = match incident.and_then(|i| i.downtime()) {
                    Some(downtime) => format!("Restored - Downtime: {}", format_duration(downtime)),
                    None => "Restored".to_string(),
                };
                let message = NotifyMessage::info(format!("{} is back UP", target), content)
                    .with_target(target)
                    .with_timestamp(*at);

                Some(Alert {
                    kind: AlertKind::Recovered,
                    target: target.clone(),
                    message,
                    direct: None,
                })
            }
            HealthEvent::LatencyRecovered { .. } => None,
        }
    }

    /// 投递告警：广播一次，然后逐个发送私信
    ///
    /// 机器人和关闭私信的接收人在这里过滤掉。单个接收人失败只记录日志。
    pub async fn deliver(
        alert: &Alert,
        sink: &dyn NotificationSink,
        recipients: &[Recipient],
    ) -> DeliveryReport {
        let mut report = DeliveryReport::default();

        match sink.send_broadcast(&alert.message).await {
            Ok(()) => report.broadcast = true,
            Err(e) => warn!(
                service = %alert.target,
                kind = ?alert.kind,
                notifier = sink.name(),
                error = %e,
                "Alert broadcast failed"
            ),
        }

        if let Some(direct) = &alert.direct {
            for recipient in recipients {
                if !recipient.accepts_direct() {
                    report.skipped += 1;
                    continue;
                }
                match sink.send_direct(recipient, direct).await {
                    Ok(()) => report.delivered += 1,
                    Err(e) => {
                        report.failed += 1;
                        warn!(
                            service = %alert.target,
                            recipient = %recipient.display_name(),
                            error = %e,
                            "Alert DM failed"
                        );
                    }
                }
            }

            info!(
                service = %alert.target,
                delivered = report.delivered,
                failed = report.failed,
                skipped = report.skipped,
                "Alert DMs sent"
            );
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::incident::IncidentManager;
    use chrono::TimeZone;
    use pulse_notify::{MemoryNotifier, NotifyLevel};
    use pulse_types::ProbeErrorKind;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn slow(at: DateTime<Utc>) -> HealthEvent {
        HealthEvent::DegradedLatency {
            target: "api".into(),
            at,
            latency_ms: 250.0,
            threshold_ms: 100,
        }
    }

    fn down(at: DateTime<Utc>) -> HealthEvent {
        HealthEvent::WentDown {
            target: "api".into(),
            at,
            since: at - Duration::seconds(20),
            failures: 3,
            error: Some(ProbeErrorKind::Timeout),
        }
    }

    fn dispatcher() -> AlertDispatcher {
        AlertDispatcher::new(std::time::Duration::from_secs(30 * 60))
    }

    #[test]
    fn test_degraded_cooldown() {
        let mut alerts = dispatcher();

        assert!(alerts.evaluate(&slow(t(0)), None).is_some());
        assert!(alerts.evaluate(&slow(t(600)), None).is_none());
        // 被抑制的告警不会刷新冷却窗口
        assert_eq!(alerts.last_sent("api", AlertKind::Degraded), Some(t(0)));
        assert!(alerts.evaluate(&slow(t(1_800)), None).is_some());
    }

    #[test]
    fn test_down_always_fires() {
        let mut alerts = dispatcher();

        let first = alerts.evaluate(&down(t(0)), None).unwrap();
        assert_eq!(first.kind, AlertKind::Down);
        assert_eq!(first.message.level, NotifyLevel::Critical);
        assert!(first.direct.is_some());

        assert!(alerts.evaluate(&down(t(60)), None).is_some());
    }

    #[test]
    fn test_recovered_resets_cooldown() {
        let mut alerts = dispatcher();
        let mut incidents = IncidentManager::new();
        incidents.open("api", t(0), t(20));
        let resolved = incidents.resolve("api", t(125), crate::incident::CloseReason::Recovered);

        alerts.evaluate(&slow(t(0)), None);
        let alert = alerts
            .evaluate(
                &HealthEvent::Recovered {
                    target: "api".into(),
                    at: t(125),
                    latency_ms: Some(20.0),
                },
                resolved.as_ref(),
            )
            .unwrap();
        assert_eq!(alert.message.content, "Restored - Downtime: 0:02:05");
        assert_eq!(alerts.last_sent("api", AlertKind::Degraded), None);
        assert!(alerts.evaluate(&slow(t(130)), None).is_some());
    }

    #[test]
    fn test_latency_recovered_is_silent() {
        let mut alerts = dispatcher();
        let event = HealthEvent::LatencyRecovered {
            target: "api".into(),
            at: t(0),
            latency_ms: 20.0,
        };
        assert!(alerts.evaluate(&event, None).is_none());
    }

    #[tokio::test]
    async fn test_deliver_filters_recipients() {
        let mut alerts = dispatcher();
        let alert = alerts.evaluate(&down(t(0)), None).unwrap();
        let notifier = MemoryNotifier::new().failing_for("u3");
        let recipients = vec![
            Recipient::new("u1"),
            Recipient::new("bot").bot(),
            Recipient::new("u2").without_direct_messages(),
            Recipient::new("u3"),
            Recipient::new("u4"),
        ];

        let report = AlertDispatcher::deliver(&alert, &notifier, &recipients).await;
        assert_eq!(
            report,
            DeliveryReport {
                broadcast: true,
                delivered: 2,
                failed: 1,
                skipped: 2,
            }
        );
        assert_eq!(notifier.broadcasts().await.len(), 1);
        assert_eq!(
            notifier.direct_recipients().await,
            vec!["u1".to_string(), "u4".to_string()]
        );
    }

    #[tokio::test]
    async fn test_deliver_degraded_is_broadcast_only() {
        let mut alerts = dispatcher();
        let alert = alerts.evaluate(&slow(t(0)), None).unwrap();
        let notifier = MemoryNotifier::new();

        let report =
            AlertDispatcher::deliver(&alert, &notifier, &[Recipient::new("u1")]).await;
        assert!(report.broadcast);
        assert_eq!(report.delivered, 0);
        assert!(notifier.direct_recipients().await.is_empty());
    }
}
