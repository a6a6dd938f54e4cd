use chrono::{DateTime, Utc};
use pulse_types::{HealthStatus, Target, TargetKind};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tracing::{debug, warn};

use crate::health::HealthTracker;
use crate::incident::{format_duration, Incident, IncidentManager};
use crate::render::RenderSink;

/// 仪表盘中的单个目标
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetSnapshot {
    pub name: String,
    pub kind: TargetKind,
    pub status: HealthStatus,
    pub latency_ms: Option<f64>,
    pub threshold_ms: u64,
    pub over_threshold: bool,
    pub consecutive_failures: u32,
    pub down_since: Option<DateTime<Utc>>,
    /// 已停机时长（`H:MM:SS`）
    pub down_for: Option<String>,
    pub last_checked: Option<DateTime<Utc>>,
}

/// 仪表盘分组
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySnapshot {
    pub name: String,
    pub targets: Vec<TargetSnapshot>,
}

/// 仪表盘快照
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSnapshot {
    /// 发布序号，每次发布加一
    pub sequence: u64,
    pub generated_at: DateTime<Utc>,
    pub categories: Vec<CategorySnapshot>,
    pub open_incidents: Vec<Incident>,
    pub recent_incidents: Vec<Incident>,
}

impl DashboardSnapshot {
    /// 尚未生成过快照时的占位
    pub fn empty(generated_at: DateTime<Utc>) -> Self {
        Self {
            sequence: 0,
            generated_at,
            categories: Vec::new(),
            open_incidents: Vec::new(),
            recent_incidents: Vec::new(),
        }
    }

    /// 由注册表快照和当前状态构建，分组按目标首次出现的顺序排列
    pub fn build(
        targets: &[Target],
        health: &HealthTracker,
        incidents: &IncidentManager,
        default_threshold_ms: u64,
        recent_limit: usize,
        now: DateTime<Utc>,
    ) -> Self {
        let mut categories: Vec<CategorySnapshot> = Vec::new();

        for target in targets {
            let record = health.get(&target.name).cloned().unwrap_or_default();
            let threshold_ms = target.effective_threshold(default_threshold_ms);
            let down_since = incidents
                .open_for(&target.name)
                .map(|i| i.opened_at)
                .filter(|_| record.status.is_down());

            let snapshot = TargetSnapshot {
                name: target.name.clone(),
                kind: target.kind,
                status: record.status,
                latency_ms: record.last_latency_ms,
                threshold_ms,
                over_threshold: record
                    .last_latency_ms
                    .map(|l| l > threshold_ms as f64)
                    .unwrap_or(false),
                consecutive_failures: record.consecutive_failures,
                down_since,
                down_for: down_since.map(|since| format_duration(now - since)),
                last_checked: record.last_checked,
            };

            let category = target.category_name();
            match categories.iter_mut().find(|c| c.name == category) {
                Some(existing) => existing.targets.push(snapshot),
                None => categories.push(CategorySnapshot {
                    name: category.to_string(),
                    targets: vec![snapshot],
                }),
            }
        }

        Self {
            sequence: 0,
            generated_at: now,
            categories,
            open_incidents: incidents.open_incidents(),
            recent_incidents: incidents.recently_resolved(recent_limit),
        }
    }

    pub fn target(&self, name: &str) -> Option<&TargetSnapshot> {
        self.categories
            .iter()
            .flat_map(|c| c.targets.iter())
            .find(|t| t.name == name)
    }

    pub fn target_count(&self) -> usize {
        self.categories.iter().map(|c| c.targets.len()).sum()
    }

    pub fn count_with_status(&self, status: HealthStatus) -> usize {
        self.categories
            .iter()
            .flat_map(|c| c.targets.iter())
            .filter(|t| t.status == status)
            .count()
    }
}

/// 一次 tick 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// 已发布并渲染
    Rendered { sequence: u64 },
    /// 已发布，尚未配置渲染出口
    Unrendered { sequence: u64 },
    /// 已发布，渲染失败
    RenderFailed { sequence: u64 },
}

impl TickOutcome {
    pub fn sequence(&self) -> u64 {
        match self {
            TickOutcome::Rendered { sequence }
            | TickOutcome::Unrendered { sequence }
            | TickOutcome::RenderFailed { sequence } => *sequence,
        }
    }
}

/// 仪表盘聚合器
///
/// 保存最新快照并通过 `watch` 原子替换。每次 tick 最多渲染一次，
/// 渲染出口未配置时静默跳过。
pub struct DashboardAggregator {
    tx: watch::Sender<Arc<DashboardSnapshot>>,
    sequence: AtomicU64,
    sink: RwLock<Option<Arc<dyn RenderSink>>>,
}

impl DashboardAggregator {
    pub fn new(now: DateTime<Utc>) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(DashboardSnapshot::empty(now)));
        Self {
            tx,
            sequence: AtomicU64::new(0),
            sink: RwLock::new(None),
        }
    }

    pub fn with_render_sink(mut self, sink: Arc<dyn RenderSink>) -> Self {
        self.sink = RwLock::new(Some(sink));
        self
    }

    pub async fn set_render_sink(&self, sink: Arc<dyn RenderSink>) {
        debug!(sink = sink.name(), "Render sink configured");
        *self.sink.write().await = Some(sink);
    }

    pub async fn render_sink(&self) -> Option<Arc<dyn RenderSink>> {
        self.sink.read().await.clone()
    }

    pub async fn has_render_sink(&self) -> bool {
        self.sink.read().await.is_some()
    }

    /// 最新快照，不触发探测
    pub fn latest(&self) -> Arc<DashboardSnapshot> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<DashboardSnapshot>> {
        self.tx.subscribe()
    }

    /// 分配序号并原子替换最新快照
    pub fn publish(&self, mut snapshot: DashboardSnapshot) -> Arc<DashboardSnapshot> {
        snapshot.sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let snapshot = Arc::new(snapshot);
        self.tx.send_replace(snapshot.clone());
        snapshot
    }

    /// 发布快照并渲染一次
    pub async fn tick(&self, snapshot: DashboardSnapshot) -> TickOutcome {
        let snapshot = self.publish(snapshot);
        let sequence = snapshot.sequence;

        let Some(sink) = self.render_sink().await else {
            return TickOutcome::Unrendered { sequence };
        };

        match sink.publish(&snapshot).await {
            Ok(()) => TickOutcome::Rendered { sequence },
            Err(e) => {
                warn!(sink = sink.name(), sequence, error = %e, "Dashboard render failed");
                TickOutcome::RenderFailed { sequence }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::HealthPolicy;
    use crate::render::MemoryRenderSink;
    use chrono::{Duration, TimeZone};
    use pulse_types::{CheckResult, ProbeErrorKind};

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() + Duration::seconds(secs)
    }

    #[test]
    fn test_build_groups_by_category() {
        let targets = vec![
            Target::website("https://a.example.com"),
            Target::server("db", "10.0.0.5"),
            Target::website("https://b.example.com").with_threshold(500),
            Target::server("cache", "10.0.0.6").with_category("Internal"),
        ];
        let mut health = HealthTracker::new();
        health.apply(
            &CheckResult::up("https://b.example.com", 250.0).at(t(0)),
            500,
            HealthPolicy::default(),
        );

        let snapshot =
            DashboardSnapshot::build(&targets, &health, &IncidentManager::new(), 100, 10, t(0));
        let names: Vec<_> = snapshot.categories.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Websites", "Servers", "Internal"]);
        assert_eq!(snapshot.categories[0].targets.len(), 2);
        assert_eq!(snapshot.target_count(), 4);

        let b = snapshot.target("https://b.example.com").unwrap();
        assert_eq!(b.threshold_ms, 500);
        assert!(!b.over_threshold);
        assert_eq!(snapshot.target("db").unwrap().status, HealthStatus::Up);
    }

    #[test]
    fn test_build_down_since() {
        let targets = vec![Target::server("db", "10.0.0.5")];
        let mut health = HealthTracker::new();
        let policy = HealthPolicy {
            failure_threshold: 1,
            recovery_threshold: 1,
        };
        health.apply(
            &CheckResult::down("db", ProbeErrorKind::Unreachable).at(t(0)),
            100,
            policy,
        );
        let mut incidents = IncidentManager::new();
        incidents.open("db", t(0), t(0));

        let snapshot = DashboardSnapshot::build(&targets, &health, &incidents, 100, 10, t(65));
        let db = snapshot.target("db").unwrap();
        assert_eq!(db.status, HealthStatus::Down);
        assert_eq!(db.down_since, Some(t(0)));
        assert_eq!(db.down_for.as_deref(), Some("0:01:05"));
        assert_eq!(snapshot.open_incidents.len(), 1);
        assert_eq!(snapshot.count_with_status(HealthStatus::Down), 1);
    }

    #[tokio::test]
    async fn test_tick_without_sink_publishes_only() {
        let aggregator = DashboardAggregator::new(t(0));
        assert_eq!(aggregator.latest().sequence, 0);

        let outcome = aggregator.tick(DashboardSnapshot::empty(t(10))).await;
        assert_eq!(outcome, TickOutcome::Unrendered { sequence: 1 });
        assert_eq!(aggregator.latest().generated_at, t(10));
    }

    #[tokio::test]
    async fn test_tick_renders_once_per_tick() {
        let aggregator = DashboardAggregator::new(t(0));
        let sink = Arc::new(MemoryRenderSink::new());
        aggregator.tick(DashboardSnapshot::empty(t(0))).await;
        aggregator.set_render_sink(sink.clone()).await;

        let mut rx = aggregator.subscribe();
        for i in 1..=5 {
            aggregator.tick(DashboardSnapshot::empty(t(i))).await;
        }

        assert_eq!(sink.render_count().await, 5);
        assert_eq!(sink.sequences().await, vec![2, 3, 4, 5, 6]);
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().sequence, 6);
    }
}
