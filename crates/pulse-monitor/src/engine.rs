use pulse_config::{MonitorSettings, RuntimeState, RuntimeStore, SettingsHandle};
use pulse_notify::{LogNotifier, NotificationSink, Recipient};
use pulse_probe::{PingOptions, Prober, TargetProber};
use pulse_types::{CheckResult, ProbeErrorKind, Target};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::alert::{Alert, AlertDispatcher};
use crate::clock::{Clock, SystemClock};
use crate::dashboard::{DashboardAggregator, DashboardSnapshot, TickOutcome};
use crate::error::{IncidentError, Result};
use crate::events::HealthEvent;
use crate::health::{HealthPolicy, HealthRecord, HealthTracker};
use crate::incident::{CloseReason, Incident, IncidentManager};
use crate::registry::TargetRegistry;
use crate::render::{FileRenderSink, RenderSink};

/// 就绪状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Readiness {
    /// 已配置渲染出口
    Ready,
    /// 尚未完成 setup
    Unconfigured,
}

/// 一轮探测的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub probed: usize,
    pub failed: usize,
    pub transitions: usize,
    /// 本轮中途被移除的目标
    pub discarded: usize,
    pub invalid: usize,
}

/// 探测周期结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed(CycleReport),
    /// 上一轮尚未结束
    Skipped,
}

/// 状态机、事件和告警共用一把锁，保证按顺序处理
#[derive(Debug)]
struct EngineState {
    health: HealthTracker,
    incidents: IncidentManager,
    alerts: AlertDispatcher,
}

enum Applied {
    Events(Vec<HealthEvent>),
    Discarded,
    Invalid,
}

/// 周期结束（包括被取消）时复位运行标志
struct CycleGuard<'a>(&'a AtomicBool);

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// 监控引擎
///
/// 每个检查结果依次经过：健康状态机 -> 事件管理器 -> 告警分发器。
/// 状态变更在锁内完成，通知和渲染在锁释放后进行。
pub struct MonitorEngine {
    registry: TargetRegistry,
    state: Mutex<EngineState>,
    prober: Arc<dyn Prober>,
    dashboard: DashboardAggregator,
    notifier: RwLock<Arc<dyn NotificationSink>>,
    recipients: RwLock<Vec<Recipient>>,
    dashboard_output: RwLock<Option<PathBuf>>,
    settings: SettingsHandle,
    store: Option<RuntimeStore>,
    /// 快照和写入在同一把锁内完成，保证落盘顺序与修改顺序一致
    persist_lock: Mutex<()>,
    clock: Arc<dyn Clock>,
    cycle_running: AtomicBool,
}

impl MonitorEngine {
    pub fn builder(settings: SettingsHandle) -> MonitorEngineBuilder {
        MonitorEngineBuilder::new(settings)
    }

    pub fn settings(&self) -> &SettingsHandle {
        &self.settings
    }

    pub fn registry(&self) -> &TargetRegistry {
        &self.registry
    }

    pub fn dashboard(&self) -> &DashboardAggregator {
        &self.dashboard
    }

    // ------------------------------------------------------------------
    // 探测
    // ------------------------------------------------------------------

    /// 执行一轮探测
    ///
    /// 上一轮仍在运行时直接跳过。目标并发探测，并发数受
    /// `max_concurrent_probes` 限制，每个探测有整体超时。
    pub async fn run_cycle(&self) -> CycleOutcome {
        if self
            .cycle_running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("Previous probe cycle still running, skipping");
            return CycleOutcome::Skipped;
        }
        let _guard = CycleGuard(&self.cycle_running);

        let started = Instant::now();
        let settings = self.settings.current();
        let targets = self.registry.snapshot().await;
        let semaphore = Arc::new(Semaphore::new(settings.max_concurrent_probes.max(1)));
        let deadline = settings.probe_deadline();

        let mut tasks = JoinSet::new();
        for target in targets {
            let prober = self.prober.clone();
            let semaphore = semaphore.clone();
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                match tokio::time::timeout(deadline, prober.check(&target)).await {
                    Ok(result) => result,
                    Err(_) => {
                        warn!(service = %target.name, "Probe exceeded its deadline");
                        CheckResult::down(&target.name, ProbeErrorKind::Timeout)
                    }
                }
            });
        }

        let mut report = CycleReport::default();
        while let Some(joined) = tasks.join_next().await {
            let result = match joined {
                Ok(result) => result.at(self.clock.now()),
                Err(e) => {
                    error!(error = %e, "Probe task failed");
                    continue;
                }
            };

            report.probed += 1;
            if !result.success {
                report.failed += 1;
            }
            match self.apply_result(result).await {
                Applied::Events(events) => report.transitions += events.len(),
                Applied::Discarded => report.discarded += 1,
                Applied::Invalid => report.invalid += 1,
            }
        }

        info!(
            probed = report.probed,
            failed = report.failed,
            transitions = report.transitions,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Probe cycle completed"
        );
        CycleOutcome::Completed(report)
    }

    /// 处理单个检查结果，返回产生的状态迁移事件
    pub async fn process_result(&self, result: CheckResult) -> Vec<HealthEvent> {
        match self.apply_result(result).await {
            Applied::Events(events) => events,
            Applied::Discarded | Applied::Invalid => Vec::new(),
        }
    }

    async fn apply_result(&self, result: CheckResult) -> Applied {
        if let Some(ProbeErrorKind::InvalidTarget(reason)) = &result.error {
            warn!(service = %result.target, reason = %reason, "Target is misconfigured, check ignored");
            return Applied::Invalid;
        }

        let settings = self.settings.current();
        let policy = HealthPolicy::from(&*settings);

        let mut incident_updates = Vec::new();
        let mut alerts = Vec::new();
        let events = {
            let mut state = self.state.lock().await;

            let Some(target) = self.registry.get(&result.target).await else {
                debug!(service = %result.target, "Result for removed target discarded");
                return Applied::Discarded;
            };
            let threshold_ms = target.effective_threshold(settings.default_latency_threshold_ms);

            state.alerts.set_cooldown(settings.slow_alert_cooldown());
            let events = state.health.apply(&result, threshold_ms, policy);

            for event in &events {
                let incident = match event {
                    HealthEvent::WentDown { target, at, since, .. } => {
                        state.incidents.open(target, *since, *at).map(|opened| {
                            incident_updates.extend(opened.superseded);
                            opened.incident
                        })
                    }
                    HealthEvent::Recovered { target, at, .. } => {
                        state.incidents.resolve(target, *at, CloseReason::Recovered)
                    }
                    _ => None,
                };

                if let Some(alert) = state.alerts.evaluate(event, incident.as_ref()) {
                    alerts.push(alert);
                }
                incident_updates.extend(incident);
            }

            events
        };

        for incident in &incident_updates {
            self.render_incident(incident).await;
        }
        self.deliver(alerts).await;

        Applied::Events(events)
    }

    async fn deliver(&self, alerts: Vec<Alert>) {
        if alerts.is_empty() {
            return;
        }

        let notifier = self.notifier.read().await.clone();
        let recipients = self.recipients.read().await.clone();
        for alert in alerts {
            let report = AlertDispatcher::deliver(&alert, &*notifier, &recipients).await;
            debug!(
                service = %alert.target,
                kind = ?alert.kind,
                broadcast = report.broadcast,
                delivered = report.delivered,
                "Alert dispatched"
            );
        }
    }

    async fn render_incident(&self, incident: &Incident) {
        if let Some(sink) = self.dashboard.render_sink().await {
            if let Err(e) = sink.publish_incident(incident).await {
                warn!(
                    incident_id = %incident.id,
                    sink = sink.name(),
                    error = %e,
                    "Incident render failed"
                );
            }
        }
    }

    // ------------------------------------------------------------------
    // 仪表盘
    // ------------------------------------------------------------------

    /// 生成快照、发布并渲染一次
    pub async fn tick(&self) -> TickOutcome {
        let settings = self.settings.current();
        let snapshot = {
            // 持有状态锁读取注册表，避免刚移除的目标以默认状态出现
            let state = self.state.lock().await;
            let targets = self.registry.snapshot().await;
            DashboardSnapshot::build(
                &targets,
                &state.health,
                &state.incidents,
                settings.default_latency_threshold_ms,
                settings.recent_incident_limit,
                self.clock.now(),
            )
        };
        self.dashboard.tick(snapshot).await
    }

    /// 最新快照
    pub fn status(&self) -> Arc<DashboardSnapshot> {
        self.dashboard.latest()
    }

    pub async fn readiness(&self) -> Readiness {
        if self.dashboard.has_render_sink().await {
            Readiness::Ready
        } else {
            Readiness::Unconfigured
        }
    }

    pub async fn configure_render_sink(&self, sink: Arc<dyn RenderSink>) {
        info!(sink = sink.name(), "Render sink configured");
        self.dashboard.set_render_sink(sink).await;
    }

    /// 设置仪表盘输出文件并立即渲染一次
    pub async fn set_dashboard_output(&self, path: PathBuf) -> TickOutcome {
        self.configure_render_sink(Arc::new(FileRenderSink::new(&path)))
            .await;
        *self.dashboard_output.write().await = Some(path);
        self.persist().await;
        self.tick().await
    }

    pub async fn dashboard_output(&self) -> Option<PathBuf> {
        self.dashboard_output.read().await.clone()
    }

    // ------------------------------------------------------------------
    // 通知
    // ------------------------------------------------------------------

    pub async fn configure_notifier(&self, notifier: Arc<dyn NotificationSink>) {
        info!(notifier = notifier.name(), "Notifier configured");
        *self.notifier.write().await = notifier;
    }

    pub async fn set_recipients(&self, recipients: Vec<Recipient>) {
        *self.recipients.write().await = recipients;
    }

    // ------------------------------------------------------------------
    // 目标管理
    // ------------------------------------------------------------------

    pub async fn add_target(&self, target: Target) -> Result<Target> {
        let target = self.registry.add(target).await?;
        self.state.lock().await.health.ensure(&target.name);
        self.persist().await;
        Ok(target)
    }

    /// 移除目标，未关闭的事件以 `TargetRemoved` 关闭
    pub async fn remove_target(&self, name: &str) -> Result<Target> {
        let removed = self.registry.remove(name).await?;
        let now = self.clock.now();

        let closed = {
            let mut state = self.state.lock().await;
            state.health.remove(name);
            state.alerts.forget(name);
            state.incidents.resolve(name, now, CloseReason::TargetRemoved)
        };

        if let Some(incident) = &closed {
            self.render_incident(incident).await;
        }
        self.persist().await;
        Ok(removed)
    }

    pub async fn set_latency_threshold(&self, name: &str, threshold_ms: u64) -> Result<Target> {
        let target = self.registry.set_threshold(name, threshold_ms).await?;
        self.persist().await;
        Ok(target)
    }

    pub async fn health(&self, name: &str) -> Option<HealthRecord> {
        self.state.lock().await.health.get(name).cloned()
    }

    // ------------------------------------------------------------------
    // 事件
    // ------------------------------------------------------------------

    /// 清除已恢复的事件
    pub async fn clear_incident(&self, id: &str) -> std::result::Result<Incident, IncidentError> {
        let cleared = self.state.lock().await.incidents.clear(id)?;
        self.render_incident(&cleared).await;
        Ok(cleared)
    }

    pub async fn open_incidents(&self) -> Vec<Incident> {
        self.state.lock().await.incidents.open_incidents()
    }

    pub async fn recent_incidents(&self, limit: usize) -> Vec<Incident> {
        self.state.lock().await.incidents.recently_resolved(limit)
    }

    pub async fn incident(&self, id: &str) -> Option<Incident> {
        self.state.lock().await.incidents.get(id).cloned()
    }

    // ------------------------------------------------------------------
    // 持久化
    // ------------------------------------------------------------------

    async fn persist(&self) {
        let Some(store) = &self.store else {
            return;
        };

        let _guard = self.persist_lock.lock().await;
        let state = RuntimeState {
            targets: self.registry.snapshot().await,
            dashboard_output: self.dashboard_output.read().await.clone(),
        };
        if let Err(e) = store.save(&state).await {
            warn!(
                path = %store.path().display(),
                error = %e,
                "Failed to persist runtime state"
            );
        }
    }
}

/// 监控引擎构建器
pub struct MonitorEngineBuilder {
    settings: SettingsHandle,
    targets: Vec<Target>,
    prober: Option<Arc<dyn Prober>>,
    notifier: Option<Arc<dyn NotificationSink>>,
    recipients: Vec<Recipient>,
    render_sink: Option<Arc<dyn RenderSink>>,
    dashboard_output: Option<PathBuf>,
    store: Option<RuntimeStore>,
    clock: Option<Arc<dyn Clock>>,
}

impl MonitorEngineBuilder {
    pub fn new(settings: SettingsHandle) -> Self {
        Self {
            settings,
            targets: Vec::new(),
            prober: None,
            notifier: None,
            recipients: Vec::new(),
            render_sink: None,
            dashboard_output: None,
            store: None,
            clock: None,
        }
    }

    pub fn targets(mut self, targets: impl IntoIterator<Item = Target>) -> Self {
        self.targets.extend(targets);
        self
    }

    pub fn prober(mut self, prober: Arc<dyn Prober>) -> Self {
        self.prober = Some(prober);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn recipients(mut self, recipients: Vec<Recipient>) -> Self {
        self.recipients = recipients;
        self
    }

    pub fn render_sink(mut self, sink: Arc<dyn RenderSink>) -> Self {
        self.render_sink = Some(sink);
        self
    }

    /// 仪表盘输出到文件，等价于启动后立即 setup
    pub fn dashboard_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.dashboard_output = Some(path.into());
        self
    }

    pub fn store(mut self, store: RuntimeStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    fn default_prober(settings: &MonitorSettings) -> Arc<dyn Prober> {
        Arc::new(TargetProber::new(
            settings.http_timeout(),
            PingOptions {
                attempts: settings.ping_attempts,
                delay: settings.ping_delay(),
                timeout: settings.ping_timeout(),
            },
        ))
    }

    pub fn build(self) -> MonitorEngine {
        let settings = self.settings.current();
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let prober = self
            .prober
            .unwrap_or_else(|| Self::default_prober(&settings));
        let notifier = self
            .notifier
            .unwrap_or_else(|| Arc::new(LogNotifier) as Arc<dyn NotificationSink>);

        let render_sink = self.render_sink.or_else(|| {
            self.dashboard_output
                .as_ref()
                .map(|path| Arc::new(FileRenderSink::new(path)) as Arc<dyn RenderSink>)
        });
        let mut dashboard = DashboardAggregator::new(clock.now());
        if let Some(sink) = render_sink {
            dashboard = dashboard.with_render_sink(sink);
        }

        let registry = TargetRegistry::from_targets(self.targets);
        info!(
            failure_threshold = settings.failure_threshold,
            recovery_threshold = settings.recovery_threshold,
            update_interval_secs = settings.update_interval_secs,
            "Monitor engine created"
        );

        MonitorEngine {
            registry,
            state: Mutex::new(EngineState {
                health: HealthTracker::new(),
                incidents: IncidentManager::new(),
                alerts: AlertDispatcher::new(settings.slow_alert_cooldown()),
            }),
            prober,
            dashboard,
            notifier: RwLock::new(notifier),
            recipients: RwLock::new(self.recipients),
            dashboard_output: RwLock::new(self.dashboard_output),
            settings: self.settings,
            store: self.store,
            persist_lock: Mutex::new(()),
            clock,
            cycle_running: AtomicBool::new(false),
        }
    }
}
