use async_trait::async_trait;
use pulse_config::{MonitorSettings, SettingsHandle};
use pulse_monitor::{MemoryRenderSink, MonitorEngine, Scheduler};
use pulse_notify::MemoryNotifier;
use pulse_probe::Prober;
use pulse_types::{CheckResult, Target};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

#[derive(Default)]
struct AlwaysUp {
    checks: AtomicUsize,
}

#[async_trait]
impl Prober for AlwaysUp {
    async fn check(&self, target: &Target) -> CheckResult {
        self.checks.fetch_add(1, Ordering::SeqCst);
        CheckResult::up(&target.name, 12.0)
    }

    fn name(&self) -> &str {
        "always-up"
    }
}

fn engine(
    settings: SettingsHandle,
    prober: Arc<AlwaysUp>,
    sink: Arc<MemoryRenderSink>,
) -> Arc<MonitorEngine> {
    Arc::new(
        MonitorEngine::builder(settings)
            .targets(vec![Target::server("db", "10.0.0.5")])
            .prober(prober)
            .notifier(Arc::new(MemoryNotifier::new()))
            .render_sink(sink)
            .build(),
    )
}

#[tokio::test(start_paused = true)]
async fn test_scheduler_ticks_and_stops() {
    let settings = SettingsHandle::new(MonitorSettings {
        update_interval_secs: 10,
        ..Default::default()
    });
    let prober = Arc::new(AlwaysUp::default());
    let sink = Arc::new(MemoryRenderSink::new());
    let engine = engine(settings, prober.clone(), sink.clone());

    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
    let handle = tokio::spawn(Scheduler::new(engine.clone()).run(shutdown_rx));

    // 第一次立即触发，之后在 10s、20s、30s 各一次
    tokio::time::sleep(Duration::from_secs(35)).await;
    assert_eq!(sink.render_count().await, 4);
    assert_eq!(sink.sequences().await, vec![1, 2, 3, 4]);
    assert_eq!(prober.checks.load(Ordering::SeqCst), 4);

    shutdown_tx.send(()).unwrap();
    handle.await.unwrap();

    let rendered = sink.render_count().await;
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(sink.render_count().await, rendered);
}

#[tokio::test(start_paused = true)]
async fn test_settings_reload_rebuilds_timers() {
    let settings = SettingsHandle::new(MonitorSettings {
        update_interval_secs: 10,
        ..Default::default()
    });
    let prober = Arc::new(AlwaysUp::default());
    let sink = Arc::new(MemoryRenderSink::new());
    let engine = engine(settings.clone(), prober, sink.clone());

    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
    let handle = tokio::spawn(Scheduler::new(engine).run(shutdown_rx));

    tokio::time::sleep(Duration::from_secs(15)).await;
    let before = sink.render_count().await;
    assert_eq!(before, 2);

    settings
        .reload(MonitorSettings {
            update_interval_secs: 2,
            ..Default::default()
        })
        .unwrap();
    tokio::time::sleep(Duration::from_secs(15)).await;
    let after = sink.render_count().await;

    // 重建后立即触发一次，之后每 2 秒一次：15s 到 29s 共 8 次
    assert_eq!(after - before, 8);

    shutdown_tx.send(()).unwrap();
    handle.await.unwrap();
}
