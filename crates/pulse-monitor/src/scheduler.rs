use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::engine::{CycleOutcome, MonitorEngine};

/// 调度器
///
/// 两个定时器：探测周期和仪表盘刷新。探测在独立任务中运行，
/// 上一轮未结束时由引擎跳过；参数重新加载后重建定时器。
pub struct Scheduler {
    engine: Arc<MonitorEngine>,
}

impl Scheduler {
    pub fn new(engine: Arc<MonitorEngine>) -> Self {
        Self { engine }
    }

    fn timer(period: std::time::Duration) -> Interval {
        let mut timer = interval(period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        timer
    }

    /// 运行直到收到关闭信号
    pub async fn run<S: Clone>(self, mut shutdown: broadcast::Receiver<S>) {
        let mut settings_rx = self.engine.settings().subscribe();

        loop {
            let settings = settings_rx.borrow_and_update().clone();
            let mut probe_timer = Self::timer(settings.probe_interval());
            let mut render_timer = Self::timer(settings.update_interval());
            info!(
                probe_interval_secs = settings.probe_interval().as_secs(),
                update_interval_secs = settings.update_interval_secs,
                "Scheduler started"
            );

            loop {
                tokio::select! {
                    _ = shutdown.recv() => {
                        info!("Scheduler stopping");
                        return;
                    }
                    changed = settings_rx.changed() => {
                        if changed.is_err() {
                            warn!("Settings channel closed, scheduler stopping");
                            return;
                        }
                        info!("Settings changed, rebuilding timers");
                        break;
                    }
                    _ = probe_timer.tick() => {
                        let engine = self.engine.clone();
                        tokio::spawn(async move {
                            if let CycleOutcome::Completed(report) = engine.run_cycle().await {
                                debug!(probed = report.probed, "Probe cycle finished");
                            }
                        });
                    }
                    _ = render_timer.tick() => {
                        self.engine.tick().await;
                    }
                }
            }
        }
    }
}
