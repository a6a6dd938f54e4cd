pub mod api;
pub mod bootstrap;

use pulse_config::ConfigLoader;
use pulse_monitor::MonitorEngine;
use std::sync::Arc;

// AppState（供 main.rs 和测试使用）
pub struct AppState {
    pub engine: Arc<MonitorEngine>,
    /// 用于 `/api/v1/reload`，测试中可以为空
    pub loader: Option<ConfigLoader>,
}

impl AppState {
    pub fn new(engine: Arc<MonitorEngine>) -> Self {
        Self {
            engine,
            loader: None,
        }
    }

    pub fn with_loader(mut self, loader: ConfigLoader) -> Self {
        self.loader = Some(loader);
        self
    }
}
