use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

use crate::{ConfigError, MonitorSettings};

/// 监控参数句柄
///
/// 重新加载时整体替换，读者只会看到完整的旧值或完整的新值。
#[derive(Clone)]
pub struct SettingsHandle {
    tx: Arc<watch::Sender<Arc<MonitorSettings>>>,
}

impl SettingsHandle {
    pub fn new(settings: MonitorSettings) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(settings));
        Self { tx: Arc::new(tx) }
    }

    /// 当前参数
    pub fn current(&self) -> Arc<MonitorSettings> {
        self.tx.borrow().clone()
    }

    /// 校验并替换参数
    pub fn reload(&self, settings: MonitorSettings) -> Result<(), ConfigError> {
        settings.validate()?;
        info!(
            update_interval_secs = settings.update_interval_secs,
            failure_threshold = settings.failure_threshold,
            "Monitor settings reloaded"
        );
        self.tx.send_replace(Arc::new(settings));
        Ok(())
    }

    /// 订阅参数变更
    pub fn subscribe(&self) -> watch::Receiver<Arc<MonitorSettings>> {
        self.tx.subscribe()
    }
}

impl Default for SettingsHandle {
    fn default() -> Self {
        Self::new(MonitorSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reload_notifies_subscribers() {
        let handle = SettingsHandle::default();
        let mut rx = handle.subscribe();

        let updated = MonitorSettings {
            update_interval_secs: 30,
            ..Default::default()
        };
        handle.reload(updated).unwrap();

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().update_interval_secs, 30);
        assert_eq!(handle.current().update_interval_secs, 30);
    }

    #[test]
    fn test_invalid_reload_keeps_previous() {
        let handle = SettingsHandle::default();
        let invalid = MonitorSettings {
            ping_attempts: 0,
            ..Default::default()
        };

        assert!(handle.reload(invalid).is_err());
        assert_eq!(handle.current().ping_attempts, 3);
    }
}
