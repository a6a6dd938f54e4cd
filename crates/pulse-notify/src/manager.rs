use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use crate::error::{NotifyError, Result};
use crate::message::{NotifyLevel, NotifyMessage, Recipient};
use crate::sink::NotificationSink;

/// 通知管理器
///
/// 把一条消息扇出到所有注册的通知器。单个通知器失败只记录日志，
/// 只有全部失败时才向调用方返回错误。
pub struct NotifyManager {
    /// 通知器列表
    sinks: Arc<RwLock<Vec<Arc<dyn NotificationSink>>>>,

    /// 最小通知级别
    min_level: NotifyLevel,
}

impl NotifyManager {
    pub fn new(min_level: NotifyLevel) -> Self {
        Self {
            sinks: Arc::new(RwLock::new(Vec::new())),
            min_level,
        }
    }

    /// 注册通知器
    pub async fn register(&self, sink: Arc<dyn NotificationSink>) {
        info!("Registered notifier: {}", sink.name());
        self.sinks.write().await.push(sink);
    }

    pub async fn len(&self) -> usize {
        self.sinks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sinks.read().await.is_empty()
    }

    /// 检查是否应该发送通知
    fn should_notify(&self, level: NotifyLevel) -> bool {
        level >= self.min_level
    }

    fn summarize(failures: Vec<(String, NotifyError)>, total: usize) -> Result<()> {
        if total > 0 && failures.len() == total {
            let reason = failures
                .iter()
                .map(|(name, e)| format!("{}: {}", name, e))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(NotifyError::delivery("manager", reason));
        }
        Ok(())
    }
}

impl Default for NotifyManager {
    fn default() -> Self {
        Self::new(NotifyLevel::Info)
    }
}

#[async_trait]
impl NotificationSink for NotifyManager {
    async fn send_broadcast(&self, message: &NotifyMessage) -> Result<()> {
        if !self.should_notify(message.level) {
            debug!(level = %message.level, "Notification below minimum level, skipped");
            return Ok(());
        }

        let sinks = self.sinks.read().await;
        let mut failures = Vec::new();
        for sink in sinks.iter() {
            match sink.send_broadcast(message).await {
                Ok(()) => debug!("Notification sent via {}: {}", sink.name(), message.title),
                Err(e) => {
                    error!("Notification error via {}: {}", sink.name(), e);
                    failures.push((sink.name().to_string(), e));
                }
            }
        }

        Self::summarize(failures, sinks.len())
    }

    async fn send_direct(&self, recipient: &Recipient, message: &NotifyMessage) -> Result<()> {
        if !self.should_notify(message.level) {
            return Ok(());
        }

        let sinks = self.sinks.read().await;
        let mut failures = Vec::new();
        for sink in sinks.iter() {
            if let Err(e) = sink.send_direct(recipient, message).await {
                error!(
                    recipient = %recipient.display_name(),
                    "Direct notification error via {}: {}", sink.name(), e
                );
                failures.push((sink.name().to_string(), e));
            }
        }

        Self::summarize(failures, sinks.len())
    }

    fn name(&self) -> &str {
        "manager"
    }
}
