use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::{NotifyError, Result};
use crate::message::{NotifyLevel, NotifyMessage, Recipient};
use crate::sink::NotificationSink;

// ============================================================================
// Webhook 通知
// ============================================================================

#[derive(Serialize)]
struct WebhookPayload<'a> {
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    recipient: Option<&'a Recipient>,
    message: &'a NotifyMessage,
}

/// 以 JSON POST 投递到 webhook
pub struct WebhookNotifier {
    url: reqwest::Url,
    token: Option<String>,
    client: reqwest::Client,
}

impl WebhookNotifier {
    /// 创建 webhook 通知器
    ///
    /// # 错误
    /// 地址无法解析或不是 http/https 时返回 `NotifyError::Config`
    pub fn new(url: &str, token: Option<String>) -> Result<Self> {
        let url = reqwest::Url::parse(url)
            .map_err(|e| NotifyError::Config(format!("invalid webhook url '{}': {}", url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(NotifyError::Config(format!(
                "unsupported webhook scheme '{}'",
                url.scheme()
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self { url, token, client })
    }

    pub fn url(&self) -> &reqwest::Url {
        &self.url
    }

    async fn post(&self, payload: &WebhookPayload<'_>) -> Result<()> {
        let mut request = self.client.post(self.url.clone()).json(payload);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(NotifyError::delivery(
                "webhook",
                format!("webhook returned {}", status.as_u16()),
            ))
        }
    }
}

#[async_trait]
impl NotificationSink for WebhookNotifier {
    async fn send_broadcast(&self, message: &NotifyMessage) -> Result<()> {
        self.post(&WebhookPayload {
            kind: "broadcast",
            recipient: None,
            message,
        })
        .await
    }

    async fn send_direct(&self, recipient: &Recipient, message: &NotifyMessage) -> Result<()> {
        self.post(&WebhookPayload {
            kind: "direct",
            recipient: Some(recipient),
            message,
        })
        .await
    }

    fn name(&self) -> &str {
        "webhook"
    }
}

// ============================================================================
// 日志通知
// ============================================================================

/// 只写日志的通知器，未配置 webhook 时使用
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl NotificationSink for LogNotifier {
    async fn send_broadcast(&self, message: &NotifyMessage) -> Result<()> {
        match message.level {
            NotifyLevel::Info => info!(
                target_name = message.target.as_deref().unwrap_or("-"),
                "{}: {}", message.title, message.content
            ),
            _ => warn!(
                target_name = message.target.as_deref().unwrap_or("-"),
                level = %message.level,
                "{}: {}", message.title, message.content
            ),
        }
        Ok(())
    }

    async fn send_direct(&self, recipient: &Recipient, message: &NotifyMessage) -> Result<()> {
        info!(
            recipient = %recipient.display_name(),
            level = %message.level,
            "Direct notification: {}", message.title
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}

// ============================================================================
// 内存通知
// ============================================================================

/// 一次投递记录
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Broadcast(NotifyMessage),
    Direct {
        recipient: String,
        message: NotifyMessage,
    },
}

/// 记录所有投递，用于测试和嵌入
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    deliveries: Mutex<Vec<Delivery>>,
    failing: HashSet<String>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// 对指定接收人的私信始终失败
    pub fn failing_for(mut self, recipient_id: impl Into<String>) -> Self {
        self.failing.insert(recipient_id.into());
        self
    }

    pub async fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().await.clone()
    }

    pub async fn broadcasts(&self) -> Vec<NotifyMessage> {
        self.deliveries
            .lock()
            .await
            .iter()
            .filter_map(|d| match d {
                Delivery::Broadcast(msg) => Some(msg.clone()),
                Delivery::Direct { .. } => None,
            })
            .collect()
    }

    pub async fn direct_recipients(&self) -> Vec<String> {
        self.deliveries
            .lock()
            .await
            .iter()
            .filter_map(|d| match d {
                Delivery::Direct { recipient, .. } => Some(recipient.clone()),
                Delivery::Broadcast(_) => None,
            })
            .collect()
    }
}

#[async_trait]
impl NotificationSink for MemoryNotifier {
    async fn send_broadcast(&self, message: &NotifyMessage) -> Result<()> {
        self.deliveries
            .lock()
            .await
            .push(Delivery::Broadcast(message.clone()));
        Ok(())
    }

    async fn send_direct(&self, recipient: &Recipient, message: &NotifyMessage) -> Result<()> {
        if self.failing.contains(&recipient.id) {
            return Err(NotifyError::delivery("memory", "recipient unreachable"));
        }
        self.deliveries.lock().await.push(Delivery::Direct {
            recipient: recipient.id.clone(),
            message: message.clone(),
        });
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_webhook_url_validation() {
        assert!(WebhookNotifier::new("https://hooks.example.com/pulse", None).is_ok());
        assert!(matches!(
            WebhookNotifier::new("not a url", None),
            Err(NotifyError::Config(_))
        ));
        assert!(matches!(
            WebhookNotifier::new("ftp://example.com/hook", None),
            Err(NotifyError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_memory_notifier_records() {
        let notifier = MemoryNotifier::new().failing_for("u2");
        let msg = NotifyMessage::critical("api is DOWN", "unreachable");

        notifier.send_broadcast(&msg).await.unwrap();
        notifier.send_direct(&Recipient::new("u1"), &msg).await.unwrap();
        assert!(notifier.send_direct(&Recipient::new("u2"), &msg).await.is_err());

        assert_eq!(notifier.broadcasts().await.len(), 1);
        assert_eq!(notifier.direct_recipients().await, vec!["u1".to_string()]);
    }

    #[test]
    fn test_log_notifier_never_fails() {
        let msg = NotifyMessage::warning("slow", "api 250ms");
        tokio_test::block_on(async {
            assert!(LogNotifier.send_broadcast(&msg).await.is_ok());
            assert!(LogNotifier
                .send_direct(&Recipient::new("u1"), &msg)
                .await
                .is_ok());
        });
    }
}
