use async_trait::async_trait;

use crate::error::Result;
use crate::message::{NotifyMessage, Recipient};

/// 通知出口
///
/// 广播发到公共频道，定向消息逐个发给接收人。接收人过滤由调用方负责，
/// 实现方只管投递。
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// 发送广播
    async fn send_broadcast(&self, message: &NotifyMessage) -> Result<()>;

    /// 发送私信
    async fn send_direct(&self, recipient: &Recipient, message: &NotifyMessage) -> Result<()>;

    /// 通知器名称
    fn name(&self) -> &str;
}
