pub mod error;
pub mod manager;
pub mod message;
pub mod providers;
pub mod sink;

pub use error::{NotifyError, Result};
pub use manager::NotifyManager;
pub use message::{NotifyLevel, NotifyMessage, Recipient};
pub use providers::{Delivery, LogNotifier, MemoryNotifier, WebhookNotifier};
pub use sink::NotificationSink;
