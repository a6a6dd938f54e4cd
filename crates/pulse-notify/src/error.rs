use thiserror::Error;

/// 通知错误
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Delivery via {channel} failed: {reason}")]
    DeliveryFailed { channel: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid notifier configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, NotifyError>;

impl NotifyError {
    pub fn delivery(channel: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DeliveryFailed {
            channel: channel.into(),
            reason: reason.into(),
        }
    }
}
