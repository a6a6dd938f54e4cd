use thiserror::Error;

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Value out of range: {field} = {value}, expected >= {min}")]
    OutOfRange {
        field: &'static str,
        value: String,
        min: String,
    },

    #[error("Invalid format: {field} = {value}, reason: {reason}")]
    InvalidFormat {
        field: String,
        value: String,
        reason: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ConfigError {
    pub(crate) fn out_of_range(field: &'static str, value: impl ToString, min: impl ToString) -> Self {
        ConfigError::OutOfRange {
            field,
            value: value.to_string(),
            min: min.to_string(),
        }
    }
}
