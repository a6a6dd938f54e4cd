use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::{LogFormat, LoggingConfig};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log filter '{0}': {1}")]
    InvalidFilter(String, String),

    #[error("Failed to install subscriber: {0}")]
    InitError(String),
}

/// 依赖库的日志噪音较大，默认只保留 warn 以上
const QUIET_TARGETS: &[&str] = &["hyper", "reqwest", "h2", "rustls"];

/// 构建日志过滤器
///
/// 设置了 `RUST_LOG` 时以其为准，否则使用配置中的级别。
pub fn build_filter(level: &str) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    let mut directives = level.to_string();
    for target in QUIET_TARGETS {
        directives.push_str(&format!(",{}=warn", target));
    }

    EnvFilter::try_new(&directives)
        .map_err(|e| LoggingError::InvalidFilter(level.to_string(), e.to_string()))
}

/// 初始化全局日志
pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingError> {
    let filter = build_filter(&config.level)?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    let result = match config.format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().flatten_event(true).try_init(),
    };

    result.map_err(|e| LoggingError::InitError(e.to_string()))
}
