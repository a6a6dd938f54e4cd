use pulse_config::ConfigError;
use pulse_notify::NotifyError;
use thiserror::Error;

/// 目标注册表错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// 目标已存在
    #[error("Target already exists: {0}")]
    AlreadyExists(String),

    /// 目标不存在
    #[error("Target not found: {0}")]
    NotFound(String),

    /// 目标配置无效
    #[error("Invalid target configuration: {0}")]
    ConfigurationInvalid(String),
}

impl RegistryError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        RegistryError::ConfigurationInvalid(msg.into())
    }
}

/// 事件错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IncidentError {
    #[error("Incident not found: {0}")]
    NotFound(String),

    /// 事件仍未恢复，不能清除
    #[error("Incident is still open: {0}")]
    StillOpen(String),
}

/// 渲染错误
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// 监控引擎错误
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Incident(#[from] IncidentError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Notify(#[from] NotifyError),
}

/// 监控引擎结果类型
pub type Result<T> = std::result::Result<T, MonitorError>;
