use pulse_logging::LoggingConfig;
use pulse_types::Target;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::MonitorSettings;

/// 应用配置（对应 pulse.toml）
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub monitoring: MonitorSettings,

    /// 初始监控目标，运行时的增删会写入 RuntimeStore
    #[serde(default)]
    pub targets: Vec<Target>,

    #[serde(default)]
    pub dashboard: DashboardConfig,

    #[serde(default)]
    pub notify: NotifyConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub runtime: RuntimeConfig,
}

/// 仪表盘输出配置
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DashboardConfig {
    /// 仪表盘 JSON 输出路径，未设置时不渲染，直到通过 /setup 配置
    #[serde(default)]
    pub output: Option<PathBuf>,
}

/// 通知配置
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct NotifyConfig {
    /// Webhook 地址
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// 存放 webhook token 的环境变量名
    #[serde(default)]
    pub webhook_token_env: Option<String>,

    /// 定向通知的接收人
    #[serde(default)]
    pub recipients: Vec<RecipientConfig>,
}

/// 接收人
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RecipientConfig {
    pub id: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub bot: bool,

    #[serde(default = "default_true")]
    pub direct_messages: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// 运行时状态存储
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RuntimeConfig {
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            state_path: default_state_path(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_state_path() -> PathBuf {
    PathBuf::from("data/runtime_state.json")
}
