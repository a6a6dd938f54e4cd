use anyhow::{anyhow, Context, Result};
use config::{Config, Environment, File, FileFormat};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::{AppConfig, NotifyConfig};

/// 配置加载器
///
/// 读取 TOML 配置文件，再叠加 `PULSE__SECTION__KEY` 形式的环境变量。
pub struct ConfigLoader {
    path: PathBuf,
    env_prefix: String,
}

impl ConfigLoader {
    /// 创建配置加载器
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            env_prefix: "PULSE".to_string(),
        }
    }

    /// 修改环境变量前缀
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// 加载并校验配置
    ///
    /// 配置文件不存在时使用默认配置（仍然会叠加环境变量）。
    pub fn load(&self) -> Result<AppConfig> {
        if !self.path.exists() {
            info!(path = %self.path.display(), "Config file not found, using defaults");
        }

        let path = self
            .path
            .to_str()
            .ok_or_else(|| anyhow!("Invalid config path: {}", self.path.display()))?;

        let settings = Config::builder()
            .add_source(File::new(path, FileFormat::Toml).required(false))
            .add_source(
                Environment::with_prefix(&self.env_prefix)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read config {}", self.path.display()))?;

        let config: AppConfig = settings.try_deserialize()?;
        config.monitoring.validate()?;

        debug!(
            targets = config.targets.len(),
            update_interval_secs = config.monitoring.update_interval_secs,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// 解析 webhook token
    ///
    /// 配置了环境变量名但变量不存在时返回错误，启动流程应据此中止。
    pub fn webhook_token(notify: &NotifyConfig) -> Result<Option<String>> {
        match &notify.webhook_token_env {
            None => Ok(None),
            Some(var) => std::env::var(var)
                .map(Some)
                .map_err(|_| anyhow!("Environment variable {} is required for webhook token", var)),
        }
    }
}
