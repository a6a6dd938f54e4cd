use pulse_types::Target;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::ConfigError;

/// 运行时可修改的状态（目标列表、仪表盘输出位置）
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RuntimeState {
    #[serde(default)]
    pub targets: Vec<Target>,

    #[serde(default)]
    pub dashboard_output: Option<PathBuf>,
}

/// 运行时状态存储
///
/// JSON 文件，写入时先写临时文件再重命名，保证文件内容始终完整。
pub struct RuntimeStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl RuntimeStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 读取状态，文件不存在时返回 None
    pub async fn load(&self) -> Result<Option<RuntimeState>, ConfigError> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "Runtime state not found");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str(&content) {
            Ok(state) => Ok(Some(state)),
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Runtime state is corrupt, ignoring it"
                );
                Ok(None)
            }
        }
    }

    /// 保存状态
    pub async fn save(&self, state: &RuntimeState) -> Result<(), ConfigError> {
        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let content = serde_json::to_string_pretty(state)?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, content).await?;
        fs::rename(&tmp_path, &self.path).await?;

        debug!(
            path = %self.path.display(),
            targets = state.targets.len(),
            "Runtime state saved"
        );
        Ok(())
    }
}
