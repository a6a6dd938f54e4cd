use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

use crate::dashboard::DashboardSnapshot;
use crate::error::RenderError;
use crate::incident::Incident;

/// 仪表盘渲染出口
#[async_trait]
pub trait RenderSink: Send + Sync {
    /// 渲染仪表盘快照，原地更新同一个输出
    async fn publish(&self, snapshot: &DashboardSnapshot) -> Result<(), RenderError>;

    /// 渲染单个故障事件；已清除的事件从输出中移除
    async fn publish_incident(&self, incident: &Incident) -> Result<(), RenderError>;

    fn name(&self) -> &str;
}

/// 写入 JSON 文件的渲染出口
///
/// 仪表盘写入 `path`，事件列表写入同目录的 `<stem>.incidents.json`。
/// 两者都先写临时文件再重命名。
pub struct FileRenderSink {
    path: PathBuf,
    incidents_path: PathBuf,
    incidents: Mutex<BTreeMap<String, Incident>>,
}

impl FileRenderSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "dashboard".to_string());
        let incidents_path = path.with_file_name(format!("{}.incidents.json", stem));

        Self {
            path,
            incidents_path,
            incidents: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn incidents_path(&self) -> &Path {
        &self.incidents_path
    }

    async fn write_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), RenderError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let content = serde_json::to_vec_pretty(value)?;
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, content).await?;
        fs::rename(&tmp_path, path).await?;
        Ok(())
    }
}

#[async_trait]
impl RenderSink for FileRenderSink {
    async fn publish(&self, snapshot: &DashboardSnapshot) -> Result<(), RenderError> {
        Self::write_atomic(&self.path, snapshot).await?;
        debug!(
            path = %self.path.display(),
            sequence = snapshot.sequence,
            "Dashboard rendered"
        );
        Ok(())
    }

    async fn publish_incident(&self, incident: &Incident) -> Result<(), RenderError> {
        let mut incidents = self.incidents.lock().await;
        if incident.is_retired() {
            incidents.remove(&incident.id);
        } else {
            incidents.insert(incident.id.clone(), incident.clone());
        }

        let list: Vec<&Incident> = incidents.values().collect();
        Self::write_atomic(&self.incidents_path, &list).await
    }

    fn name(&self) -> &str {
        "file"
    }
}

/// 进程内渲染出口
#[derive(Debug, Default)]
pub struct MemoryRenderSink {
    renders: Mutex<Vec<Arc<DashboardSnapshot>>>,
    incidents: Mutex<Vec<Incident>>,
}

impl MemoryRenderSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn render_count(&self) -> usize {
        self.renders.lock().await.len()
    }

    pub async fn last(&self) -> Option<Arc<DashboardSnapshot>> {
        self.renders.lock().await.last().cloned()
    }

    pub async fn sequences(&self) -> Vec<u64> {
        self.renders
            .lock()
            .await
            .iter()
            .map(|s| s.sequence)
            .collect()
    }

    /// 按顺序记录的事件渲染
    pub async fn incident_updates(&self) -> Vec<Incident> {
        self.incidents.lock().await.clone()
    }

    /// 按更新重放后仍在列表中的事件
    pub async fn listed_incidents(&self) -> Vec<Incident> {
        let mut listed: Vec<Incident> = Vec::new();
        for update in self.incidents.lock().await.iter() {
            listed.retain(|i| i.id != update.id);
            if !update.is_retired() {
                listed.push(update.clone());
            }
        }
        listed
    }
}

#[async_trait]
impl RenderSink for MemoryRenderSink {
    async fn publish(&self, snapshot: &DashboardSnapshot) -> Result<(), RenderError> {
        self.renders.lock().await.push(Arc::new(snapshot.clone()));
        Ok(())
    }

    async fn publish_incident(&self, incident: &Incident) -> Result<(), RenderError> {
        self.incidents.lock().await.push(incident.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
