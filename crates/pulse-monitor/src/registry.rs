use pulse_types::{Target, TargetKind};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::error::RegistryError;

type Result<T> = std::result::Result<T, RegistryError>;

/// 监控目标注册表
///
/// 按插入顺序保存目标。探测周期只读取 `snapshot()` 的副本，
/// 周期进行中的增删不会影响本轮遍历。
#[derive(Debug, Default)]
pub struct TargetRegistry {
    targets: RwLock<Vec<Target>>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从配置加载目标，无效或重复的条目记录警告后跳过
    pub fn from_targets(targets: impl IntoIterator<Item = Target>) -> Self {
        let mut accepted: Vec<Target> = Vec::new();
        for target in targets {
            if let Err(e) = validate_target(&target) {
                warn!(service = %target.name, error = %e, "Skipping invalid target");
                continue;
            }
            if accepted.iter().any(|t| t.name == target.name) {
                warn!(service = %target.name, "Skipping duplicate target");
                continue;
            }
            accepted.push(target);
        }

        Self {
            targets: RwLock::new(accepted),
        }
    }

    /// 添加目标
    ///
    /// # 错误
    /// * `ConfigurationInvalid` - URL/主机格式错误或阈值为 0
    /// * `AlreadyExists` - 同名目标已存在
    pub async fn add(&self, target: Target) -> Result<Target> {
        validate_target(&target)?;

        let mut targets = self.targets.write().await;
        if targets.iter().any(|t| t.name == target.name) {
            return Err(RegistryError::AlreadyExists(target.name));
        }

        info!(
            service = %target.name,
            kind = %target.kind,
            address = %target.address,
            "Target added"
        );
        targets.push(target.clone());
        Ok(target)
    }

    /// 移除目标
    pub async fn remove(&self, name: &str) -> Result<Target> {
        let mut targets = self.targets.write().await;
        let index = targets
            .iter()
            .position(|t| t.name == name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;

        let removed = targets.remove(index);
        info!(service = %name, "Target removed");
        Ok(removed)
    }

    /// 修改延迟阈值
    pub async fn set_threshold(&self, name: &str, threshold_ms: u64) -> Result<Target> {
        if threshold_ms == 0 {
            return Err(RegistryError::invalid("latency threshold must be greater than 0"));
        }

        let mut targets = self.targets.write().await;
        let target = targets
            .iter_mut()
            .find(|t| t.name == name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;

        target.latency_threshold_ms = Some(threshold_ms);
        info!(service = %name, threshold_ms, "Latency threshold updated");
        Ok(target.clone())
    }

    pub async fn get(&self, name: &str) -> Option<Target> {
        self.targets
            .read()
            .await
            .iter()
            .find(|t| t.name == name)
            .cloned()
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.targets.read().await.iter().any(|t| t.name == name)
    }

    /// 当前目标列表的副本
    pub async fn snapshot(&self) -> Vec<Target> {
        self.targets.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.targets.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.targets.read().await.is_empty()
    }
}

/// 校验目标
pub fn validate_target(target: &Target) -> Result<()> {
    if target.name.trim().is_empty() {
        return Err(RegistryError::invalid("target name cannot be empty"));
    }
    if target.latency_threshold_ms == Some(0) {
        return Err(RegistryError::invalid(format!(
            "{}: latency threshold must be greater than 0",
            target.name
        )));
    }

    match target.kind {
        TargetKind::Website => {
            let url = reqwest::Url::parse(&target.address).map_err(|e| {
                RegistryError::invalid(format!("{}: invalid url '{}': {}", target.name, target.address, e))
            })?;
            if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
                return Err(RegistryError::invalid(format!(
                    "{}: url must be http(s) with a host",
                    target.name
                )));
            }
            if let Some(status) = target.expected_status {
                if !(100..=599).contains(&status) {
                    return Err(RegistryError::invalid(format!(
                        "{}: expected status {} is not a valid HTTP status",
                        target.name, status
                    )));
                }
            }
        }
        TargetKind::Server => {
            let host = target.address.as_str();
            if host.is_empty()
                || host.starts_with('-')
                || host.chars().any(|c| c.is_whitespace() || c.is_control())
            {
                return Err(RegistryError::invalid(format!(
                    "{}: invalid host '{}'",
                    target.name, host
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_add_and_duplicate() {
        let registry = TargetRegistry::new();
        registry
            .add(Target::website("https://example.com"))
            .await
            .unwrap();

        let err = registry
            .add(Target::website("https://example.com"))
            .await
            .unwrap_err();
        assert_eq!(err, RegistryError::AlreadyExists("https://example.com".into()));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_invalid_targets_rejected() {
        let registry = TargetRegistry::new();

        for target in [
            Target::website("not a url"),
            Target::website("ftp://example.com"),
            Target::server("db", ""),
            Target::server("db", "-c 5 host"),
            Target::server("db", "10.0.0.5").with_threshold(0),
            Target::website("https://example.com").with_expected_status(42),
        ] {
            assert!(matches!(
                registry.add(target).await,
                Err(RegistryError::ConfigurationInvalid(_))
            ));
        }
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_remove_and_threshold() {
        let registry = TargetRegistry::new();
        registry.add(Target::server("db", "10.0.0.5")).await.unwrap();

        let updated = registry.set_threshold("db", 250).await.unwrap();
        assert_eq!(updated.latency_threshold_ms, Some(250));
        assert_eq!(
            registry.get("db").await.unwrap().latency_threshold_ms,
            Some(250)
        );
        assert!(matches!(
            registry.set_threshold("db", 0).await,
            Err(RegistryError::ConfigurationInvalid(_))
        ));

        registry.remove("db").await.unwrap();
        assert!(!registry.contains("db").await);
        assert_eq!(
            registry.remove("db").await.unwrap_err(),
            RegistryError::NotFound("db".into())
        );
        assert!(matches!(
            registry.set_threshold("db", 100).await,
            Err(RegistryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_snapshot_is_a_copy() {
        let registry = TargetRegistry::from_targets(vec![
            Target::server("a", "10.0.0.1"),
            Target::server("b", "10.0.0.2"),
        ]);
        let snapshot = registry.snapshot().await;

        registry.remove("a").await.unwrap();
        registry.add(Target::server("c", "10.0.0.3")).await.unwrap();

        let names: Vec<_> = snapshot.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);

        let names: Vec<_> = registry
            .snapshot()
            .await
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn test_from_targets_skips_invalid() {
        let registry = TargetRegistry::from_targets(vec![
            Target::server("ok", "10.0.0.1"),
            Target::website("::bad::"),
            Target::server("ok", "10.0.0.2"),
        ]);
        assert_eq!(registry.len().await, 1);
        assert_eq!(registry.get("ok").await.unwrap().address, "10.0.0.1");
    }
}
