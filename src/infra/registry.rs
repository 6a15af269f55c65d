//! 主机注册表
//!
//! 非本机目标在启动任何进程之前都必须在注册表中存在

use async_trait::async_trait;
use std::collections::HashSet;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::config::env::{parse_hosts_file, EnvConfig};
use crate::domain::target::Target;
use crate::error::ExecError;

/// 主机注册表（外部持有的主机清单）
#[async_trait]
pub trait HostRegistry: Send + Sync {
    /// 目标是否为已登记的主机
    async fn exists(&self, target: &str) -> bool;
}

/// 内存中的静态主机清单
#[derive(Default)]
pub struct StaticHostRegistry {
    hosts: RwLock<HashSet<String>>,
}

impl StaticHostRegistry {
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            hosts: RwLock::new(hosts.into_iter().map(Into::into).collect()),
        }
    }

    /// 由 FLEET_HOSTS 与 FLEET_HOSTS_FILE 构建
    pub async fn from_config(config: &EnvConfig) -> Self {
        let mut hosts: HashSet<String> = config.hosts.iter().cloned().collect();

        if let Some(ref path) = config.hosts_file {
            match tokio::fs::read_to_string(path).await {
                Ok(content) => hosts.extend(parse_hosts_file(&content)),
                Err(e) => warn!(path = %path, error = %e, "Failed to read hosts file"),
            }
        }

        Self {
            hosts: RwLock::new(hosts),
        }
    }

    /// 登记主机
    pub async fn insert(&self, host: impl Into<String>) -> bool {
        self.hosts.write().await.insert(host.into())
    }

    /// 移除主机
    pub async fn remove(&self, host: &str) -> bool {
        self.hosts.write().await.remove(host)
    }

    /// 主机数量
    pub async fn len(&self) -> usize {
        self.hosts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.hosts.read().await.is_empty()
    }
}

#[async_trait]
impl HostRegistry for StaticHostRegistry {
    async fn exists(&self, target: &str) -> bool {
        self.hosts.read().await.contains(target)
    }
}

/// 解析目标
///
/// 本机别名直接放行；其他目标查询注册表，不存在时返回 TargetNotFound
pub async fn resolve_target(registry: &dyn HostRegistry, raw: &str) -> Result<Target, ExecError> {
    if Target::is_local_alias(raw) {
        return Ok(Target::Local);
    }

    if !raw.is_empty() && registry.exists(raw).await {
        return Ok(Target::Remote(raw.to_string()));
    }

    debug!(target_host = %raw, "Target rejected by host registry");
    Err(ExecError::TargetNotFound {
        target: raw.to_string(),
    })
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingRegistry;
    use super::*;

    #[tokio::test]
    async fn test_local_aliases_skip_registry() {
        let registry = RecordingRegistry::new(&[]);
        assert_eq!(resolve_target(&registry, "localhost").await.unwrap(), Target::Local);
        assert_eq!(resolve_target(&registry, "127.0.0.1").await.unwrap(), Target::Local);
        assert!(registry.lookups().is_empty());
    }

    #[tokio::test]
    async fn test_known_host_resolves_remote() {
        let registry = RecordingRegistry::new(&["10.0.0.2"]);
        let target = resolve_target(&registry, "10.0.0.2").await.unwrap();
        assert_eq!(target, Target::Remote("10.0.0.2".to_string()));
        assert_eq!(registry.lookups(), vec!["10.0.0.2"]);
    }

    #[tokio::test]
    async fn test_unknown_host_is_rejected() {
        let registry = RecordingRegistry::new(&["10.0.0.2"]);
        let err = resolve_target(&registry, "10.0.0.3").await.unwrap_err();
        assert!(matches!(err, ExecError::TargetNotFound { ref target } if target == "10.0.0.3"));

        let err = resolve_target(&registry, "").await.unwrap_err();
        assert_eq!(err.kind(), "target_not_found");
    }

    #[tokio::test]
    async fn test_static_registry_mutation() {
        let registry = StaticHostRegistry::default();
        assert!(registry.is_empty().await);
        assert!(registry.insert("game-01").await);
        assert!(registry.exists("game-01").await);
        assert!(registry.remove("game-01").await);
        assert!(!registry.exists("game-01").await);
    }

    #[tokio::test]
    async fn test_from_config_reads_hosts_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hosts");
        std::fs::write(&path, "# comment\ngame-02\n").unwrap();

        let config = EnvConfig {
            hosts: vec!["game-01".to_string()],
            hosts_file: Some(path.to_string_lossy().to_string()),
            ..EnvConfig::default()
        };
        let registry = StaticHostRegistry::from_config(&config).await;
        assert_eq!(registry.len().await, 2);
        assert!(registry.exists("game-02").await);
    }
}
