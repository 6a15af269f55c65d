//! 应用状态

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::env::EnvConfig;
use crate::infra::{HostRegistry, StaticHostRegistry, Transport};
use crate::services::{CommandExecutor, FileTransferRunner, InstallerResolver, StreamingExecutor};

use super::monitor_hub::MonitorHub;

/// 全局 shutdown token，用于优雅关闭所有后台任务
static GLOBAL_SHUTDOWN: std::sync::OnceLock<CancellationToken> = std::sync::OnceLock::new();

/// 获取全局 shutdown token
pub fn get_shutdown_token() -> CancellationToken {
    GLOBAL_SHUTDOWN
        .get_or_init(CancellationToken::new)
        .clone()
}

/// 触发全局 shutdown
pub fn trigger_shutdown() {
    if let Some(token) = GLOBAL_SHUTDOWN.get() {
        token.cancel();
    }
}

/// 应用状态
pub struct AppState {
    pub config: EnvConfig,
    pub registry: Arc<dyn HostRegistry>,
    pub executor: Arc<CommandExecutor>,
    pub streamer: Arc<StreamingExecutor>,
    pub transfer: Arc<FileTransferRunner>,
    pub installer: InstallerResolver,
    pub monitors: MonitorHub,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// 由配置构建，主机注册表从 FLEET_HOSTS / FLEET_HOSTS_FILE 加载
    pub async fn new(config: EnvConfig) -> Self {
        let registry: Arc<dyn HostRegistry> = Arc::new(StaticHostRegistry::from_config(&config).await);
        Self::with_registry(config, registry)
    }

    /// 使用外部提供的主机注册表
    pub fn with_registry(config: EnvConfig, registry: Arc<dyn HostRegistry>) -> Self {
        Self::with_transport(config, registry, None)
    }

    pub fn with_transport(
        config: EnvConfig,
        registry: Arc<dyn HostRegistry>,
        transport: Option<Transport>,
    ) -> Self {
        let transport = transport.unwrap_or_else(|| Transport::from_config(&config));

        let executor = Arc::new(CommandExecutor::new(
            registry.clone(),
            transport.clone(),
            config.exec.options(),
        ));
        let streamer = Arc::new(StreamingExecutor::new(registry.clone(), transport.clone()));
        let transfer = Arc::new(FileTransferRunner::new(
            registry.clone(),
            transport,
            config.transfer.options(),
        ));
        let installer = InstallerResolver::new(config.github_token.clone());

        Self {
            config,
            registry,
            executor,
            streamer,
            transfer,
            installer,
            monitors: MonitorHub::new(),
            started_at: Utc::now(),
        }
    }
}
