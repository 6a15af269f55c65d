//! Fleet Exec Agent - 主机集群远程操作执行核心
//!
//! 在本机或已登记的远程主机上执行命令、流式输出、传输文件

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod infra;
pub mod services;
pub mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::env::constants::VERSION;
use crate::config::EnvConfig;
use crate::state::{get_shutdown_token, trigger_shutdown, AppState};

/// 命令行覆盖的运行参数
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    /// 覆盖监听端口
    pub port_override: Option<u16>,
}

/// 初始化日志
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "fleet_exec_agent=info,tower_http=info".into());

    // 重复初始化（如测试中）时忽略错误
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// 初始化并运行 agent，直到收到退出信号
pub async fn init_and_run_agent_with_config(runtime: RuntimeConfig) {
    init_tracing();

    let config = EnvConfig::from_env();
    let port = runtime.port_override.unwrap_or(config.port);

    let state = Arc::new(AppState::new(config).await);
    info!(
        version = VERSION,
        port,
        local_shell = %state.config.local_shell,
        ssh_user = %state.config.ssh.user,
        "Fleet exec agent starting"
    );

    let app = api::router(state.clone());
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(addr = %addr, error = %e, "Failed to bind listener");
            return;
        }
    };
    info!(addr = %addr, "Listening");

    let shutdown = get_shutdown_token();
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Shutdown signal received");
        trigger_shutdown();
    });

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await;
    if let Err(e) = served {
        error!(error = %e, "Server error");
    }

    state.monitors.stop_all().await;
    info!("Fleet exec agent stopped");
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
