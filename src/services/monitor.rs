//! 主机监控
//!
//! 周期性在目标上执行系统快照命令，最新结果保存在 watch 通道中。
//! 每个监控由一个 `MonitorHandle` 持有，handle 被丢弃或 stop 后后台任务结束

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::executor::CommandExecutor;

/// 系统快照命令
pub const SNAPSHOT_COMMAND: &str = r#"echo "=== SYSTEM MONITOR ==="
echo "Timestamp: $(date)"
echo ""
echo "=== CPU INFORMATION ==="
lscpu | grep -E "Model name|CPU MHz|CPU\(s\):"
echo ""
echo "=== MEMORY USAGE ==="
free -h
echo ""
echo "=== DISK USAGE ==="
df -h | head -10
echo ""
echo "=== LOAD AVERAGE ==="
uptime
echo ""
echo "=== TOP PROCESSES (CPU) ==="
ps aux --sort=-%cpu | head -10
echo ""
echo "=== TOP PROCESSES (MEMORY) ==="
ps aux --sort=-%mem | head -10
echo ""
echo "=== NETWORK INTERFACES ==="
ip addr show | grep -E "inet |UP|DOWN" | head -10
echo ""
echo "=== ACTIVE CONNECTIONS ==="
ss -tuln | head -10"#;

/// 最近一次快照
#[derive(Clone, Debug, Default, Serialize)]
pub struct MonitorSnapshot {
    /// 快照输出；失败时为错误描述
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl MonitorSnapshot {
    fn initializing() -> Self {
        Self {
            output: "Initializing system monitoring...\n".to_string(),
            ..Self::default()
        }
    }
}

/// 监控启动器
pub struct HostMonitor;

impl HostMonitor {
    /// 启动监控：立即执行一次，之后每 interval 执行一次
    pub fn start(executor: Arc<CommandExecutor>, target: String, interval: Duration) -> MonitorHandle {
        Self::start_with_command(executor, target, interval, SNAPSHOT_COMMAND.to_string())
    }

    /// 使用自定义快照命令启动
    pub fn start_with_command(
        executor: Arc<CommandExecutor>,
        target: String,
        interval: Duration,
        command: String,
    ) -> MonitorHandle {
        let (tx, rx) = watch::channel(MonitorSnapshot::initializing());
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let task_target = target.clone();

        let task = tokio::spawn(async move {
            info!(target_host = %task_target, interval = ?interval, "Host monitor started");
            loop {
                let snapshot = tokio::select! {
                    _ = task_cancel.cancelled() => break,
                    result = executor.run(&task_target, &command) => match result {
                        Ok(output) => MonitorSnapshot {
                            output: output.stdout,
                            error: None,
                            updated_at: Some(Utc::now()),
                        },
                        Err(e) => {
                            warn!(target_host = %task_target, error = %e, "Monitor snapshot failed");
                            MonitorSnapshot {
                                output: format!("Error retrieving system stats: {}\n", e),
                                error: Some(e.to_string()),
                                updated_at: Some(Utc::now()),
                            }
                        }
                    },
                };
                let _ = tx.send(snapshot);

                tokio::select! {
                    _ = task_cancel.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
            }
            debug!(target_host = %task_target, "Host monitor stopped");
        });

        MonitorHandle {
            target,
            started_at: Utc::now(),
            snapshot: rx,
            cancel,
            task: Some(task),
        }
    }
}

/// 运行中监控的所有权句柄
pub struct MonitorHandle {
    target: String,
    started_at: DateTime<Utc>,
    snapshot: watch::Receiver<MonitorSnapshot>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl MonitorHandle {
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// 最近一次快照
    pub fn latest(&self) -> MonitorSnapshot {
        self.snapshot.borrow().clone()
    }

    /// 订阅快照变化
    pub fn subscribe(&self) -> watch::Receiver<MonitorSnapshot> {
        self.snapshot.clone()
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled() && self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// 停止监控并等待后台任务结束
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        info!(target_host = %self.target, "Host monitor stopped");
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
