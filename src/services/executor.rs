//! 单次命令执行
//!
//! 解析目标 -> 构造传输命令 -> 缓冲执行 -> 按退出状态分类结果

use std::sync::Arc;
use std::time::Instant;
use tokio::process::Command;
use tracing::{info, warn};

use crate::domain::exec::{ExecOptions, ExecOutput};
use crate::domain::target::Target;
use crate::error::ExecError;
use crate::infra::command::run_captured;
use crate::infra::{resolve_target, HostRegistry, Transport};

/// 单次命令执行器
pub struct CommandExecutor {
    registry: Arc<dyn HostRegistry>,
    transport: Transport,
    options: ExecOptions,
}

impl CommandExecutor {
    pub fn new(registry: Arc<dyn HostRegistry>, transport: Transport, options: ExecOptions) -> Self {
        Self {
            registry,
            transport,
            options,
        }
    }

    pub fn options(&self) -> ExecOptions {
        self.options
    }

    /// 校验并解析目标
    pub async fn resolve(&self, target: &str) -> Result<Target, ExecError> {
        resolve_target(self.registry.as_ref(), target).await
    }

    /// 使用默认限制执行
    pub async fn run(&self, target: &str, command: &str) -> Result<ExecOutput, ExecError> {
        self.run_with(target, command, self.options).await
    }

    /// 使用指定限制执行
    pub async fn run_with(
        &self,
        target: &str,
        command: &str,
        options: ExecOptions,
    ) -> Result<ExecOutput, ExecError> {
        let target = self.resolve(target).await?;
        let cmd = self.transport.shell_command(&target, command);
        execute(&target, cmd, &options).await
    }
}

/// 执行已构造好的命令，非零退出或信号终止视为失败
pub(crate) async fn execute(
    target: &Target,
    cmd: Command,
    options: &ExecOptions,
) -> Result<ExecOutput, ExecError> {
    let started = Instant::now();
    info!(target_host = %target, timeout = ?options.timeout, "Executing command");

    let completed = run_captured(cmd, options).await?;

    if completed.exit.success() {
        info!(
            target_host = %target,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Command completed"
        );
        return Ok(ExecOutput {
            stdout: completed.output.stdout,
            stderr: completed.output.stderr,
            exit_status: 0,
        });
    }

    warn!(
        target_host = %target,
        exit_code = ?completed.exit.code,
        signal = ?completed.exit.signal,
        "Command failed"
    );
    Err(ExecError::execution_failed(completed.exit, completed.output))
}
