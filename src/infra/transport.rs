//! 传输层：把 (目标, 命令) 翻译为具体的进程调用
//!
//! - 本机：`bash -lc <command>` 参数向量，不经过额外的 shell 拼接
//! - 远程：`ssh ... root@host "bash -lc '<command>'"`，远端 sshd 会把参数按空格拼接，
//!   所以远程命令整体作为一个单引号字符串传递

use tokio::process::Command;
use tracing::debug;

use super::shell::single_quote;
use crate::config::EnvConfig;
use crate::domain::target::Target;
use crate::domain::transfer::TransferDirection;

/// ssh / scp 共用的选项
const SSH_OPTIONS: [&str; 6] = [
    "-o",
    "LogLevel=quiet",
    "-o",
    "StrictHostKeyChecking=no",
    "-o",
    "BatchMode=yes",
];

/// 进程调用构造器
#[derive(Clone, Debug)]
pub struct Transport {
    ssh_program: String,
    scp_program: String,
    remote_user: String,
    local_shell: String,
    local_shell_args: Vec<String>,
}

impl Default for Transport {
    fn default() -> Self {
        Self {
            ssh_program: "ssh".to_string(),
            scp_program: "scp".to_string(),
            remote_user: "root".to_string(),
            local_shell: "bash".to_string(),
            local_shell_args: vec!["-lc".to_string()],
        }
    }
}

impl Transport {
    pub fn from_config(config: &EnvConfig) -> Self {
        Self {
            ssh_program: config.ssh.ssh_program.clone(),
            scp_program: config.ssh.scp_program.clone(),
            remote_user: config.ssh.user.clone(),
            local_shell: config.local_shell.clone(),
            ..Self::default()
        }
    }

    /// 替换本机 shell 及其前置参数（命令字符串总是最后一个参数）
    pub fn with_local_shell<I, S>(mut self, program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.local_shell = program.into();
        self.local_shell_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_ssh_program(mut self, program: impl Into<String>) -> Self {
        self.ssh_program = program.into();
        self
    }

    pub fn with_scp_program(mut self, program: impl Into<String>) -> Self {
        self.scp_program = program.into();
        self
    }

    fn remote_login(&self, host: &str) -> String {
        format!("{}@{}", self.remote_user, host)
    }

    /// 在目标上执行 shell 命令
    ///
    /// 远程目标只能终止本地 ssh 客户端；不分配 tty 时远端命令
    /// 会继续运行，直到向已关闭的通道写入输出
    pub fn shell_command(&self, target: &Target, command: &str) -> Command {
        let cmd = match target {
            Target::Local => {
                let mut cmd = Command::new(&self.local_shell);
                cmd.args(&self.local_shell_args).arg(command);
                cmd
            }
            Target::Remote(host) => {
                let mut cmd = Command::new(&self.ssh_program);
                cmd.args(SSH_OPTIONS)
                    .arg(self.remote_login(host))
                    .arg(format!("bash -lc {}", single_quote(command)));
                cmd
            }
        };
        debug!(target_host = %target, argv = ?cmd.as_std(), "Built shell command");
        cmd
    }

    /// 在本机与目标之间复制文件
    ///
    /// push: local_path -> remote_path；pull: remote_path -> local_path
    pub fn copy_command(
        &self,
        target: &Target,
        local_path: &str,
        remote_path: &str,
        direction: TransferDirection,
    ) -> Command {
        let cmd = match target {
            Target::Local => {
                let mut cmd = Command::new("cp");
                match direction {
                    TransferDirection::Push => cmd.arg("--").arg(local_path).arg(remote_path),
                    TransferDirection::Pull => cmd.arg("--").arg(remote_path).arg(local_path),
                };
                cmd
            }
            Target::Remote(host) => {
                let remote = format!("{}:{}", self.remote_login(host), remote_path);
                let mut cmd = Command::new(&self.scp_program);
                cmd.args(SSH_OPTIONS);
                match direction {
                    TransferDirection::Push => cmd.arg(local_path).arg(remote),
                    TransferDirection::Pull => cmd.arg(remote).arg(local_path),
                };
                cmd
            }
        };
        debug!(
            target_host = %target,
            direction = direction.as_str(),
            argv = ?cmd.as_std(),
            "Built copy command"
        );
        cmd
    }
}
