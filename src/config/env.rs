//! 环境变量配置加载

use std::env;
use std::time::Duration;
use tracing::warn;

use crate::domain::exec::ExecOptions;

use self::constants::*;

/// 环境配置
#[derive(Clone, Debug)]
pub struct EnvConfig {
    /// 服务监听端口
    pub port: u16,
    /// 远程传输配置
    pub ssh: SshConfig,
    /// 本地 shell 程序
    pub local_shell: String,
    /// 已登记的主机（FLEET_HOSTS）
    pub hosts: Vec<String>,
    /// 主机清单文件（FLEET_HOSTS_FILE，每行一个，# 开头为注释）
    pub hosts_file: Option<String>,
    /// 交互式命令的限制
    pub exec: ExecLimits,
    /// 文件传输的限制
    pub transfer: ExecLimits,
    /// 主机监控刷新间隔（秒）
    pub monitor_interval_secs: u64,
    /// GitHub token（提高 API 速率限制）
    pub github_token: Option<String>,
}

/// SSH / SCP 配置
#[derive(Clone, Debug)]
pub struct SshConfig {
    /// ssh 程序路径
    pub ssh_program: String,
    /// scp 程序路径
    pub scp_program: String,
    /// 远程特权账号
    pub user: String,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            ssh_program: "ssh".to_string(),
            scp_program: "scp".to_string(),
            user: DEFAULT_SSH_USER.to_string(),
        }
    }
}

impl SshConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            ssh_program: env::var("FLEET_SSH_PROGRAM").unwrap_or(defaults.ssh_program),
            scp_program: env::var("FLEET_SCP_PROGRAM").unwrap_or(defaults.scp_program),
            user: env::var("FLEET_SSH_USER")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.user),
        }
    }
}

/// 超时与输出缓冲上限
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExecLimits {
    pub timeout_secs: u64,
    pub max_output_bytes: usize,
}

impl ExecLimits {
    pub fn options(&self) -> ExecOptions {
        ExecOptions::new(Duration::from_secs(self.timeout_secs), self.max_output_bytes)
    }
}

impl EnvConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> Self {
        let port = parse_var("PORT", DEFAULT_PORT);

        let hosts = env::var("FLEET_HOSTS")
            .map(|v| parse_host_list(&v))
            .unwrap_or_default();
        let hosts_file = env::var("FLEET_HOSTS_FILE").ok().filter(|s| !s.is_empty());
        if hosts.is_empty() && hosts_file.is_none() {
            warn!("No FLEET_HOSTS or FLEET_HOSTS_FILE configured, only local targets will resolve");
        }

        let exec = ExecLimits {
            timeout_secs: parse_var("FLEET_EXEC_TIMEOUT_SECS", DEFAULT_EXEC_TIMEOUT_SECS),
            max_output_bytes: parse_var("FLEET_EXEC_MAX_OUTPUT_BYTES", DEFAULT_EXEC_MAX_OUTPUT_BYTES),
        };

        let transfer = ExecLimits {
            timeout_secs: parse_var("FLEET_TRANSFER_TIMEOUT_SECS", DEFAULT_TRANSFER_TIMEOUT_SECS),
            max_output_bytes: parse_var(
                "FLEET_TRANSFER_MAX_OUTPUT_BYTES",
                DEFAULT_TRANSFER_MAX_OUTPUT_BYTES,
            ),
        };

        Self {
            port,
            ssh: SshConfig::from_env(),
            local_shell: env::var("FLEET_LOCAL_SHELL").unwrap_or_else(|_| "bash".to_string()),
            hosts,
            hosts_file,
            exec,
            transfer,
            monitor_interval_secs: parse_var("FLEET_MONITOR_INTERVAL_SECS", DEFAULT_MONITOR_INTERVAL_SECS),
            github_token: env::var("GITHUB_TOKEN").ok().filter(|s| !s.is_empty()),
        }
    }
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            ssh: SshConfig::default(),
            local_shell: "bash".to_string(),
            hosts: Vec::new(),
            hosts_file: None,
            exec: ExecLimits {
                timeout_secs: DEFAULT_EXEC_TIMEOUT_SECS,
                max_output_bytes: DEFAULT_EXEC_MAX_OUTPUT_BYTES,
            },
            transfer: ExecLimits {
                timeout_secs: DEFAULT_TRANSFER_TIMEOUT_SECS,
                max_output_bytes: DEFAULT_TRANSFER_MAX_OUTPUT_BYTES,
            },
            monitor_interval_secs: DEFAULT_MONITOR_INTERVAL_SECS,
            github_token: None,
        }
    }
}

/// 解析逗号分隔的主机列表
pub fn parse_host_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// 解析主机清单文件内容
pub fn parse_hosts_file(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// 读取并解析环境变量，缺失或非法时使用默认值
fn parse_var<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                warn!(key = key, value = %raw, "Invalid value, using default");
                default
            }
        },
        Err(_) => default,
    }
}

/// 常量
pub mod constants {
    /// 默认监听端口
    pub const DEFAULT_PORT: u16 = 3077;

    /// 远程执行使用的特权账号
    pub const DEFAULT_SSH_USER: &str = "root";

    /// 交互式命令超时（秒）
    pub const DEFAULT_EXEC_TIMEOUT_SECS: u64 = 30;

    /// 交互式命令输出上限
    pub const DEFAULT_EXEC_MAX_OUTPUT_BYTES: usize = 1024 * 1024;

    /// 文件传输超时（秒）
    pub const DEFAULT_TRANSFER_TIMEOUT_SECS: u64 = 120;

    /// 文件传输输出上限（针对传输工具的噪声，而非文件内容）
    pub const DEFAULT_TRANSFER_MAX_OUTPUT_BYTES: usize = 20 * 1024 * 1024;

    /// 主机监控刷新间隔（秒）
    pub const DEFAULT_MONITOR_INTERVAL_SECS: u64 = 3;

    /// 流事件通道容量
    pub const STREAM_CHANNEL_CAPACITY: usize = 256;

    /// 版本号
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_host_list() {
        assert_eq!(
            parse_host_list(" 10.0.0.2, game-01 ,,"),
            vec!["10.0.0.2".to_string(), "game-01".to_string()]
        );
        assert!(parse_host_list("").is_empty());
    }

    #[test]
    fn test_parse_hosts_file_skips_comments() {
        let content = "# fleet\n10.0.0.2\n\n  game-01  \n#10.0.0.9\n";
        assert_eq!(parse_hosts_file(content), vec!["10.0.0.2", "game-01"]);
    }

    #[test]
    fn test_parse_var_fallback() {
        env::set_var("FLEET_TEST_PARSE_VAR", "not-a-number");
        assert_eq!(parse_var("FLEET_TEST_PARSE_VAR", 42u64), 42);

        env::set_var("FLEET_TEST_PARSE_VAR", "7");
        assert_eq!(parse_var("FLEET_TEST_PARSE_VAR", 42u64), 7);

        env::remove_var("FLEET_TEST_PARSE_VAR");
        assert_eq!(parse_var("FLEET_TEST_PARSE_VAR", 42u64), 42);
    }

    #[test]
    fn test_transfer_limits_are_larger() {
        let config = EnvConfig::default();
        assert!(config.transfer.timeout_secs > config.exec.timeout_secs);
        assert!(config.transfer.max_output_bytes >= 20 * 1024 * 1024);
        assert_eq!(config.exec.options().timeout, Duration::from_secs(30));
    }
}
