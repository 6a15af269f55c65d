//! 命令执行相关领域模型

use serde::Serialize;
use std::time::Duration;

use crate::error::ExecError;

/// 单次执行的资源限制
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExecOptions {
    /// 墙钟超时
    pub timeout: Duration,
    /// stdout / stderr 各自的最大字节数
    pub max_output_bytes: usize,
}

impl ExecOptions {
    pub fn new(timeout: Duration, max_output_bytes: usize) -> Self {
        Self {
            timeout,
            max_output_bytes,
        }
    }

    /// 覆盖超时
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for ExecOptions {
    fn default() -> Self {
        use crate::config::env::constants::{DEFAULT_EXEC_MAX_OUTPUT_BYTES, DEFAULT_EXEC_TIMEOUT_SECS};
        Self::new(
            Duration::from_secs(DEFAULT_EXEC_TIMEOUT_SECS),
            DEFAULT_EXEC_MAX_OUTPUT_BYTES,
        )
    }
}

/// 已捕获的输出，失败时也总是存在（可能为空字符串）
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CapturedOutput {
    pub stdout: String,
    pub stderr: String,
}

impl CapturedOutput {
    pub fn new(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// 从原始字节构建（非 UTF-8 内容按 lossy 处理）
    pub fn from_bytes(stdout: &[u8], stderr: &[u8]) -> Self {
        Self {
            stdout: String::from_utf8_lossy(stdout).into_owned(),
            stderr: String::from_utf8_lossy(stderr).into_owned(),
        }
    }

    /// 顺序拼接另一步骤的输出
    pub fn append(mut self, other: &CapturedOutput) -> Self {
        self.stdout.push_str(&other.stdout);
        self.stderr.push_str(&other.stderr);
        self
    }
}

/// 进程退出信息
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ExitInfo {
    /// 退出码（被信号终止时为 None）
    pub code: Option<i32>,
    /// 终止信号名称，如 "SIGKILL"
    pub signal: Option<String>,
}

impl ExitInfo {
    pub fn exited(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    pub fn signaled(signal: impl Into<String>) -> Self {
        Self {
            code: None,
            signal: Some(signal.into()),
        }
    }

    /// 退出码为 0 且没有信号
    pub fn success(&self) -> bool {
        self.code == Some(0) && self.signal.is_none()
    }

    /// 流式 done 事件的载荷文本，如 `exit 0` 或 `exit null signal SIGTERM`
    pub fn describe(&self) -> String {
        let code = self
            .code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "null".to_string());
        match &self.signal {
            Some(signal) => format!("exit {} signal {}", code, signal),
            None => format!("exit {}", code),
        }
    }
}

/// 成功执行的结果
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_status: i32,
}

impl ExecOutput {
    pub fn captured(&self) -> CapturedOutput {
        CapturedOutput::new(self.stdout.clone(), self.stderr.clone())
    }
}

/// 对外统一的执行结果结构
///
/// `success=false` 时总是带有可读的 `error`
#[derive(Clone, Debug, Serialize)]
pub struct ExecResponse {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_status: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// 错误分类，如 "target_not_found"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_fields: Option<serde_json::Value>,
}

impl ExecResponse {
    pub fn with_extra_fields(mut self, extra: serde_json::Value) -> Self {
        if !extra.is_null() {
            self.extra_fields = Some(extra);
        }
        self
    }
}

impl From<Result<ExecOutput, ExecError>> for ExecResponse {
    fn from(result: Result<ExecOutput, ExecError>) -> Self {
        match result {
            Ok(output) => Self {
                success: true,
                stdout: output.stdout,
                stderr: output.stderr,
                exit_status: Some(output.exit_status),
                signal: None,
                error: None,
                kind: None,
                extra_fields: None,
            },
            Err(err) => {
                let captured = err.captured();
                let exit = err.exit_info().cloned().unwrap_or_default();
                Self {
                    success: false,
                    stdout: captured.stdout,
                    stderr: captured.stderr,
                    exit_status: exit.code,
                    signal: exit.signal,
                    error: Some(err.to_string()),
                    kind: Some(err.kind()),
                    extra_fields: None,
                }
            }
        }
    }
}
