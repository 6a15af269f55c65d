//! 统一错误处理
//!
//! - `ExecError`：执行层错误分类，总是携带已捕获的输出
//! - `ApiError`：HTTP 层错误，实现 `IntoResponse`

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

use crate::domain::exec::{CapturedOutput, ExitInfo};

/// 执行错误
#[derive(Debug, Error)]
pub enum ExecError {
    /// 注册表中不存在该目标，未启动任何进程
    #[error("Target host '{target}' not found in registry")]
    TargetNotFound { target: String },

    /// 非零退出或被信号终止
    #[error("{message}")]
    ExecutionFailed {
        message: String,
        exit: ExitInfo,
        output: CapturedOutput,
    },

    /// 进程无法启动
    #[error("Failed to spawn {program}: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// 超时，进程已被杀死并回收
    #[error("Command timed out after {after:?}")]
    Timeout {
        after: Duration,
        output: CapturedOutput,
    },

    /// 输出超过缓冲上限，进程已被杀死并回收
    #[error("Command output exceeded the {limit} byte limit")]
    OutputTooLarge {
        limit: usize,
        output: CapturedOutput,
    },

    /// 复制成功但属主修复失败
    #[error("File copied but ownership repair failed: {message}")]
    TransferFollowupFailed {
        message: String,
        output: CapturedOutput,
    },

    /// 读取输出或等待进程失败
    #[error("Failed to wait for command: {0}")]
    WaitFailed(#[source] std::io::Error),
}

impl ExecError {
    /// 已捕获的输出（没有时为空字符串）
    pub fn captured(&self) -> CapturedOutput {
        match self {
            ExecError::ExecutionFailed { output, .. }
            | ExecError::Timeout { output, .. }
            | ExecError::OutputTooLarge { output, .. }
            | ExecError::TransferFollowupFailed { output, .. } => output.clone(),
            _ => CapturedOutput::default(),
        }
    }

    /// 退出信息（仅 ExecutionFailed）
    pub fn exit_info(&self) -> Option<&ExitInfo> {
        match self {
            ExecError::ExecutionFailed { exit, .. } => Some(exit),
            _ => None,
        }
    }

    /// 错误分类名
    pub fn kind(&self) -> &'static str {
        match self {
            ExecError::TargetNotFound { .. } => "target_not_found",
            ExecError::ExecutionFailed { .. } => "execution_failed",
            ExecError::SpawnFailed { .. } => "spawn_failed",
            ExecError::Timeout { .. } => "timeout",
            ExecError::OutputTooLarge { .. } => "output_too_large",
            ExecError::TransferFollowupFailed { .. } => "transfer_followup_failed",
            ExecError::WaitFailed(_) => "wait_failed",
        }
    }

    /// 由退出信息和输出构造 ExecutionFailed
    ///
    /// 优先使用 stderr 作为消息，为空时回退到通用描述
    pub fn execution_failed(exit: ExitInfo, output: CapturedOutput) -> Self {
        let stderr = output.stderr.trim();
        let message = if !stderr.is_empty() {
            stderr.to_string()
        } else {
            match (&exit.code, &exit.signal) {
                (_, Some(signal)) => format!("Command terminated by signal {}", signal),
                (Some(code), None) => format!("Command failed with exit code {}", code),
                (None, None) => "Command failed".to_string(),
            }
        };
        ExecError::ExecutionFailed {
            message,
            exit,
            output,
        }
    }
}

/// API 错误响应结构
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// 统一 API 错误类型
#[derive(Debug)]
pub enum ApiError {
    /// 404 - 资源未找到
    NotFound(String),
    /// 400 - 请求无效
    BadRequest(String),
    /// 500 - 内部错误
    Internal(String),
}

impl ApiError {
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound(resource.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl From<ExecError> for ApiError {
    fn from(err: ExecError) -> Self {
        match err {
            ExecError::TargetNotFound { target } => ApiError::not_found(format!("Target '{}'", target)),
            other => ApiError::internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ApiError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                "not_found",
                format!("{} not found", resource),
            ),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
        };

        let body = ErrorResponse::new(error_type, message);
        (status, Json(body)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::NotFound(r) => write!(f, "Not found: {}", r),
            ApiError::BadRequest(m) => write!(f, "Bad request: {}", m),
            ApiError::Internal(m) => write!(f, "Internal error: {}", m),
        }
    }
}

impl std::error::Error for ApiError {}

/// 便捷类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_with_details() {
        let resp = ErrorResponse::new("test_error", "Test message").with_details("Extra info");
        assert_eq!(resp.error, "test_error");
        assert_eq!(resp.details, Some("Extra info".to_string()));
    }

    #[test]
    fn test_execution_failed_prefers_stderr() {
        let err = ExecError::execution_failed(
            ExitInfo::exited(1),
            CapturedOutput::new("partial", "  permission denied\n"),
        );
        assert_eq!(err.to_string(), "permission denied");
        assert_eq!(err.captured().stdout, "partial");
    }

    #[test]
    fn test_execution_failed_generic_message() {
        let err = ExecError::execution_failed(ExitInfo::exited(7), CapturedOutput::default());
        assert_eq!(err.to_string(), "Command failed with exit code 7");

        let err = ExecError::execution_failed(ExitInfo::signaled("SIGKILL"), CapturedOutput::default());
        assert_eq!(err.to_string(), "Command terminated by signal SIGKILL");
    }

    #[test]
    fn test_timeout_message() {
        let err = ExecError::Timeout {
            after: Duration::from_secs(30),
            output: CapturedOutput::default(),
        };
        assert_eq!(err.to_string(), "Command timed out after 30s");
        assert_eq!(err.kind(), "timeout");
    }

    #[test]
    fn test_target_not_found_maps_to_404() {
        let api: ApiError = ExecError::TargetNotFound {
            target: "ghost".to_string(),
        }
        .into();
        assert!(matches!(api, ApiError::NotFound(_)));
    }
}
