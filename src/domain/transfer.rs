//! 文件传输领域模型

use serde::{Deserialize, Serialize};

/// 传输方向
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferDirection {
    /// 本地 -> 目标主机
    Push,
    /// 目标主机 -> 本地
    Pull,
}

impl TransferDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferDirection::Push => "push",
            TransferDirection::Pull => "pull",
        }
    }
}

/// 传输描述
#[derive(Clone, Debug, Deserialize)]
pub struct TransferRequest {
    pub target: String,
    pub local_path: String,
    pub remote_path: String,
    pub direction: TransferDirection,
    /// 调用方附带的不透明数据，原样回传
    #[serde(default)]
    pub extra_fields: serde_json::Value,
}

impl TransferRequest {
    pub fn new(
        target: impl Into<String>,
        local_path: impl Into<String>,
        remote_path: impl Into<String>,
        direction: TransferDirection,
    ) -> Self {
        Self {
            target: target.into(),
            local_path: local_path.into(),
            remote_path: remote_path.into(),
            direction,
            extra_fields: serde_json::Value::Null,
        }
    }

    pub fn with_extra_fields(mut self, extra: serde_json::Value) -> Self {
        self.extra_fields = extra;
        self
    }
}

/// 传输成功结果（push 时包含属主修复步骤的输出）
#[derive(Clone, Debug, Serialize)]
pub struct TransferOutput {
    pub stdout: String,
    pub stderr: String,
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub extra_fields: serde_json::Value,
}
