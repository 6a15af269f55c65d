//! 文件 API
//!
//! 包含 /files/:target（目录列表）, /files/:target/transfer（传输）端点

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::EnvConfig;
use crate::domain::exec::{ExecOptions, ExecResponse};
use crate::domain::file::FileEntry;
use crate::domain::transfer::{TransferDirection, TransferOutput, TransferRequest};
use crate::error::{ApiError, ApiResult, ExecError};
use crate::services::listing::list_directory;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub path: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub success: bool,
    pub path: String,
    pub files: Vec<FileEntry>,
}

/// 传输请求体（目标来自路径）
#[derive(Debug, Deserialize)]
pub struct TransferBody {
    pub local_path: String,
    pub remote_path: String,
    pub direction: TransferDirection,
    #[serde(default)]
    pub extra_fields: serde_json::Value,
}

/// 创建文件路由
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/files/:target", get(list_files))
        .route("/files/:target/transfer", post(transfer_file))
}

/// 列出目录
///
/// GET /files/:target?path=/srv
async fn list_files(
    State(state): State<Arc<AppState>>,
    Path(target): Path<String>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<ListResponse>> {
    let path = query
        .path
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("path is required"))?;

    let files = list_directory(&state.executor, &target, &path, listing_options(&state.config)).await?;
    Ok(Json(ListResponse {
        success: true,
        path,
        files,
    }))
}

/// 传输文件
///
/// POST /files/:target/transfer
async fn transfer_file(
    State(state): State<Arc<AppState>>,
    Path(target): Path<String>,
    Json(body): Json<TransferBody>,
) -> ApiResult<Json<ExecResponse>> {
    if body.local_path.trim().is_empty() || body.remote_path.trim().is_empty() {
        return Err(ApiError::bad_request("local_path and remote_path are required"));
    }

    let extra = body.extra_fields.clone();
    let request = TransferRequest::new(target, body.local_path, body.remote_path, body.direction)
        .with_extra_fields(body.extra_fields);

    let result = state.transfer.transfer(&request).await;
    Ok(Json(transfer_response(result).with_extra_fields(extra)))
}

/// 目录列表属于文件操作，使用传输的超时与输出上限
fn listing_options(config: &EnvConfig) -> ExecOptions {
    config.transfer.options()
}

fn transfer_response(result: Result<TransferOutput, ExecError>) -> ExecResponse {
    let result = result.map(|output| crate::domain::exec::ExecOutput {
        stdout: output.stdout,
        stderr: output.stderr,
        exit_status: 0,
    });
    ExecResponse::from(result)
}
