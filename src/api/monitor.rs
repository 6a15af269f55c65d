//! 主机监控 API
//!
//! 包含 /monitors, /monitors/:id 端点

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::{sync::Arc, time::Duration};

use crate::error::{ApiError, ApiResult};
use crate::services::HostMonitor;
use crate::state::{AppState, MonitorStatus};

#[derive(Debug, Serialize)]
pub struct MonitorStarted {
    pub success: bool,
    pub id: String,
    pub target: String,
}

#[derive(Debug, Serialize)]
pub struct MonitorStopped {
    pub success: bool,
    pub id: String,
}

/// 创建监控路由
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/monitors", get(list_monitors))
        .route(
            "/monitors/:id",
            get(get_monitor).post(start_monitor).delete(stop_monitor),
        )
}

/// 启动监控（路径参数为目标主机）
///
/// POST /monitors/:target
async fn start_monitor(
    State(state): State<Arc<AppState>>,
    Path(target): Path<String>,
) -> ApiResult<Json<MonitorStarted>> {
    state.executor.resolve(&target).await?;

    let interval = Duration::from_secs(state.config.monitor_interval_secs.max(1));
    let handle = HostMonitor::start(state.executor.clone(), target.clone(), interval);
    let id = state.monitors.insert(handle).await;

    Ok(Json(MonitorStarted {
        success: true,
        id,
        target,
    }))
}

/// GET /monitors
async fn list_monitors(State(state): State<Arc<AppState>>) -> Json<Vec<MonitorStatus>> {
    Json(state.monitors.list().await)
}

/// GET /monitors/:id
async fn get_monitor(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<MonitorStatus>> {
    state
        .monitors
        .status(&id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Monitor '{}'", id)))
}

/// DELETE /monitors/:id
async fn stop_monitor(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<MonitorStopped>> {
    if !state.monitors.stop(&id).await {
        return Err(ApiError::not_found(format!("Monitor '{}'", id)));
    }
    Ok(Json(MonitorStopped { success: true, id }))
}
