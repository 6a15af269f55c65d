//! API 模块
//!
//! HTTP handlers 和路由组装

pub mod exec;
pub mod files;
pub mod health;
pub mod monitor;

use axum::Router;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;

/// 构建完整的 API 路由
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health & Status
        .merge(health::router())
        // Exec & Stream
        .merge(exec::router())
        // Files
        .merge(files::router())
        // Monitors
        .merge(monitor::router())
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
