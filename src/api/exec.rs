//! 命令执行 API
//!
//! 包含 /exec/:target, /stream/:target, /remote-exec/:target 端点

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::post,
    Json, Router,
};
use futures::stream::Stream;
use serde::Deserialize;
use std::{convert::Infallible, sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tracing::info;

use crate::config::env::constants::STREAM_CHANNEL_CAPACITY;
use crate::domain::exec::ExecResponse;
use crate::domain::stream::StreamEvent;
use crate::error::{ApiError, ApiResult};
use crate::services::{build_remote_exec, build_remote_exec_strict, AppSource};
use crate::state::{get_shutdown_token, AppState};

/// 执行请求
#[derive(Debug, Deserialize)]
pub struct ExecRequest {
    pub command: String,
    /// 覆盖默认超时
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// 流式执行请求
#[derive(Debug, Deserialize)]
pub struct StreamRequest {
    pub command: String,
}

/// 远程脚本执行请求
///
/// `url` 与 `app` 二选一，`app` 通过安装来源解析出脚本地址
#[derive(Debug, Deserialize)]
pub struct RemoteExecRequest {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub app: Option<AppSource>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub strict: bool,
}

/// 创建执行路由
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/exec/:target", post(exec_command))
        .route("/stream/:target", post(stream_command))
        .route("/remote-exec/:target", post(remote_exec))
}

/// 单次执行
///
/// POST /exec/:target
async fn exec_command(
    State(state): State<Arc<AppState>>,
    Path(target): Path<String>,
    Json(req): Json<ExecRequest>,
) -> ApiResult<Json<ExecResponse>> {
    if req.command.trim().is_empty() {
        return Err(ApiError::bad_request("command must not be empty"));
    }

    let mut options = state.executor.options();
    if let Some(secs) = req.timeout_secs.filter(|s| *s > 0) {
        options = options.with_timeout(Duration::from_secs(secs));
    }

    let result = state.executor.run_with(&target, &req.command, options).await;
    Ok(Json(ExecResponse::from(result)))
}

/// 流式执行
///
/// POST /stream/:target
async fn stream_command(
    State(state): State<Arc<AppState>>,
    Path(target): Path<String>,
    Json(req): Json<StreamRequest>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    if req.command.trim().is_empty() {
        return Err(ApiError::bad_request("command must not be empty"));
    }

    let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
    spawn_stream(&state, target, req.command, tx);
    Ok(event_stream(rx))
}

/// 拉取并执行远程脚本
///
/// POST /remote-exec/:target
async fn remote_exec(
    State(state): State<Arc<AppState>>,
    Path(target): Path<String>,
    Json(req): Json<RemoteExecRequest>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let url = match (req.url.filter(|u| !u.trim().is_empty()), req.app) {
        (Some(url), _) => url,
        (None, Some(app)) => state
            .installer
            .resolve(&app)
            .await
            .ok_or_else(|| ApiError::bad_request("Unable to resolve installer URL"))?,
        (None, None) => return Err(ApiError::bad_request("url or app is required")),
    };

    let built = if req.strict {
        build_remote_exec_strict(&url, &req.args)
    } else {
        build_remote_exec(&url, &req.args)
    };
    info!(target_host = %target, url = %built.url, params = built.parameters.len(), "Remote exec requested");

    let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
    let _ = tx
        .send(StreamEvent::info(format!("Running {}", built.url)))
        .await;
    spawn_stream(&state, target, built.command, tx);
    Ok(event_stream(rx))
}

/// 在后台执行流式命令，服务关闭时一并取消
fn spawn_stream(state: &Arc<AppState>, target: String, command: String, tx: mpsc::Sender<StreamEvent>) {
    let streamer = state.streamer.clone();
    let cancel = get_shutdown_token().child_token();
    tokio::spawn(async move {
        streamer
            .stream_with_cancel(&target, &command, tx, cancel)
            .await;
    });
}

/// 把事件通道转换为 SSE 响应，终止事件之后结束
pub(crate) fn event_stream(
    mut rx: mpsc::Receiver<StreamEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = async_stream::stream! {
        while let Some(event) = rx.recv().await {
            let terminal = event.is_terminal();
            yield Ok(to_sse_event(&event));
            if terminal {
                break;
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keepalive"),
    )
}

fn to_sse_event(event: &StreamEvent) -> Event {
    let sse = Event::default().data(event.wire_payload());
    match event.wire_event() {
        Some(name) => sse.event(name),
        None => sse,
    }
}
