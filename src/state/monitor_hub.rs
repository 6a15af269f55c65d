//! 监控管理
//!
//! 按 id 持有所有运行中的 `MonitorHandle`，关闭时统一停止

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::info;

use crate::services::monitor::{MonitorHandle, MonitorSnapshot};

/// 监控状态（用于 API 响应）
#[derive(Debug, Clone, Serialize)]
pub struct MonitorStatus {
    pub id: String,
    pub target: String,
    pub started_at: DateTime<Utc>,
    pub is_running: bool,
    pub snapshot: MonitorSnapshot,
}

/// 监控中心
#[derive(Default)]
pub struct MonitorHub {
    /// 监控映射 (monitor_id -> handle)
    monitors: RwLock<HashMap<String, MonitorHandle>>,
}

impl MonitorHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记监控，返回分配的 id
    pub async fn insert(&self, handle: MonitorHandle) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        info!(monitor_id = %id, target_host = %handle.target(), "Registered host monitor");
        self.monitors.write().await.insert(id.clone(), handle);
        id
    }

    /// 查询监控状态
    pub async fn status(&self, id: &str) -> Option<MonitorStatus> {
        let monitors = self.monitors.read().await;
        monitors.get(id).map(|handle| status_of(id, handle))
    }

    /// 所有监控
    pub async fn list(&self) -> Vec<MonitorStatus> {
        let monitors = self.monitors.read().await;
        let mut list: Vec<_> = monitors
            .iter()
            .map(|(id, handle)| status_of(id, handle))
            .collect();
        list.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        list
    }

    pub async fn len(&self) -> usize {
        self.monitors.read().await.len()
    }

    /// 停止并移除监控，不存在时返回 false
    pub async fn stop(&self, id: &str) -> bool {
        let handle = self.monitors.write().await.remove(id);
        match handle {
            Some(handle) => {
                handle.stop().await;
                true
            }
            None => false,
        }
    }

    /// 停止所有监控
    pub async fn stop_all(&self) {
        let handles: Vec<_> = self.monitors.write().await.drain().map(|(_, h)| h).collect();
        if handles.is_empty() {
            return;
        }
        info!(count = handles.len(), "Stopping all host monitors");
        futures::future::join_all(handles.into_iter().map(MonitorHandle::stop)).await;
    }
}

fn status_of(id: &str, handle: &MonitorHandle) -> MonitorStatus {
    MonitorStatus {
        id: id.to_string(),
        target: handle.target().to_string(),
        started_at: handle.started_at(),
        is_running: handle.is_running(),
        snapshot: handle.latest(),
    }
}
