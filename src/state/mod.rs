//! 应用状态模块

pub mod app_state;
pub mod monitor_hub;

pub use app_state::{get_shutdown_token, trigger_shutdown, AppState};
pub use monitor_hub::{MonitorHub, MonitorStatus};
