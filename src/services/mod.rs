//! 服务层模块
//!
//! 包含核心业务逻辑

pub mod executor;
pub mod installer;
pub mod listing;
pub mod monitor;
pub mod remote_exec;
pub mod streamer;
pub mod transfer;

pub use executor::CommandExecutor;
pub use installer::{AppSource, InstallerResolver};
pub use monitor::{HostMonitor, MonitorHandle, MonitorSnapshot};
pub use remote_exec::{build_remote_exec, build_remote_exec_strict, NamedParameters, RemoteExec};
pub use streamer::StreamingExecutor;
pub use transfer::FileTransferRunner;
