//! 基础设施模块
//!
//! 封装外部依赖（进程执行、传输命令构造、主机注册表、shell 转义）

pub mod command;
pub mod registry;
pub mod shell;
pub mod transport;

pub use command::{OutputLine, OutputStream, StreamOutcome};
pub use registry::{resolve_target, HostRegistry, StaticHostRegistry};
pub use transport::Transport;
