//! 领域模型模块
//!
//! 纯数据结构，不依赖 axum

pub mod exec;
pub mod file;
pub mod stream;
pub mod target;
pub mod transfer;

// Re-exports for convenience
pub use exec::{CapturedOutput, ExecOptions, ExecOutput, ExecResponse, ExitInfo};
pub use file::{FileEntry, FileType};
pub use stream::{Frame, FrameDecoder, StreamEvent};
pub use target::{Target, LOCAL_ALIASES};
pub use transfer::{TransferDirection, TransferOutput, TransferRequest};
