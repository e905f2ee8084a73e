//! Core: 清单、下载传输、校验、导入以及把它们串起来的主流程

pub mod error;
pub mod import;
pub mod manifest;
pub mod orchestrator;
pub mod progress;
pub mod transport;
pub mod verify;

// 只导出主流程和其它模块实际用到的类型
pub use error::{BootstrapError, BootstrapResult, DownloadError, ImportError, Stage};
pub use manifest::Manifest;
pub use orchestrator::{Orchestrator, RunOptions, RunOutcome, DESTINATION_FILE_NAME};
pub use progress::{progress_channel, Progress, ProgressSink};
