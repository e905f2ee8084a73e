use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// 运行阶段，用于标记错误发生在哪一步
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Preflight,
    SelectDestination,
    FetchManifest,
    Download,
    Verify,
    Import,
    Cleanup,
    Done,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Preflight => "preflight",
            Stage::SelectDestination => "select-destination",
            Stage::FetchManifest => "fetch-manifest",
            Stage::Download => "download",
            Stage::Verify => "verify",
            Stage::Import => "import",
            Stage::Cleanup => "cleanup",
            Stage::Done => "done",
        }
    }
}

/// 传输层错误（直链 / 种子）
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("网络错误: {0}")]
    Network(String),

    #[error("服务器返回状态码 {0}")]
    HttpStatus(u16),

    #[error("无效的下载源: {0}")]
    InvalidSource(String),

    #[error("等待种子元数据超时 ({0} 秒)")]
    SwarmMetadataTimeout(u64),

    #[error("种子错误: {0}")]
    Torrent(String),

    #[error("无法将 {from} 移动到 {to}: {reason}")]
    RenameFailed {
        from: PathBuf,
        to: PathBuf,
        reason: String,
    },

    #[error("文件大小不匹配: 预期 {expected} 字节, 实际 {actual} 字节")]
    SizeMismatch {
        expected: u64,
        actual: u64,
    },

    #[error("IO错误: {0}")]
    Io(#[from] io::Error),
}

impl DownloadError {
    pub fn network(msg: impl Into<String>) -> Self {
        DownloadError::Network(msg.into())
    }

    pub fn torrent(err: impl std::fmt::Display) -> Self {
        DownloadError::Torrent(err.to_string())
    }
}

/// 导入工具相关错误
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("找不到导入工具: {}", .0.display())]
    ToolMissing(PathBuf),

    #[error("导入进程失败 (退出码 {code:?}): {detail}")]
    ProcessFailed {
        code: Option<i32>,
        detail: String,
    },

    #[error("无法完整读取导入工具的输出: {0}")]
    StreamError(String),
}

/// 一次完整运行的终止错误
#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("无法获取下载清单，请检查网络连接: {0}")]
    ManifestUnavailable(String),

    #[error("下载清单无效: {0}")]
    ManifestInvalid(String),

    #[error("目标目录 '{}' 不可用: {reason}", .path.display())]
    DestinationInvalid {
        path: PathBuf,
        reason: String,
    },

    #[error("下载失败: {0}")]
    DownloadFailed(#[from] DownloadError),

    #[error("无法校验下载的文件: {0}")]
    VerificationFailed(String),

    #[error("导入失败: {0}")]
    ImportFailed(#[from] ImportError),

    #[error("配置错误: {0}")]
    Config(String),
}

impl BootstrapError {
    pub fn destination(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        BootstrapError::DestinationInvalid {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// 错误所处的阶段
    pub fn stage(&self) -> Stage {
        match self {
            BootstrapError::ImportFailed(ImportError::ToolMissing(_)) => Stage::Preflight,
            BootstrapError::Config(_) => Stage::Preflight,
            BootstrapError::DestinationInvalid { .. } => Stage::SelectDestination,
            BootstrapError::ManifestUnavailable(_) | BootstrapError::ManifestInvalid(_) => {
                Stage::FetchManifest
            }
            BootstrapError::DownloadFailed(_) => Stage::Download,
            BootstrapError::VerificationFailed(_) => Stage::Verify,
            BootstrapError::ImportFailed(_) => Stage::Import,
        }
    }

    pub fn is_import_tool_missing(&self) -> bool {
        matches!(self, BootstrapError::ImportFailed(ImportError::ToolMissing(_)))
    }
}

pub type BootstrapResult<T> = Result<T, BootstrapError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_stage() {
        let err = BootstrapError::ManifestInvalid("缺少 sha512".to_string());
        assert_eq!(err.stage(), Stage::FetchManifest);

        let err = BootstrapError::destination("/nope", "不存在");
        assert_eq!(err.stage(), Stage::SelectDestination);

        let err: BootstrapError = DownloadError::SwarmMetadataTimeout(600).into();
        assert_eq!(err.stage(), Stage::Download);

        let err: BootstrapError = ImportError::ToolMissing(PathBuf::from("/x/import")).into();
        assert_eq!(err.stage(), Stage::Preflight);
        assert!(err.is_import_tool_missing());

        let err: BootstrapError = ImportError::ProcessFailed { code: Some(2), detail: String::new() }.into();
        assert_eq!(err.stage(), Stage::Import);
        assert!(!err.is_import_tool_missing());
    }

    #[test]
    fn test_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let err: DownloadError = io_err.into();
        assert!(matches!(err, DownloadError::Io(_)));

        let err = DownloadError::network("connection reset");
        assert_eq!(err.to_string(), "网络错误: connection reset");
    }

    #[test]
    fn test_error_display() {
        let err = DownloadError::SizeMismatch { expected: 10, actual: 4 };
        assert!(err.to_string().contains("预期 10 字节"));

        let err = BootstrapError::destination("/tmp/missing", "目录不存在");
        assert!(err.to_string().contains("/tmp/missing"));
    }
}
