//! 传输策略：把远端快照搬到本地文件，并通过进度通道汇报进度

pub mod direct;
pub mod torrent;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{Config, Method};
use crate::core::error::DownloadError;
use crate::core::manifest::Manifest;
use crate::core::progress::ProgressSink;

pub use direct::DirectTransport;
pub use torrent::TorrentTransport;

#[async_trait]
pub trait Transport: Send + Sync {
    /// 把快照下载到 `destination`
    ///
    /// `progress` 按值传入，本方法返回时随之丢弃，进度通道即关闭。
    async fn download(&self, destination: &Path, progress: ProgressSink) -> Result<(), DownloadError>;

    fn name(&self) -> &'static str;
}

/// 根据清单和下载方式选择传输策略
pub fn select_transport(
    method: Method,
    manifest: &Manifest,
    config: Arc<Config>,
) -> Result<Box<dyn Transport>, DownloadError> {
    match method {
        Method::Direct => Ok(Box::new(DirectTransport::new(&manifest.direct_url, config)?)),
        Method::Torrent => {
            let allow_seed = !config.disable_seed;
            Ok(Box::new(TorrentTransport::new(&manifest.magnet_link, allow_seed, config)?))
        }
    }
}
