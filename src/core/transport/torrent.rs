//! 通过磁力链接加入种子网络下载快照（librqbit）
//!
//! 只支持单文件种子：会话把文件组装到 `<目标目录>/.chain-bootstrap-torrent/<info hash>`，
//! 完成后整体移动到目标路径。其它 info hash 的暂存内容属于旧快照，开始前清掉。

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use async_trait::async_trait;
use librqbit::{AddTorrent, AddTorrentOptions, Session, SessionOptions};
use tokio::io::{AsyncRead, AsyncReadExt};
use url::Url;

use super::Transport;
use crate::config::Config;
use crate::core::error::DownloadError;
use crate::core::progress::{Progress, ProgressSink};
use crate::utils::validator::is_magnet_link;

/// 暂存目录名，位于目标目录下
pub const STAGING_DIR_NAME: &str = ".chain-bootstrap-torrent";

pub struct TorrentTransport {
    magnet: String,
    info_hash: String,
    allow_seed: bool,
    config: Arc<Config>,
}

impl TorrentTransport {
    pub fn new(magnet: &str, allow_seed: bool, config: Arc<Config>) -> Result<Self, DownloadError> {
        let info_hash = match magnet_info_hash(magnet) {
            Some(hash) if is_magnet_link(magnet) => hash,
            _ => return Err(DownloadError::InvalidSource(magnet.to_string())),
        };
        Ok(Self {
            magnet: magnet.to_string(),
            info_hash,
            allow_seed,
            config,
        })
    }

    pub fn allow_seed(&self) -> bool {
        self.allow_seed
    }

    pub fn info_hash(&self) -> &str {
        &self.info_hash
    }

    /// 加入种子网络、顺序读取直到结束，并等待所有传输完成
    async fn fetch(&self, session: &Arc<Session>, progress: &mut ProgressSink) -> Result<(), DownloadError> {
        let options = AddTorrentOptions {
            overwrite: true,
            ..Default::default()
        };

        log::info!("等待种子元数据 (最长 {} 秒)", self.config.metadata_timeout_secs);
        let added = tokio::time::timeout(
            self.config.metadata_timeout(),
            session.add_torrent(AddTorrent::from_url(self.magnet.as_str()), Some(options)),
        )
        .await
        .map_err(|_| DownloadError::SwarmMetadataTimeout(self.config.metadata_timeout_secs))?
        .map_err(DownloadError::torrent)?;

        let handle = added
            .into_handle()
            .ok_or_else(|| DownloadError::Torrent("会话没有返回种子句柄".to_string()))?;

        let total = handle.stats().total_bytes;
        log::info!("种子元数据已获取，总大小 {} 字节", total);

        // 不设 only_files 时会话下载全部内容，读取流负责按顺序提高分片优先级
        let mut stream = handle.clone().stream(0).map_err(DownloadError::torrent)?;
        let bytes_read = read_with_progress(
            &mut stream,
            self.config.read_chunk_size,
            total,
            self.config.torrent_report_interval(),
            progress,
        )
        .await?;
        drop(stream);

        handle.wait_until_completed().await.map_err(DownloadError::torrent)?;
        if !self.allow_seed {
            log::info!("已禁用做种，暂停种子");
            if let Err(e) = session.pause(&handle).await {
                log::warn!("暂停种子失败: {}", e);
            }
        }

        progress.finish(Progress::new(bytes_read, total)).await;
        log::info!("种子下载完成: 读取 {} 字节", bytes_read);
        Ok(())
    }
}

#[async_trait]
impl Transport for TorrentTransport {
    async fn download(&self, destination: &Path, mut progress: ProgressSink) -> Result<(), DownloadError> {
        log::info!(
            "种子下载: {} -> {} (做种: {})",
            self.magnet,
            destination.display(),
            if self.allow_seed { "是" } else { "否" }
        );

        let staging = prepare_staging(destination, &self.info_hash)?;

        let session = open_session(&staging)
            .await
            .map_err(|e| DownloadError::Torrent(format!("{:#}", e)))?;

        let result = self.fetch(&session, &mut progress).await;
        session.stop().await;
        result?;

        let assembled = locate_single_file(&staging)?;
        move_file(&assembled, destination)?;
        if let Err(e) = fs::remove_dir_all(&staging) {
            log::warn!("无法删除暂存目录 {}: {}", staging.display(), e);
        }
        // 只在已经为空时成功
        if let Some(root) = staging.parent() {
            let _ = fs::remove_dir(root);
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "torrent"
    }
}

async fn open_session(staging: &Path) -> anyhow::Result<Arc<Session>> {
    let options = SessionOptions {
        disable_dht_persistence: true,
        ..Default::default()
    };
    Session::new_with_opts(staging.to_path_buf(), options)
        .await
        .with_context(|| format!("无法在 {} 创建种子会话", staging.display()))
}

/// 顺序读完 `reader`，每个 `interval` 最多上报一次进度，返回读到的字节数
///
/// 上报的是本读取器累计读到的字节，总大小取种子元数据中的值。
async fn read_with_progress<R>(
    reader: &mut R,
    chunk_size: usize,
    total: u64,
    interval: Duration,
    progress: &mut ProgressSink,
) -> std::io::Result<u64>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = vec![0u8; chunk_size];
    let mut bytes_read = 0u64;
    let mut last_report = Instant::now();

    loop {
        let n = reader.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        bytes_read += n as u64;
        if last_report.elapsed() >= interval {
            last_report = Instant::now();
            progress.report(Progress::new(bytes_read, total));
        }
    }
    Ok(bytes_read)
}

/// 从磁力链接中取出小写的 info hash
pub fn magnet_info_hash(magnet: &str) -> Option<String> {
    let parsed = Url::parse(magnet).ok()?;
    parsed
        .query_pairs()
        .filter(|(key, _)| key == "xt")
        .find_map(|(_, value)| value.strip_prefix("urn:btih:").map(str::to_ascii_lowercase))
        .filter(|hash| !hash.is_empty())
}

/// 所有暂存内容的根目录，位于目标文件所在目录下
pub fn staging_root(destination: &Path) -> PathBuf {
    destination
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(STAGING_DIR_NAME)
}

/// 某个种子的暂存目录
pub fn staging_dir(destination: &Path, info_hash: &str) -> PathBuf {
    staging_root(destination).join(info_hash)
}

/// 删除其它种子（旧快照）的暂存内容并创建本次的暂存目录
///
/// 同一个 info hash 的目录保留，会话可以沿用其中已校验的分片。
pub fn prepare_staging(destination: &Path, info_hash: &str) -> std::io::Result<PathBuf> {
    let root = staging_root(destination);
    if root.is_dir() {
        for entry in fs::read_dir(&root)? {
            let entry = entry?;
            if entry.file_name() == info_hash {
                continue;
            }
            let path = entry.path();
            log::info!("删除旧的暂存内容: {}", path.display());
            if entry.file_type()?.is_dir() {
                fs::remove_dir_all(&path)?;
            } else {
                fs::remove_file(&path)?;
            }
        }
    }

    let staging = root.join(info_hash);
    fs::create_dir_all(&staging)?;
    Ok(staging)
}

/// 在暂存目录中找到唯一的组装文件
pub fn locate_single_file(staging: &Path) -> Result<PathBuf, DownloadError> {
    let mut files = Vec::new();
    collect_files(staging, &mut files).map_err(|e| DownloadError::RenameFailed {
        from: staging.to_path_buf(),
        to: PathBuf::new(),
        reason: format!("无法读取暂存目录: {}", e),
    })?;

    match files.len() {
        1 => Ok(files.remove(0)),
        0 => Err(DownloadError::RenameFailed {
            from: staging.to_path_buf(),
            to: PathBuf::new(),
            reason: "暂存目录中没有下载的文件".to_string(),
        }),
        n => Err(DownloadError::RenameFailed {
            from: staging.to_path_buf(),
            to: PathBuf::new(),
            reason: format!("种子包含 {} 个文件，只支持单文件种子", n),
        }),
    }
}

fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, files)?;
        } else if path.is_file() {
            files.push(path);
        }
    }
    Ok(())
}

/// 移动文件，跨设备时退回到复制后删除
pub fn move_file(from: &Path, to: &Path) -> Result<(), DownloadError> {
    let rename_err = match fs::rename(from, to) {
        Ok(()) => return Ok(()),
        Err(e) => e,
    };
    log::debug!("rename 失败 ({}), 尝试复制", rename_err);

    fs::copy(from, to)
        .and_then(|_| fs::remove_file(from))
        .map_err(|copy_err| DownloadError::RenameFailed {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            reason: format!("{}; {}", rename_err, copy_err),
        })
}
