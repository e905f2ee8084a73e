//! HTTP/HTTPS 直链下载

use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use awc::http::{header, StatusCode};
use futures::StreamExt;
use tokio::time::MissedTickBehavior;

use super::Transport;
use crate::config::Config;
use crate::core::error::DownloadError;
use crate::core::progress::{Progress, ProgressSink};
use crate::utils::http::{build_client, content_length, run_on_http_worker};
use crate::utils::validator::is_valid_http_url;

const WRITE_BUFFER_SIZE: usize = 1024 * 1024;

pub struct DirectTransport {
    source_url: String,
    config: Arc<Config>,
}

impl DirectTransport {
    pub fn new(source_url: &str, config: Arc<Config>) -> Result<Self, DownloadError> {
        if !is_valid_http_url(source_url) {
            return Err(DownloadError::InvalidSource(source_url.to_string()));
        }
        Ok(Self {
            source_url: source_url.to_string(),
            config,
        })
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }
}

#[async_trait]
impl Transport for DirectTransport {
    async fn download(&self, destination: &Path, progress: ProgressSink) -> Result<(), DownloadError> {
        log::info!("直链下载: {} -> {}", self.source_url, destination.display());

        let url = self.source_url.clone();
        let destination = destination.to_path_buf();
        let config = self.config.clone();
        run_on_http_worker("direct", move || perform_download(url, destination, progress, config)).await?
    }

    fn name(&self) -> &'static str {
        "direct"
    }
}

/// 请求的起始偏移：开启续传且存在部分文件时从文件末尾继续
fn resume_offset(destination: &Path, enable_resume: bool) -> u64 {
    if !enable_resume {
        return 0;
    }
    fs::metadata(destination).map(|m| m.len()).unwrap_or(0)
}

async fn perform_download(
    url: String,
    destination: PathBuf,
    mut progress: ProgressSink,
    config: Arc<Config>,
) -> Result<(), DownloadError> {
    let existing = resume_offset(&destination, config.enable_resume);
    let client = build_client(&config.user_agent, None);
    let mut request = client.get(url.as_str());
    if existing > 0 {
        log::info!("发现已下载的部分: {} 字节，尝试续传", existing);
        request = request.insert_header((header::RANGE, format!("bytes={}-", existing)));
    }

    let mut response = tokio::time::timeout(config.http_timeout(), request.send())
        .await
        .map_err(|_| DownloadError::network(format!("连接 {} 超时", url)))?
        .map_err(|e| DownloadError::network(format!("{}: {}", url, e)))?;

    let status = response.status();
    log::info!("服务器响应: {}", status);

    if status == StatusCode::RANGE_NOT_SATISFIABLE && existing > 0 {
        log::info!("文件已完整下载: {}", destination.display());
        progress.finish(Progress::new(existing, existing)).await;
        return Ok(());
    }
    if !status.is_success() {
        return Err(DownloadError::HttpStatus(status.as_u16()));
    }

    let append = status == StatusCode::PARTIAL_CONTENT && existing > 0;
    let offset = if append { existing } else { 0 };
    let declared = content_length(response.headers()).map(|len| len + offset);
    let total = declared.unwrap_or(0);

    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .append(append)
        .truncate(!append)
        .open(&destination)?;
    let mut writer = BufWriter::with_capacity(WRITE_BUFFER_SIZE, file);

    let mut written = offset;
    let mut ticker = tokio::time::interval(config.progress_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            chunk = response.next() => match chunk {
                Some(Ok(bytes)) => {
                    writer.write_all(&bytes)?;
                    written += bytes.len() as u64;
                }
                Some(Err(e)) => {
                    log::error!("网络流错误: {}", e);
                    return Err(DownloadError::network(format!("网络流错误: {}", e)));
                }
                None => break,
            },
            _ = ticker.tick() => {
                progress.report(Progress::new(written, total.max(written)));
            }
        }
    }
    writer.flush()?;

    if let Some(expected) = declared {
        if written < expected {
            log::error!("文件大小不匹配: 预期 {} 实际 {}", expected, written);
            return Err(DownloadError::SizeMismatch { expected, actual: written });
        }
    }

    progress.finish(Progress::new(written, total.max(written))).await;
    log::info!("直链下载完成: {} 字节", written);
    Ok(())
}
