//! 主流程：预检 → 目标目录 → 清单 → 下载 → 校验 → 导入 → 清理
//!
//! 每一步失败都直接结束本次运行，不做自动重试；只有清理失败是非致命的。

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Config;
use crate::core::error::{BootstrapError, BootstrapResult, Stage};
use crate::core::import::{self, ImportRequest};
use crate::core::manifest::{fetch_manifest, Manifest};
use crate::core::progress::progress_channel;
use crate::core::transport::{select_transport, Transport};
use crate::core::verify::verify;
use crate::ui::ProgressManager;
use crate::utils::validator::is_sha512_hex;

/// 下载文件的固定文件名
pub const DESTINATION_FILE_NAME: &str = "stellite-blockchain.raw";

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub config: Arc<Config>,
    pub destination_dir: PathBuf,
    pub import_tool_path: PathBuf,
    pub download_only: bool,
    pub with_import_verification: bool,
    /// 让导入工具丢弃已有进度从头导入
    pub force: bool,
    pub show_progress: bool,
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub destination_file: PathBuf,
    pub manifest: Manifest,
    pub imported: bool,
    pub cleanup_warning: Option<String>,
}

pub struct Orchestrator {
    options: RunOptions,
    transport_override: Option<Box<dyn Transport>>,
    stage: Stage,
}

impl Orchestrator {
    pub fn new(options: RunOptions) -> Self {
        Self {
            options,
            transport_override: None,
            stage: Stage::Preflight,
        }
    }

    /// 使用指定的传输策略，而不是根据清单选择
    pub fn with_transport(mut self, transport: Box<dyn Transport>) -> Self {
        self.transport_override = Some(transport);
        self
    }

    /// 当前（或失败时所在的）阶段
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// `err` 实际发生的阶段
    ///
    /// 找不到导入工具既可能在预检时发现，也可能在启动进程时才发现，
    /// 以运行时记录的阶段为准。
    pub fn failed_stage(&self, err: &BootstrapError) -> Stage {
        if err.is_import_tool_missing() {
            self.stage
        } else {
            err.stage()
        }
    }

    fn enter(&mut self, stage: Stage) {
        log::debug!("阶段: {} -> {}", self.stage.as_str(), stage.as_str());
        self.stage = stage;
    }

    pub async fn run(&mut self) -> BootstrapResult<RunOutcome> {
        let options = self.options.clone();
        let config = options.config.clone();

        // 导入工具放在最前面检查，避免下载完才发现无法导入
        self.enter(Stage::Preflight);
        if !options.download_only {
            import::preflight(&options.import_tool_path)?;
        }

        self.enter(Stage::SelectDestination);
        let destination_dir = select_destination(&options.destination_dir)?;
        let destination_file = destination_dir.join(DESTINATION_FILE_NAME);

        self.enter(Stage::FetchManifest);
        let manifest = fetch_manifest(&config.manifest_url, &config.user_agent, config.manifest_timeout()).await?;
        if !is_sha512_hex(&manifest.expected_digest) {
            log::warn!("清单中的 sha512 不是 128 位十六进制: {}", manifest.expected_digest);
        }

        self.enter(Stage::Download);
        let transport = match self.transport_override.take() {
            Some(transport) => transport,
            None => select_transport(config.method, &manifest, config.clone())?,
        };
        log::info!("下载方式: {}", transport.name());
        self.download(transport.as_ref(), &destination_file, &manifest).await?;

        self.enter(Stage::Verify);
        match verify(&destination_file, &manifest.expected_digest).await {
            Ok(true) => log::info!("SHA-512 校验通过"),
            Ok(false) => {
                return Err(BootstrapError::VerificationFailed(format!(
                    "{} 的 SHA-512 与清单不匹配",
                    destination_file.display()
                )))
            }
            Err(e) => {
                return Err(BootstrapError::VerificationFailed(format!(
                    "无法读取 {}: {}",
                    destination_file.display(),
                    e
                )))
            }
        }

        if options.download_only {
            self.enter(Stage::Done);
            return Ok(RunOutcome {
                destination_file,
                manifest,
                imported: false,
                cleanup_warning: None,
            });
        }

        self.enter(Stage::Import);
        let request = ImportRequest {
            executable: options.import_tool_path.clone(),
            input_file: destination_file.clone(),
            resume_from_zero: options.force,
            verify: options.with_import_verification,
        };
        import::run_import(&request).await?;

        self.enter(Stage::Cleanup);
        let cleanup_warning = match fs::remove_file(&destination_file) {
            Ok(()) => None,
            Err(e) => {
                let warning = format!("无法删除下载的文件 '{}': {}", destination_file.display(), e);
                log::warn!("{}", warning);
                Some(warning)
            }
        };

        self.enter(Stage::Done);
        Ok(RunOutcome {
            destination_file,
            manifest,
            imported: true,
            cleanup_warning,
        })
    }

    async fn download(
        &self,
        transport: &dyn Transport,
        destination: &Path,
        manifest: &Manifest,
    ) -> BootstrapResult<()> {
        let progress = if self.options.show_progress {
            ProgressManager::new(manifest.total_bytes)
        } else {
            ProgressManager::hidden(manifest.total_bytes)
        };

        let (sink, rx) = progress_channel();
        let consumer = progress.spawn_consumer(rx);
        let result = transport.download(destination, sink).await;
        // 通道已随 sink 关闭，消费任务会自行结束
        let last = consumer.await.ok().flatten();

        match result {
            Ok(()) => {
                let total = last.map(|p| p.bytes_total).filter(|t| *t > 0).unwrap_or(manifest.total_bytes);
                progress.complete(total);
                log::info!("下载已保存到 {}", destination.display());
                Ok(())
            }
            Err(e) => {
                progress.abandon();
                log::error!("下载失败: {}", e);
                Err(e.into())
            }
        }
    }
}

/// 解析并检查目标目录
pub fn select_destination(dir: &Path) -> BootstrapResult<PathBuf> {
    let resolved = fs::canonicalize(dir)
        .map_err(|e| BootstrapError::destination(dir, format!("无法读取目标目录: {}", e)))?;
    let metadata = fs::metadata(&resolved)
        .map_err(|e| BootstrapError::destination(&resolved, format!("无法读取目标目录: {}", e)))?;
    if !metadata.is_dir() {
        return Err(BootstrapError::destination(&resolved, "目标必须是目录"));
    }
    Ok(resolved)
}
