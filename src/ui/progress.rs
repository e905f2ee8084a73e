use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tokio::sync::mpsc::Receiver;
use tokio::task::JoinHandle;

use crate::core::progress::Progress;

const BAR_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, ETA {eta})";

// 结构体：ProgressManager
// 用于显示快照下载进度
pub struct ProgressManager {
    bar: ProgressBar,
}

impl ProgressManager {
    /// 创建进度条，`total` 取清单中的字节数
    pub fn new(total: u64) -> Self {
        let bar = ProgressBar::new(total);
        let style = ProgressStyle::with_template(BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        bar.set_style(style);
        Self { bar }
    }

    /// 不输出到终端的进度条
    pub fn hidden(total: u64) -> Self {
        let manager = Self::new(total);
        manager.bar.set_draw_target(ProgressDrawTarget::hidden());
        manager
    }

    /// 启动消费任务：读取进度直到通道关闭，返回最后一次采样
    pub fn spawn_consumer(&self, mut rx: Receiver<Progress>) -> JoinHandle<Option<Progress>> {
        let bar = self.bar.clone();
        tokio::spawn(async move {
            let mut last = None;
            while let Some(progress) = rx.recv().await {
                apply(&bar, progress);
                last = Some(progress);
            }
            last
        })
    }

    /// 下载成功后直接拉满，采样不一定覆盖到最后一个字节
    pub fn complete(&self, total: u64) {
        if total > 0 {
            self.bar.set_length(total);
        }
        self.bar.set_position(self.bar.length().unwrap_or(total));
        self.bar.finish();
    }

    pub fn abandon(&self) {
        self.bar.abandon();
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    pub fn length(&self) -> Option<u64> {
        self.bar.length()
    }
}

fn apply(bar: &ProgressBar, progress: Progress) {
    // 流式传输的总大小可能是暂定值
    if progress.bytes_total > 0 && bar.length() != Some(progress.bytes_total) {
        bar.set_length(progress.bytes_total);
    }
    bar.set_position(progress.bytes_completed);
}
