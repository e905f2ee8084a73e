//! 进度通道：传输策略是唯一的生产者，界面是唯一的消费者。
//!
//! `ProgressSink` 按值交给传输策略，`download` 返回时随之被丢弃，
//! 通道因此在任务结束时恰好关闭一次。

use tokio::sync::mpsc;

/// 通道容量，进度只是采样值，满了就丢弃
pub const PROGRESS_CHANNEL_CAPACITY: usize = 64;

/// 一次进度采样
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    pub bytes_completed: u64,
    pub bytes_total: u64,
}

impl Progress {
    pub fn new(bytes_completed: u64, bytes_total: u64) -> Self {
        Self { bytes_completed, bytes_total }
    }

    /// 完成百分比，总大小未知时为 0
    pub fn percentage(&self) -> f64 {
        if self.bytes_total == 0 {
            0.0
        } else {
            (self.bytes_completed as f64 / self.bytes_total as f64 * 100.0).min(100.0)
        }
    }
}

/// 进度发送端
#[derive(Debug)]
pub struct ProgressSink {
    tx: mpsc::Sender<Progress>,
    last: Option<Progress>,
}

impl ProgressSink {
    /// 发送一次采样，队列已满或消费者已退出时静默丢弃
    pub fn report(&mut self, progress: Progress) {
        self.last = Some(progress);
        let _ = self.tx.try_send(progress);
    }

    /// 最后一次采样，会等待队列空位
    pub async fn finish(&mut self, progress: Progress) {
        self.last = Some(progress);
        let _ = self.tx.send(progress).await;
    }

    pub fn last(&self) -> Option<Progress> {
        self.last
    }
}

/// 创建一对进度通道
pub fn progress_channel() -> (ProgressSink, mpsc::Receiver<Progress>) {
    let (tx, rx) = mpsc::channel(PROGRESS_CHANNEL_CAPACITY);
    (ProgressSink { tx, last: None }, rx)
}
