//! awc 需要 actix 的单线程 System，这里把 HTTP 请求放到独立的工作线程执行，
//! 结果通过 oneshot 送回 tokio 主运行时。

use std::future::Future;
use std::io;
use std::time::Duration;

use awc::http::header;
use tokio::sync::oneshot;

/// 构建 HTTP 客户端，`timeout` 为 None 时不限制超时（大文件下载）
pub fn build_client(user_agent: &str, timeout: Option<Duration>) -> awc::Client {
    let builder = awc::Client::builder().add_default_header((header::USER_AGENT, user_agent.to_string()));
    match timeout {
        Some(timeout) => builder.timeout(timeout).finish(),
        None => builder.disable_timeout().finish(),
    }
}

/// 在独立线程的 actix System 中运行 `task`，并等待其结果
///
/// `task` 在工作线程内构造 future，因此 future 本身可以是 `!Send`。
pub async fn run_on_http_worker<F, Fut, T>(name: &str, task: F) -> io::Result<T>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = T> + 'static,
    T: Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    std::thread::Builder::new()
        .name(format!("http-{}", name))
        .spawn(move || {
            let system = actix_rt::System::new();
            let result = system.block_on(task());
            let _ = tx.send(result);
        })?;

    rx.await
        .map_err(|_| io::Error::new(io::ErrorKind::Other, "HTTP 工作线程异常退出"))
}

/// 从响应头读取 Content-Length
pub fn content_length(headers: &awc::http::header::HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
}
