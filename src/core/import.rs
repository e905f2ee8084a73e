//! 调用外部导入工具
//!
//! 子进程的 stdout / stderr 分别由独立任务转发到本进程对应的输出流，
//! 同时保留最后一段输出用于错误诊断。

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::Command;

use crate::core::error::ImportError;

/// 每个输出流保留的诊断尾部大小
const OUTPUT_TAIL_LIMIT: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub executable: PathBuf,
    pub input_file: PathBuf,
    /// 丢弃已有的导入进度，从 0 开始
    pub resume_from_zero: bool,
    /// 导入时让工具逐块校验
    pub verify: bool,
}

impl ImportRequest {
    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["--input-file".into(), self.input_file.clone().into_os_string()];
        if self.resume_from_zero {
            args.push("--resume".into());
            args.push("0".into());
        }
        args.push("--verify".into());
        args.push(if self.verify { "1" } else { "0" }.into());
        args
    }
}

#[derive(Debug, Clone, Default)]
pub struct ImportReport {
    pub exit_code: Option<i32>,
    pub stdout_tail: Vec<u8>,
    pub stderr_tail: Vec<u8>,
}

/// 导入工具必须存在且是文件
pub fn preflight(executable: &Path) -> Result<(), ImportError> {
    if executable.is_file() {
        Ok(())
    } else {
        Err(ImportError::ToolMissing(executable.to_path_buf()))
    }
}

/// 运行导入工具，输出转发到本进程的 stdout / stderr
pub async fn run_import(request: &ImportRequest) -> Result<ImportReport, ImportError> {
    run_import_with(request, tokio::io::stdout(), tokio::io::stderr()).await
}

/// 同 [`run_import`]，输出转发到指定的写入端
pub async fn run_import_with<O, E>(request: &ImportRequest, out: O, err: E) -> Result<ImportReport, ImportError>
where
    O: AsyncWrite + Unpin + Send + 'static,
    E: AsyncWrite + Unpin + Send + 'static,
{
    preflight(&request.executable)?;

    let args = request.args();
    log::info!(
        "启动导入工具: {} {}",
        request.executable.display(),
        args.iter().map(|a| a.to_string_lossy()).collect::<Vec<_>>().join(" ")
    );

    let mut child = Command::new(&request.executable)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ImportError::ToolMissing(request.executable.clone()),
            _ => ImportError::ProcessFailed {
                code: None,
                detail: format!("无法启动导入工具: {}", e),
            },
        })?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| ImportError::StreamError("无法获取 stdout".to_string()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| ImportError::StreamError("无法获取 stderr".to_string()))?;

    let stdout_task = tokio::spawn(drain(stdout, out));
    let stderr_task = tokio::spawn(drain(stderr, err));

    let (stdout_result, stderr_result, status) = tokio::join!(stdout_task, stderr_task, child.wait());

    let status = status.map_err(|e| ImportError::ProcessFailed {
        code: None,
        detail: format!("等待导入工具退出失败: {}", e),
    })?;

    let stdout_tail = flatten_drain(stdout_result, "stdout");
    let stderr_tail = flatten_drain(stderr_result, "stderr");

    if !status.success() {
        let detail = match &stderr_tail {
            Ok(tail) if !tail.is_empty() => last_lines(tail, 5),
            _ => status.to_string(),
        };
        log::error!("导入工具异常退出: {} ({})", status, detail);
        return Err(ImportError::ProcessFailed { code: status.code(), detail });
    }

    let report = ImportReport {
        exit_code: status.code(),
        stdout_tail: stdout_tail?,
        stderr_tail: stderr_tail?,
    };
    log::info!("导入工具已完成");
    Ok(report)
}

fn flatten_drain(
    result: Result<io::Result<Vec<u8>>, tokio::task::JoinError>,
    stream: &str,
) -> Result<Vec<u8>, ImportError> {
    match result {
        Ok(Ok(tail)) => Ok(tail),
        Ok(Err(e)) => Err(ImportError::StreamError(format!("{}: {}", stream, e))),
        Err(e) => Err(ImportError::StreamError(format!("{}: {}", stream, e))),
    }
}

/// 把 `reader` 全部转发给 `writer`，返回最后 [`OUTPUT_TAIL_LIMIT`] 字节
async fn drain<R, W>(mut reader: R, mut writer: W) -> io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buffer = [0u8; 8192];
    let mut tail = Vec::new();
    loop {
        let n = reader.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        writer.write_all(&buffer[..n]).await?;
        writer.flush().await?;

        tail.extend_from_slice(&buffer[..n]);
        if tail.len() > OUTPUT_TAIL_LIMIT {
            let excess = tail.len() - OUTPUT_TAIL_LIMIT;
            tail.drain(..excess);
        }
    }
    Ok(tail)
}

fn last_lines(output: &[u8], count: usize) -> String {
    let text = String::from_utf8_lossy(output);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(count);
    lines[start..].join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(executable: PathBuf, resume_from_zero: bool, verify: bool) -> ImportRequest {
        ImportRequest {
            executable,
            input_file: PathBuf::from("/data/stellite-blockchain.raw"),
            resume_from_zero,
            verify,
        }
    }

    #[test]
    fn test_args() {
        let req = request(PathBuf::from("import"), false, false);
        assert_eq!(req.args(), vec!["--input-file", "/data/stellite-blockchain.raw", "--verify", "0"]);

        let req = request(PathBuf::from("import"), true, true);
        assert_eq!(
            req.args(),
            vec!["--input-file", "/data/stellite-blockchain.raw", "--resume", "0", "--verify", "1"]
        );
    }

    #[test]
    fn test_preflight() {
        let dir = tempfile::tempdir().unwrap();
        let tool = dir.path().join("stellite-blockchain-import");
        assert!(matches!(preflight(&tool), Err(ImportError::ToolMissing(_))));
        // 目录不是可执行文件
        assert!(matches!(preflight(dir.path()), Err(ImportError::ToolMissing(_))));
        std::fs::write(&tool, b"").unwrap();
        assert!(preflight(&tool).is_ok());
    }

    #[test]
    fn test_last_lines() {
        assert_eq!(last_lines(b"a\nb\n\nc\nd\n", 2), "c | d");
        assert_eq!(last_lines(b"", 3), "");
    }

    #[tokio::test]
    async fn test_drain_keeps_tail() {
        let input: Vec<u8> = (0..(OUTPUT_TAIL_LIMIT * 2 + 17)).map(|i| (i % 256) as u8).collect();
        let tail = drain(&input[..], tokio::io::sink()).await.unwrap();
        assert_eq!(tail.len(), OUTPUT_TAIL_LIMIT);
        assert_eq!(&tail[..], &input[input.len() - OUTPUT_TAIL_LIMIT..]);
    }

    #[tokio::test]
    async fn test_missing_tool() {
        let dir = tempfile::tempdir().unwrap();
        let req = request(dir.path().join("absent"), false, false);
        let result = run_import_with(&req, tokio::io::sink(), tokio::io::sink()).await;
        assert!(matches!(result, Err(ImportError::ToolMissing(_))));
    }

    #[cfg(unix)]
    mod unix {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        pub(crate) fn write_script(dir: &Path, body: &str) -> PathBuf {
            let path = dir.join("stellite-blockchain-import");
            std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        #[tokio::test]
        async fn test_successful_import_passes_args() {
            let dir = tempfile::tempdir().unwrap();
            let args_file = dir.path().join("args.txt");
            let tool = write_script(
                dir.path(),
                &format!("echo \"$@\" > '{}'\necho importing\necho 'height 5' >&2", args_file.display()),
            );

            let req = request(tool, true, true);
            let report = run_import_with(&req, tokio::io::sink(), tokio::io::sink()).await.unwrap();

            assert_eq!(report.exit_code, Some(0));
            assert_eq!(report.stdout_tail, b"importing\n");
            assert_eq!(report.stderr_tail, b"height 5\n");
            let args = std::fs::read_to_string(&args_file).unwrap();
            assert_eq!(args.trim(), "--input-file /data/stellite-blockchain.raw --resume 0 --verify 1");
        }

        #[tokio::test]
        async fn test_non_zero_exit() {
            let dir = tempfile::tempdir().unwrap();
            let tool = write_script(dir.path(), "echo 'database locked' >&2\nexit 3");

            let req = request(tool, false, false);
            let result = run_import_with(&req, tokio::io::sink(), tokio::io::sink()).await;
            match result {
                Err(ImportError::ProcessFailed { code, detail }) => {
                    assert_eq!(code, Some(3));
                    assert!(detail.contains("database locked"));
                }
                other => panic!("预期 ProcessFailed, 实际 {:?}", other),
            }
        }

        #[tokio::test]
        async fn test_chatty_stdout_silent_stderr() {
            let dir = tempfile::tempdir().unwrap();
            let tool = write_script(dir.path(), "i=0\nwhile [ $i -lt 20000 ]; do echo \"block $i imported\"; i=$((i+1)); done");

            let req = request(tool, false, false);
            let report = tokio::time::timeout(
                std::time::Duration::from_secs(60),
                run_import_with(&req, tokio::io::sink(), tokio::io::sink()),
            )
            .await
            .expect("导入工具输出未能及时读完")
            .unwrap();

            assert!(report.stderr_tail.is_empty());
            assert!(report.stdout_tail.ends_with(b"block 19999 imported\n"));
            assert_eq!(report.stdout_tail.len(), OUTPUT_TAIL_LIMIT);
        }
    }
}
