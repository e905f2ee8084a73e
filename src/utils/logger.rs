use chrono::Local; // 用于获取本地时间
use log::LevelFilter; // 用于设置日志级别
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

/// 解析日志级别字符串
pub fn parse_level(level: &str) -> Result<LevelFilter, String> {
    level
        .trim()
        .parse::<LevelFilter>()
        .map_err(|_| format!("无效的日志级别: {}", level))
}

/// 格式化一行日志
pub fn format_line(level: log::Level, message: &str) -> String {
    format!(
        "{} [{}] - {}",
        Local::now().format("%Y-%m-%d %H:%M:%S"),
        level,
        message
    )
}

/// 日志文件超过 `max_size` 时重命名为 `.backup`，返回是否发生了轮转
pub fn rotate_if_needed(file_path: &str, max_size: u64) -> io::Result<bool> {
    let current_size = match std::fs::metadata(file_path) {
        Ok(meta) => meta.len(),
        Err(_) => return Ok(false),
    };
    if current_size <= max_size {
        return Ok(false);
    }

    let backup_path = format!("{}.backup", file_path);
    if Path::new(&backup_path).exists() {
        std::fs::remove_file(&backup_path)?;
    }
    std::fs::rename(file_path, &backup_path)?;
    Ok(true)
}

/// 初始化全局日志
///
/// `file_path` 为空时输出到标准错误，否则追加写入文件（启动时按 `max_size` 轮转）。
pub fn init_logger(file_path: &str, level: LevelFilter, max_size: u64) -> io::Result<()> {
    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(level)
        // 第三方库的调试信息太多，只保留警告
        .filter_module("actix_http", LevelFilter::Warn)
        .filter_module("awc", LevelFilter::Warn)
        .filter_module("rustls", LevelFilter::Warn)
        .format(|buf, record| {
            writeln!(buf, "{}", format_line(record.level(), &record.args().to_string()))
        });

    if !file_path.is_empty() {
        // 确保日志目录存在
        if let Some(parent) = Path::new(file_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        rotate_if_needed(file_path, max_size)?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(file_path)?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    builder
        .try_init()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("日志初始化失败: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("info").unwrap(), LevelFilter::Info);
        assert_eq!(parse_level("DEBUG").unwrap(), LevelFilter::Debug);
        assert_eq!(parse_level(" warn ").unwrap(), LevelFilter::Warn);
        assert!(parse_level("loud").is_err());
    }

    #[test]
    fn test_format_line() {
        let line = format_line(log::Level::Warn, "清单下载失败");
        assert!(line.ends_with("[WARN] - 清单下载失败"));
        // 时间戳格式 YYYY-MM-DD HH:MM:SS
        assert_eq!(line.find(" [WARN]"), Some(19));
    }

    #[test]
    fn test_rotate_if_needed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        let path_str = path.to_str().unwrap();

        assert!(!rotate_if_needed(path_str, 10).unwrap());

        std::fs::write(&path, b"small").unwrap();
        assert!(!rotate_if_needed(path_str, 10).unwrap());
        assert!(path.exists());

        std::fs::write(&path, b"definitely more than ten bytes").unwrap();
        assert!(rotate_if_needed(path_str, 10).unwrap());
        assert!(!path.exists());
        let backup = dir.path().join("app.log.backup");
        assert_eq!(std::fs::read(&backup).unwrap(), b"definitely more than ten bytes");
    }
}
