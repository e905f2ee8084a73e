mod progress;

use std::fmt;
use std::path::PathBuf;

use crossterm::event::{self, Event, KeyEventKind};
use crossterm::style::Stylize;
use crossterm::terminal;

pub use progress::ProgressManager;

pub const BANNER: &str = r#"
  __ _____ ___ _   _   _ _____ ___
/' _/_   _| __| | | | | |_   _| __|
'._'. | | | _|| |_| |_| | | | | _|
|___/ |_| |___|___|___|_| |_| |___|
                  BLOCKCHAIN DOWNLOADER
"#;

pub fn print_banner() {
    println!("{}", BANNER);
}

pub fn print_success(message: &str) {
    println!("{} {}", "✓".green(), message);
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red(), message.red());
}

pub fn print_warning(message: &str) {
    eprintln!("{} {}", "⚠".yellow(), message.yellow());
}

pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue(), message);
}

/// 等待任意按键，用于双击启动时保留窗口
pub fn pause_for_key() {
    println!("按任意键继续...");
    if terminal::enable_raw_mode().is_err() {
        return;
    }
    loop {
        match event::read() {
            Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => break,
            Ok(_) => continue,
            Err(_) => break,
        }
    }
    let _ = terminal::disable_raw_mode();
}

/// 运行结束后的摘要
pub struct RunSummary {
    pub destination_file: PathBuf,
    pub block_height: u64,
    pub total_size: u64,
    pub elapsed_time: std::time::Duration,
    pub imported: bool,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // 导入完成时再显示一次横幅
        if self.imported {
            writeln!(f, "{}", BANNER)?;
        }
        writeln!(f, "\n运行摘要:")?;
        writeln!(f, "区块高度: {}", self.block_height)?;
        writeln!(f, "快照大小: {}", format_size(self.total_size))?;
        writeln!(f, "耗时: {:.2}秒", self.elapsed_time.as_secs_f64())?;
        if self.imported {
            writeln!(f, "已导入快照，可以启动 'stellited' 或钱包了。")?;
        } else {
            writeln!(f, "下载的文件位于: {}", self.destination_file.display())?;
        }
        Ok(())
    }
}

pub fn format_size(size: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut size = size as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_index])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0.00 B");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.00 GB");
    }

    #[test]
    fn test_summary_download_only() {
        let summary = RunSummary {
            destination_file: PathBuf::from("/data/stellite-blockchain.raw"),
            block_height: 109766,
            total_size: 2048,
            elapsed_time: std::time::Duration::from_millis(1500),
            imported: false,
        };
        let text = summary.to_string();
        assert!(text.contains("区块高度: 109766"));
        assert!(text.contains("2.00 KB"));
        assert!(text.contains("/data/stellite-blockchain.raw"));
        assert!(!text.contains(BANNER));
    }

    #[test]
    fn test_summary_after_import_shows_banner() {
        let summary = RunSummary {
            destination_file: PathBuf::from("/data/stellite-blockchain.raw"),
            block_height: 109766,
            total_size: 2048,
            elapsed_time: std::time::Duration::from_secs(3),
            imported: true,
        };
        let text = summary.to_string();
        assert!(text.starts_with(BANNER));
        assert!(text.contains("stellited"));
        assert!(!text.contains("下载的文件位于"));
    }
}
