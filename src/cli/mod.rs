//! CLI: 命令行接口和参数解析模块
//!
//! ## 支持的命令
//!
//! - 下载并导入：`chain-bootstrap`
//! - 只下载：`chain-bootstrap --download-only -d /data`
//! - 直链下载：`chain-bootstrap -m direct`
//! - 生成配置：`chain-bootstrap --init-config`
//!
//! ## 平台支持
//!
//! - Windows: `%APPDATA%/chain-bootstrap/chain-bootstrap.conf`
//! - macOS: `~/Library/Application Support/chain-bootstrap/chain-bootstrap.conf`
//! - Linux: `~/.config/chain-bootstrap/chain-bootstrap.conf`

use clap::Parser;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{Config, Method};
use crate::core::error::BootstrapResult;
use crate::core::orchestrator::RunOptions;

/// 导入工具的默认文件名
#[cfg(windows)]
pub const IMPORT_TOOL_NAME: &str = "stellite-blockchain-import.exe";
#[cfg(not(windows))]
pub const IMPORT_TOOL_NAME: &str = "stellite-blockchain-import";

/// 获取平台默认配置文件路径
pub fn default_config_path() -> String {
    #[cfg(target_os = "windows")]
    {
        let appdata = env::var("APPDATA").unwrap_or_else(|_| ".".to_string());
        format!("{}/chain-bootstrap/chain-bootstrap.conf", appdata)
    }
    #[cfg(target_os = "macos")]
    {
        let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
        format!("{}/Library/Application Support/chain-bootstrap/chain-bootstrap.conf", home)
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
        format!("{}/.config/chain-bootstrap/chain-bootstrap.conf", home)
    }
}

/// 可执行文件所在目录，取不到时退回当前目录
pub fn executable_dir() -> PathBuf {
    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn default_destination_dir() -> String {
    executable_dir().display().to_string()
}

/// 导入工具默认与本程序放在同一目录
pub fn default_import_tool_path() -> PathBuf {
    executable_dir().join(IMPORT_TOOL_NAME)
}

/// chain-bootstrap 命令行参数
///
/// 示例用法：
///   chain-bootstrap
///   chain-bootstrap --download-only -d /data
///   chain-bootstrap -m direct --with-import-verification
#[derive(Parser, Debug, Clone)]
#[command(
    name = "chain-bootstrap",
    author = "panzhifu",
    version = env!("CARGO_PKG_VERSION"),
    about = "下载最新的区块链快照并导入本地节点",
    long_about = "获取快照清单，通过种子或直链下载区块链快照，校验 SHA-512 后调用导入工具导入本地节点，最后删除下载的文件。\n\n示例：\n  chain-bootstrap\n  chain-bootstrap --download-only -d /data\n  chain-bootstrap -m direct --force\n"
)]
pub struct Args {
    /// 只下载并校验，不导入
    #[arg(long, help = "只下载并校验快照，不调用导入工具，文件保留在目标目录。")]
    pub download_only: bool,

    /// 下载目录（默认：程序所在目录）
    #[arg(long, short = 'd', default_value_t = default_destination_dir(), help = "快照保存目录，必须已存在，默认为程序所在目录。")]
    pub destination_dir: String,

    /// 下载方式
    #[arg(long, short = 'm', help = "下载方式：torrent（默认）或 direct，覆盖配置文件中的设置。")]
    pub method: Option<Method>,

    /// 清单地址
    #[arg(long, help = "快照清单地址，覆盖配置文件中的设置。")]
    pub manifest_url: Option<String>,

    #[arg(long, help = "导入时让导入工具逐块校验。")]
    pub with_import_verification: bool,

    #[arg(long, help = "种子下载完成后立即停止，不做种。")]
    pub disable_seed: bool,

    /// 从头导入
    #[arg(long, help = "让导入工具丢弃已有进度，从第 0 块开始导入。")]
    pub force: bool,

    #[arg(long, help = "导入工具路径，默认为程序所在目录下的 stellite-blockchain-import。")]
    pub import_tool_path: Option<PathBuf>,

    /// 配置文件路径，默认为平台推荐路径
    #[arg(short = 'c', long, default_value_t = default_config_path(), help = "配置文件路径，默认为平台推荐路径。")]
    pub config: String,

    #[arg(long, help = "在配置文件路径写入带注释的默认配置并退出。")]
    pub init_config: bool,

    #[arg(long, help = "结束前等待按键，便于双击启动时查看结果。")]
    pub pause: bool,

    #[arg(long, short = 'v', help = "输出调试日志。")]
    pub verbose: bool,
}

impl Args {
    /// 加载配置文件并合并命令行参数
    pub fn load_config(&self) -> BootstrapResult<Config> {
        let mut config = Config::load(&self.config)?;
        config.merge_from_args(self);
        config.validate()?;
        Ok(config)
    }

    /// 写入默认配置文件（目录不存在时一并创建）
    pub fn init_config_file(&self) -> BootstrapResult<()> {
        Config::default().save_with_tutorial(&self.config)
    }

    pub fn run_options(&self, config: Config) -> RunOptions {
        RunOptions {
            config: Arc::new(config),
            destination_dir: PathBuf::from(&self.destination_dir),
            import_tool_path: self
                .import_tool_path
                .clone()
                .unwrap_or_else(default_import_tool_path),
            download_only: self.download_only,
            with_import_verification: self.with_import_verification,
            force: self.force,
            show_progress: true,
        }
    }
}

// 测试模块
#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::BootstrapError;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["chain-bootstrap"]).unwrap();
        assert!(!args.download_only);
        assert!(args.method.is_none());
        assert!(args.manifest_url.is_none());
        assert_eq!(args.destination_dir, default_destination_dir());

        let options = args.run_options(Config::default());
        assert!(options.import_tool_path.ends_with(IMPORT_TOOL_NAME));
        assert!(!options.force);
        assert!(options.show_progress);
    }

    #[test]
    fn test_all_flags() {
        let args = Args::try_parse_from([
            "chain-bootstrap",
            "--download-only",
            "-d",
            "/data",
            "--method",
            "DIRECT",
            "--with-import-verification",
            "--disable-seed",
            "--force",
            "--import-tool-path",
            "/opt/import",
        ])
        .unwrap();
        assert!(args.download_only);
        assert_eq!(args.method, Some(Method::Direct));
        assert!(args.disable_seed);

        let options = args.run_options(Config::default());
        assert_eq!(options.destination_dir, PathBuf::from("/data"));
        assert_eq!(options.import_tool_path, PathBuf::from("/opt/import"));
        assert!(options.with_import_verification);
        assert!(options.force);
    }

    #[test]
    fn test_unknown_method_rejected() {
        let result = Args::try_parse_from(["chain-bootstrap", "-m", "ftp"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_init_and_load_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("chain-bootstrap.conf");
        let path_str = path.to_str().unwrap();

        let args = Args::try_parse_from(["chain-bootstrap", "-c", path_str, "-m", "direct"]).unwrap();
        args.init_config_file().unwrap();
        assert!(path.exists());

        let config = args.load_config().unwrap();
        assert_eq!(config.method, Method::Direct);

        // 已有文件时重新生成也能成功
        args.init_config_file().unwrap();
    }

    #[test]
    fn test_invalid_manifest_url_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.conf");
        let args = Args::try_parse_from([
            "chain-bootstrap",
            "-c",
            path.to_str().unwrap(),
            "--manifest-url",
            "not a url",
        ])
        .unwrap();
        assert!(matches!(args.load_config(), Err(BootstrapError::Config(_))));
    }
}
