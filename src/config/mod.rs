use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use crate::core::error::BootstrapError;

/// 默认清单地址
pub const DEFAULT_MANIFEST_URL: &str = "https://stellite.live/downloads/blockchain-download.manifest";

/// 下载方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Direct,
    #[default]
    Torrent,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Direct => "direct",
            Method::Torrent => "torrent",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "direct" => Ok(Method::Direct),
            "torrent" => Ok(Method::Torrent),
            _ => Err(format!(
                "下载方式 '{}' 无效，可用的方式为 'direct' 和 'torrent'",
                s
            )),
        }
    }
}

/// 配置结构体
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    /// 清单地址
    pub manifest_url: String,
    /// 默认下载方式
    pub method: Method,
    /// 下载完成后不做种
    pub disable_seed: bool,
    /// 直链下载建立连接的超时时间（秒）
    pub http_timeout_secs: u64,
    /// 获取清单的超时时间（秒）
    pub manifest_timeout_secs: u64,
    /// 等待种子元数据的超时时间（秒）
    pub metadata_timeout_secs: u64,
    /// User-Agent
    pub user_agent: String,
    /// 直链下载是否尝试断点续传
    pub enable_resume: bool,
    /// 种子顺序读取的块大小（字节）
    pub read_chunk_size: usize,
    /// 直链下载进度上报间隔（毫秒）
    pub progress_interval_ms: u64,
    /// 种子下载进度上报间隔（毫秒）
    pub torrent_report_interval_ms: u64,
    /// 日志文件，空字符串表示输出到标准错误
    pub log_file: String,
    /// 日志级别
    pub log_level: String,
    /// 日志文件轮转阈值（字节）
    pub log_max_size: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            manifest_url: DEFAULT_MANIFEST_URL.to_string(),
            method: Method::Torrent,
            disable_seed: false,
            http_timeout_secs: 30,
            manifest_timeout_secs: 30,
            metadata_timeout_secs: 600,
            user_agent: format!("chain-bootstrap/{}", env!("CARGO_PKG_VERSION")),
            enable_resume: false,
            read_chunk_size: 4096,
            progress_interval_ms: 500,
            torrent_report_interval_ms: 1000,
            log_file: "logs/chain-bootstrap.log".to_string(),
            log_level: "info".to_string(),
            log_max_size: 10 * 1024 * 1024,
        }
    }
}

impl Config {
    /// 加载配置文件，文件不存在时使用默认配置
    pub fn load(path: &str) -> Result<Self, BootstrapError> {
        if !Path::new(path).exists() {
            return Ok(Config::default());
        }
        let content = fs::read_to_string(path)
            .map_err(|e| BootstrapError::Config(format!("无法读取配置文件 {}: {}", path, e)))?;
        toml::from_str(&content)
            .map_err(|e| BootstrapError::Config(format!("配置文件格式错误 {}: {}", path, e)))
    }

    /// 保存带教程的配置文件
    pub fn save_with_tutorial(&self, path: &str) -> Result<(), BootstrapError> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| BootstrapError::Config(format!("无法创建配置目录: {}", e)))?;
            }
        }
        let config_content = toml::to_string_pretty(self)
            .map_err(|e| BootstrapError::Config(format!("无法序列化配置: {}", e)))?;
        let full_content = format!("{}\n{}", Config::generate_tutorial_content(), config_content);
        fs::write(path, full_content)
            .map_err(|e| BootstrapError::Config(format!("无法保存配置文件 {}: {}", path, e)))
    }

    fn generate_tutorial_content() -> String {
        r#"# chain-bootstrap 配置文件
# =========================
#
# TOML 格式。命令行参数会覆盖这里的设置，优先级：命令行 > 配置文件 > 默认值
#
# 使用示例：
#   chain-bootstrap                              # 种子下载并导入
#   chain-bootstrap -m direct --download-only    # 直链下载，只下载不导入
#   chain-bootstrap --force                      # 从头导入，覆盖已有链数据
#
# manifest_url               清单地址，清单中包含直链、磁力链接、sha512 和区块高度
# method                     "direct" 或 "torrent"
# disable_seed               种子下载完成后立即停止上传
# http_timeout_secs          直链下载建立连接的超时（秒）
# manifest_timeout_secs      获取清单的超时（秒）
# metadata_timeout_secs      等待种子元数据的超时（秒），网络差时可以调大
# enable_resume              直链下载时续传目标目录中已有的部分文件
# read_chunk_size            种子顺序读取的块大小（字节）
# progress_interval_ms       直链下载进度刷新间隔（毫秒）
# torrent_report_interval_ms 种子下载进度刷新间隔（毫秒）
# log_file                   日志文件路径，留空则输出到标准错误
# log_level                  error / warn / info / debug / trace
# log_max_size               日志文件超过该大小（字节）时在启动时轮转
"#
        .to_string()
    }

    /// 校验配置合法性
    pub fn validate(&self) -> Result<(), BootstrapError> {
        if self.manifest_url.trim().is_empty() {
            return Err(BootstrapError::Config("清单地址不能为空".to_string()));
        }
        if !crate::utils::validator::is_valid_http_url(&self.manifest_url) {
            return Err(BootstrapError::Config(format!(
                "清单地址必须是 HTTP/HTTPS 地址: {}",
                self.manifest_url
            )));
        }
        if self.http_timeout_secs == 0 || self.manifest_timeout_secs == 0 {
            return Err(BootstrapError::Config("超时时间必须大于0".to_string()));
        }
        if self.metadata_timeout_secs == 0 {
            return Err(BootstrapError::Config("元数据超时时间必须大于0".to_string()));
        }
        if self.read_chunk_size == 0 {
            return Err(BootstrapError::Config("读取块大小必须大于0".to_string()));
        }
        if self.progress_interval_ms == 0 || self.torrent_report_interval_ms == 0 {
            return Err(BootstrapError::Config("进度刷新间隔必须大于0".to_string()));
        }
        crate::utils::logger::parse_level(&self.log_level)
            .map_err(BootstrapError::Config)?;
        Ok(())
    }

    /// 合并命令行参数到配置
    pub fn merge_from_args(&mut self, args: &crate::cli::Args) {
        if let Some(url) = &args.manifest_url {
            self.manifest_url = url.clone();
        }
        if let Some(method) = args.method {
            self.method = method;
        }
        if args.disable_seed {
            self.disable_seed = true;
        }
        if args.verbose {
            self.log_level = "debug".to_string();
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn manifest_timeout(&self) -> Duration {
        Duration::from_secs(self.manifest_timeout_secs)
    }

    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_secs(self.metadata_timeout_secs)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    pub fn torrent_report_interval(&self) -> Duration {
        Duration::from_millis(self.torrent_report_interval_ms)
    }

    /// 获取配置摘要信息
    pub fn get_summary(&self) -> String {
        format!(
            "配置摘要:\n\
            - 清单地址: {}\n\
            - 下载方式: {}\n\
            - 做种: {}\n\
            - 断点续传: {}\n\
            - 元数据超时: {} 秒\n\
            - 日志: {} ({})",
            self.manifest_url,
            self.method,
            if self.disable_seed { "禁用" } else { "启用" },
            if self.enable_resume { "启用" } else { "禁用" },
            self.metadata_timeout_secs,
            if self.log_file.is_empty() { "标准错误" } else { self.log_file.as_str() },
            self.log_level,
        )
    }
}
