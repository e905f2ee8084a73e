//! SHA-512 完整性校验

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha512};

const HASH_BUFFER_SIZE: usize = 64 * 1024;

/// 计算文件的 SHA-512，返回小写十六进制
pub async fn digest_file(path: &Path) -> io::Result<String> {
    let path: PathBuf = path.to_path_buf();
    tokio::task::spawn_blocking(move || digest_file_blocking(&path))
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
}

fn digest_file_blocking(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha512::new();
    let mut buffer = vec![0u8; HASH_BUFFER_SIZE];
    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// 校验文件摘要，不匹配时返回 `Ok(false)`，读取失败才是错误
pub async fn verify(path: &Path, expected_hex: &str) -> io::Result<bool> {
    let actual = digest_file(path).await?;
    let matched = actual.eq_ignore_ascii_case(expected_hex.trim());
    if !matched {
        log::warn!("SHA-512 不匹配: 预期 {}, 实际 {}", expected_hex, actual);
    }
    Ok(matched)
}
