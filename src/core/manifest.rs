//! 下载清单：描述当前快照的下载位置与校验信息

use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::core::error::{BootstrapError, BootstrapResult};
use crate::utils::http::{build_client, run_on_http_worker};

/// 清单正文上限，清单只是一个很小的 JSON
const MANIFEST_BODY_LIMIT: usize = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(rename = "direct", default)]
    pub direct_url: String,
    #[serde(rename = "magnet", default)]
    pub magnet_link: String,
    #[serde(rename = "sha512", default)]
    pub expected_digest: String,
    #[serde(rename = "bytes", default)]
    pub total_bytes: u64,
    #[serde(rename = "block", default)]
    pub block_height: u64,
}

impl Manifest {
    /// 解析并校验清单 JSON
    pub fn from_json(body: &[u8]) -> BootstrapResult<Self> {
        let manifest: Manifest = serde_json::from_slice(body)
            .map_err(|e| BootstrapError::ManifestInvalid(format!("JSON 解析失败: {}", e)))?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn validate(&self) -> BootstrapResult<()> {
        let mut missing = Vec::new();
        if self.magnet_link.is_empty() {
            missing.push("magnet");
        }
        if self.direct_url.is_empty() {
            missing.push("direct");
        }
        if self.expected_digest.is_empty() {
            missing.push("sha512");
        }
        if !missing.is_empty() {
            return Err(BootstrapError::ManifestInvalid(format!(
                "缺少字段: {}",
                missing.join(", ")
            )));
        }
        Ok(())
    }

    /// 用于日志的一行摘要
    pub fn summary(&self) -> String {
        let digest: String = self.expected_digest.chars().take(16).collect();
        format!(
            "区块高度 {}, 大小 {} 字节, sha512 {}…",
            self.block_height, self.total_bytes, digest
        )
    }
}

/// 从指定地址获取清单，不做重试
pub async fn fetch_manifest(url: &str, user_agent: &str, timeout: Duration) -> BootstrapResult<Manifest> {
    log::info!("获取下载清单: {}", url);

    let url_owned = url.to_string();
    let ua = user_agent.to_string();
    let body = run_on_http_worker("manifest", move || fetch_body(url_owned, ua, timeout))
        .await
        .map_err(|e| BootstrapError::ManifestUnavailable(e.to_string()))??;

    let manifest = Manifest::from_json(&body)?;
    log::info!("下载清单: {}", manifest.summary());
    Ok(manifest)
}

async fn fetch_body(url: String, user_agent: String, timeout: Duration) -> BootstrapResult<Bytes> {
    let client = build_client(&user_agent, Some(timeout));
    let mut response = client
        .get(url.as_str())
        .send()
        .await
        .map_err(|e| BootstrapError::ManifestUnavailable(format!("{}: {}", url, e)))?;

    if !response.status().is_success() {
        return Err(BootstrapError::ManifestUnavailable(format!(
            "{}: 服务器返回 {}",
            url,
            response.status()
        )));
    }

    response
        .body()
        .limit(MANIFEST_BODY_LIMIT)
        .await
        .map_err(|e| BootstrapError::ManifestUnavailable(format!("读取清单失败: {}", e)))
}
