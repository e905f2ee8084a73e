use url::Url;

/// 是否为 HTTP/HTTPS 地址
pub fn is_valid_http_url(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https") && parsed.host_str().is_some(),
        Err(_) => false,
    }
}

/// 是否为带 info hash 的磁力链接
pub fn is_magnet_link(link: &str) -> bool {
    match Url::parse(link) {
        Ok(parsed) => {
            parsed.scheme() == "magnet"
                && parsed
                    .query_pairs()
                    .any(|(key, value)| key == "xt" && value.starts_with("urn:btih:"))
        }
        Err(_) => false,
    }
}

/// 是否为 SHA-512 十六进制摘要（128 个十六进制字符）
pub fn is_sha512_hex(digest: &str) -> bool {
    digest.len() == 128 && digest.chars().all(|c| c.is_ascii_hexdigit())
}
