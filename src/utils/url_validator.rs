//! 目标 URL 校验
//!
//! 短链接只允许跳转到 http(s) 地址，脚本类协议一律拒绝。

use url::Url;

use crate::errors::MorphlinkError;

#[derive(Debug, PartialEq, Eq)]
pub enum UrlValidationError {
    Empty,
    DangerousScheme(String),
    UnsupportedScheme(String),
    Malformed(String),
    MissingHost,
}

impl std::fmt::Display for UrlValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "target URL cannot be empty"),
            Self::DangerousScheme(scheme) => write!(f, "scheme '{}' is not allowed", scheme),
            Self::UnsupportedScheme(scheme) => write!(
                f,
                "unsupported scheme '{}', only http and https are accepted",
                scheme
            ),
            Self::Malformed(msg) => write!(f, "malformed URL: {}", msg),
            Self::MissingHost => write!(f, "target URL has no host"),
        }
    }
}

impl std::error::Error for UrlValidationError {}

impl From<UrlValidationError> for MorphlinkError {
    fn from(err: UrlValidationError) -> Self {
        MorphlinkError::invalid_request(err.to_string())
    }
}

/// 危险协议列表
const DANGEROUS_SCHEMES: &[&str] = &["javascript", "data", "file", "vbscript", "about", "blob"];

/// Check that `raw` is an absolute http(s) URL with a host.
///
/// Returns the trimmed URL as it should be stored.
pub fn validate_url(raw: &str) -> Result<String, UrlValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(UrlValidationError::Empty);
    }

    // 先按前缀判断，避免 Url::parse 对 javascript: 之类的宽松解析
    let scheme = trimmed
        .split_once(':')
        .map(|(s, _)| s.to_ascii_lowercase())
        .unwrap_or_default();
    if DANGEROUS_SCHEMES.contains(&scheme.as_str()) {
        return Err(UrlValidationError::DangerousScheme(scheme));
    }
    if scheme != "http" && scheme != "https" {
        return Err(UrlValidationError::UnsupportedScheme(scheme));
    }

    let parsed = Url::parse(trimmed).map_err(|e| UrlValidationError::Malformed(e.to_string()))?;
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(UrlValidationError::MissingHost);
    }

    Ok(trimmed.to_string())
}
