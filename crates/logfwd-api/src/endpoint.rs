//! Output URL helpers.

use url::Url;

use crate::{ApiError, Result};

/// Schemes that activate TLS configuration
pub const TLS_SCHEMES: [&str; 4] = ["https", "tls", "ssl", "udps"];

pub fn parse(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| ApiError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    if url.host_str().map(str::is_empty).unwrap_or(true) {
        return Err(ApiError::InvalidUrl {
            url: raw.to_string(),
            reason: "missing host".to_string(),
        });
    }
    Ok(url)
}

pub fn is_tls_scheme(scheme: &str) -> bool {
    TLS_SCHEMES.contains(&scheme.to_ascii_lowercase().as_str())
}

pub fn is_secure(url: &Url) -> bool {
    is_tls_scheme(url.scheme())
}

/// `host:port`, falling back to `default_port` when the URL has none
pub fn host_port(url: &Url, default_port: u16) -> String {
    let host = url.host_str().unwrap_or_default();
    let port = url.port().unwrap_or(default_port);
    format!("{}:{}", host, port)
}

/// The URL path without its leading slash, if any
pub fn path_segment(url: &Url) -> Option<&str> {
    let path = url.path().trim_start_matches('/');
    (!path.is_empty()).then_some(path)
}
