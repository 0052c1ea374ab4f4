//! Helpers shared by both engines.
//!
//! Input normalization rejects malformed input up front so neither the cascade
//! nor the tracer ever starts on it. Response bodies from third-party hosts are
//! only ever read through [`read_body_prefix`].

use crate::error::VerifyError;
use reqwest::Url;

/// Reduce raw user input to a bare lowercase hostname.
///
/// Accepts plain hosts (`Shop.Example.com`), hosts with a trailing dot, and full
/// URLs (`https://shop.example.com/path`), in which case only the host is kept.
pub fn normalize_hostname(raw: &str) -> Result<String, VerifyError> {
    let trimmed = raw.trim();

    if trimmed.is_empty() {
        return Err(VerifyError::invalid_input(raw, "Domain name cannot be empty"));
    }

    let host = if trimmed.contains("://") {
        let url = Url::parse(trimmed)
            .map_err(|e| VerifyError::invalid_input(raw, format!("Unparseable URL: {}", e)))?;
        url.host_str()
            .ok_or_else(|| VerifyError::invalid_input(raw, "URL has no host"))?
            .to_string()
    } else {
        // Drop any path, query or port that came along with a bare host
        let authority = trimmed.split(['/', '?', '#']).next().unwrap_or_default();
        match authority.rsplit_once(':') {
            Some((h, port)) if !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()) => {
                h.to_string()
            }
            _ => authority.to_string(),
        }
    };

    let host = host.trim_end_matches('.').to_lowercase();

    if !is_valid_hostname(&host) {
        return Err(VerifyError::invalid_input(raw, "Not a valid domain name"));
    }

    Ok(host)
}

/// Normalize a URL to trace, defaulting the scheme to `https`.
pub fn normalize_url(raw: &str) -> Result<Url, VerifyError> {
    let trimmed = raw.trim();

    if trimmed.is_empty() {
        return Err(VerifyError::invalid_input(raw, "URL cannot be empty"));
    }

    let lower = trimmed.to_ascii_lowercase();
    let candidate = if lower.starts_with("http://") || lower.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let url = Url::parse(&candidate)
        .map_err(|e| VerifyError::invalid_input(raw, format!("Unparseable URL: {}", e)))?;

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(VerifyError::invalid_input(raw, "URL has no host")),
    }
}

/// Validate that a hostname has basic valid structure.
///
/// Requires at least two labels; a single label has no TLD to look up.
pub(crate) fn is_valid_hostname(domain: &str) -> bool {
    if domain.len() < 3 || domain.len() > 253 {
        return false;
    }

    if !domain.contains('.') {
        return false;
    }

    for part in domain.split('.') {
        if part.is_empty() || part.len() > 63 {
            return false;
        }

        // Cannot start or end with hyphen
        if part.starts_with('-') || part.ends_with('-') {
            return false;
        }

        // Only alphanumeric and hyphens (IDN labels allowed as unicode)
        if !part.chars().all(|c| c.is_alphanumeric() || c == '-') {
            return false;
        }
    }

    true
}

/// At most `limit` bytes of the body, decoded lossily.
pub(crate) async fn read_body_prefix(
    mut response: reqwest::Response,
    limit: usize,
) -> Result<String, VerifyError> {
    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        let room = limit.saturating_sub(body.len());
        body.extend_from_slice(&chunk[..chunk.len().min(room)]);
        if body.len() >= limit {
            break;
        }
    }
    Ok(String::from_utf8_lossy(&body).into_owned())
}
