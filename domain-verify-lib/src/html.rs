//! Client-side redirect detection in HTML bodies.
//!
//! Two forms are recognized: a `<meta http-equiv="refresh">` tag whose delay is
//! short enough to count as a redirect, and a location assignment inside a
//! `<script>` block. Meta refresh takes precedence when both are present.

use crate::types::HopNote;
use regex::Regex;
use std::time::Duration;

lazy_static::lazy_static! {
    static ref META_REFRESH_TAG: Regex =
        Regex::new(r#"(?is)<meta\b[^>]*http-equiv\s*=\s*["']?refresh["']?[^>]*>"#).unwrap();
    static ref CONTENT_ATTR: Regex =
        Regex::new(r#"(?is)\bcontent\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#).unwrap();
    static ref REFRESH_CONTENT: Regex =
        Regex::new(r#"(?is)^\s*(\d+(?:\.\d+)?)\s*(?:[;,]\s*(?:url\s*=\s*)?['"]?([^'"]*)['"]?)?\s*$"#).unwrap();
    static ref SCRIPT_BLOCK: Regex =
        Regex::new(r"(?is)<script\b[^>]*>(.*?)</script\s*>").unwrap();
    static ref LOCATION_ASSIGN: Regex = Regex::new(
        r#"(?:\b(?:window|document|self|top)\s*\.\s*)?\blocation(?:\s*\.\s*href)?\s*=\s*["'`]([^"'`]+)["'`]"#
    ).unwrap();
    static ref LOCATION_CALL: Regex = Regex::new(
        r#"\blocation\s*\.\s*(?:replace|assign)\s*\(\s*["'`]([^"'`]+)["'`]\s*\)"#
    ).unwrap();
}

/// A redirect target found in a page body, not yet resolved against the page URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRedirect {
    pub note: HopNote,
    pub target: String,
}

/// Scan a body for a meta-refresh, then for a script redirect.
pub fn find_client_redirect(body: &str, max_refresh_delay: Duration) -> Option<ClientRedirect> {
    if let Some(target) = meta_refresh_target(body, max_refresh_delay) {
        return Some(ClientRedirect {
            note: HopNote::MetaRefresh,
            target,
        });
    }

    script_redirect_target(body).map(|target| ClientRedirect {
        note: HopNote::ScriptRedirect,
        target,
    })
}

/// Target of the first meta-refresh tag with a delay of at most `max_delay`.
pub fn meta_refresh_target(body: &str, max_delay: Duration) -> Option<String> {
    for tag in META_REFRESH_TAG.find_iter(body) {
        let Some(caps) = CONTENT_ATTR.captures(tag.as_str()) else {
            continue;
        };
        let content = caps
            .get(1)
            .or_else(|| caps.get(2))
            .or_else(|| caps.get(3))
            .map(|m| m.as_str())
            .unwrap_or_default();

        let Some(parts) = REFRESH_CONTENT.captures(content) else {
            continue;
        };
        let delay = parts
            .get(1)
            .and_then(|d| d.as_str().parse::<f64>().ok())
            .unwrap_or(f64::MAX);
        if delay > max_delay.as_secs_f64() {
            continue;
        }

        if let Some(target) = parts.get(2).map(|t| t.as_str().trim()) {
            if is_navigable(target) {
                return Some(target.to_string());
            }
        }
    }
    None
}

/// Target of the first location assignment inside a `<script>` block.
pub fn script_redirect_target(body: &str) -> Option<String> {
    SCRIPT_BLOCK
        .captures_iter(body)
        .filter_map(|block| block.get(1))
        .find_map(|script| {
            let script = script.as_str();
            let assign = LOCATION_ASSIGN.captures(script).and_then(|c| c.get(1));
            let call = LOCATION_CALL.captures(script).and_then(|c| c.get(1));

            // Whichever appears first in the script is the one that runs
            let first = match (assign, call) {
                (Some(a), Some(c)) => Some(if a.start() <= c.start() { a } else { c }),
                (a, c) => a.or(c),
            }?;

            let target = first.as_str().trim();
            is_navigable(target).then(|| target.to_string())
        })
}

fn is_navigable(target: &str) -> bool {
    !target.is_empty()
        && !target.starts_with('#')
        && !target.to_ascii_lowercase().starts_with("javascript:")
}
