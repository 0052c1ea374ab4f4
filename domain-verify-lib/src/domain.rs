//! Hostname → registrable domain reduction.
//!
//! This is a deliberately small approximation of the public suffix list: only
//! the second-level suffixes in [`SECOND_LEVEL_SUFFIXES`] keep three labels,
//! everything else keeps two. Hosts under suffixes missing from the table
//! (e.g. `example.net.au`) are reduced one label too far.

use crate::error::VerifyError;
use crate::types::RegisteredDomain;
use crate::utils::normalize_hostname;

/// Two-label public suffixes under which registries sell third-level names.
pub const SECOND_LEVEL_SUFFIXES: &[&str] = &[
    "com.tw", "org.tw", "gov.tw", "edu.tw", "net.tw", //
    "co.uk", "org.uk", "gov.uk", //
    "co.jp", "ne.jp", "ac.jp", "go.jp", //
    "com.hk", "org.hk", //
    "com.cn", "org.cn", "gov.cn",
];

/// Reduce a user-supplied hostname to its registrable domain and TLD.
///
/// ```rust
/// use domain_verify_lib::registered_domain;
///
/// let d = registered_domain("shop.antiscam.example.com.tw").unwrap();
/// assert_eq!(d.registrable_domain, "example.com.tw");
/// assert_eq!(d.tld, "tw");
/// ```
pub fn registered_domain(raw: &str) -> Result<RegisteredDomain, VerifyError> {
    let host = normalize_hostname(raw)?;
    // `www.` is a host prefix only while a full domain remains under it
    let hostname = match host.strip_prefix("www.") {
        Some(rest) if rest.contains('.') => rest.to_string(),
        _ => host.clone(),
    };

    let labels: Vec<&str> = hostname.split('.').collect();
    if labels.len() < 2 {
        return Err(VerifyError::invalid_input(
            raw,
            "Domain must contain at least one dot",
        ));
    }

    let registrable_domain = if labels.len() <= 2 {
        hostname.clone()
    } else {
        let last_two = labels[labels.len() - 2..].join(".");
        let keep = if SECOND_LEVEL_SUFFIXES.contains(&last_two.as_str()) {
            3
        } else {
            2
        };
        labels[labels.len() - keep..].join(".")
    };

    // Safe: registrable_domain always has at least two labels here
    let tld = registrable_domain
        .rsplit('.')
        .next()
        .unwrap_or_default()
        .to_string();

    Ok(RegisteredDomain {
        hostname,
        registrable_domain,
        tld,
    })
}
