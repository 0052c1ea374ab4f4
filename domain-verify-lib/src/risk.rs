//! Cloaking comparison and risk rules for finished traces.

use crate::types::{RedirectHop, TraceOutcome};
use reqwest::Url;

/// Shortener hosts that scam campaigns favour. Matched against hop hosts,
/// exactly or as a parent domain.
pub const RISKY_SHORTENERS: &[&str] = &["i.gal", "bit.do", "is.gd", "tiny.cc", "t.cn"];

pub const LOOP_REASON: &str =
    "Redirect loop detected: the link keeps pointing back to a URL it already visited";
pub const TIMEOUT_REASON: &str =
    "Trace timed out: the redirect chain took too long or a server stalled its response";
pub const CLOAKING_REASON: &str =
    "Cloaking detected: the link redirects differently for mobile and desktop visitors";

/// Outcome of applying the risk rules to one trace.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RiskAssessment {
    pub is_high_risk: bool,
    pub reason: Option<String>,
}

impl RiskAssessment {
    fn high<S: Into<String>>(reason: S) -> Self {
        Self {
            is_high_risk: true,
            reason: Some(reason.into()),
        }
    }
}

fn is_redirect_status(status: u16) -> bool {
    (300..400).contains(&status)
}

/// Compare the desktop probe against the first hop of the mobile trace.
///
/// Only the status class of that single hop is compared: one side redirecting
/// while the other does not is cloaking. Where either side ends up is ignored.
pub fn detect_cloaking(first_hop: Option<&RedirectHop>, probe_status: u16) -> bool {
    match first_hop {
        Some(hop) => is_redirect_status(hop.status) != is_redirect_status(probe_status),
        None => false,
    }
}

/// Shortener from [`RISKY_SHORTENERS`] serving this URL, if any.
pub fn risky_shortener(url: &str) -> Option<&'static str> {
    let host = Url::parse(url).ok()?.host_str()?.to_ascii_lowercase();
    let host = host.trim_end_matches('.');
    RISKY_SHORTENERS.iter().copied().find(|shortener| {
        host == *shortener
            || host
                .strip_suffix(shortener)
                .is_some_and(|prefix| prefix.ends_with('.'))
    })
}

/// Apply the risk rules in order; the first rule that fires supplies the reason.
///
/// 1. loop or timeout outcome
/// 2. cloaking
/// 3. hop count at the cap ("path too deep")
/// 4. three or more hops
/// 5. a risky shortener anywhere in a chain of at least one hop
pub fn classify(
    outcome: TraceOutcome,
    redirect_count: usize,
    chain: &[RedirectHop],
    cloaking_detected: bool,
    max_hops: usize,
) -> RiskAssessment {
    match outcome {
        TraceOutcome::Loop => return RiskAssessment::high(LOOP_REASON),
        TraceOutcome::Timeout => return RiskAssessment::high(TIMEOUT_REASON),
        _ => {}
    }

    if cloaking_detected {
        return RiskAssessment::high(CLOAKING_REASON);
    }

    if redirect_count >= max_hops {
        return RiskAssessment::high(format!(
            "Redirect path too deep: stopped after {} hops, too many redirects for a legitimate site",
            redirect_count
        ));
    }

    if redirect_count >= 3 {
        return RiskAssessment::high(format!(
            "Multiple redirects ({}), a common evasion pattern used to dodge link scanners",
            redirect_count
        ));
    }

    if redirect_count >= 1 {
        if let Some(shortener) = chain.iter().find_map(|hop| risky_shortener(&hop.url)) {
            return RiskAssessment::high(format!(
                "Risky shortener used: {} is frequently abused by scam links",
                shortener
            ));
        }
    }

    RiskAssessment::default()
}
