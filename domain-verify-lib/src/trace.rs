//! Hop-by-hop redirect tracing.
//!
//! Redirects are never followed by the HTTP client. Each hop is one request
//! made with a mobile identity; the next URL comes from a 3xx `Location`
//! header or, on a 200, from a meta-refresh tag or script in the body. One
//! deadline covers every hop plus the desktop cloaking probe.

use crate::error::VerifyError;
use crate::html::find_client_redirect;
use crate::risk::{classify, detect_cloaking};
use crate::types::{HopNote, RedirectHop, TraceConfig, TraceOutcome, TraceResult};
use crate::utils::{normalize_url, read_body_prefix};
use reqwest::{header, StatusCode, Url};
use std::collections::HashSet;
use tokio::time::Instant;
use tracing::{debug, info};

/// iPhone Safari: many scam links only redirect mobile visitors.
pub const MOBILE_USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 16_6 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.6 Mobile/15E148 Safari/604.1";

/// Windows Chrome, used for the cloaking probe.
pub const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

const BROWSER_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Result of fetching one URL.
struct Step {
    status: u16,
    next: Option<(Url, Option<HopNote>)>,
}

/// The mobile walk before risk classification.
struct Walk {
    chain: Vec<RedirectHop>,
    final_url: Url,
    redirect_count: usize,
    outcome: TraceOutcome,
    error: Option<String>,
}

/// Follows a URL to its destination and classifies the path.
pub struct RedirectTracer {
    client: reqwest::Client,
    config: TraceConfig,
}

impl RedirectTracer {
    /// Create a tracer with its own redirect-free HTTP client.
    pub fn new(config: TraceConfig) -> Result<Self, VerifyError> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(config.timeout)
            .build()
            .map_err(|e| VerifyError::internal(format!("Failed to create trace HTTP client: {}", e)))?;
        Ok(Self::with_client(client, config))
    }

    /// Create a tracer over an existing client. The client must not follow redirects.
    pub fn with_client(client: reqwest::Client, config: TraceConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &TraceConfig {
        &self.config
    }

    /// Trace one URL.
    ///
    /// Only malformed input is an error. Loops, timeouts and transport failures
    /// end the walk early and are reported through `outcome` with the partial chain.
    pub async fn trace(&self, raw_url: &str) -> Result<TraceResult, VerifyError> {
        let start = normalize_url(raw_url)?;
        let deadline = Instant::now() + self.config.timeout;

        let mut walk = self.walk(start.clone(), deadline).await;

        let mut cloaking_detected = false;
        if self.config.detect_cloaking
            && matches!(walk.outcome, TraceOutcome::Completed | TraceOutcome::TooDeep)
        {
            match tokio::time::timeout_at(deadline, self.probe(&start)).await {
                Ok(Ok(status)) => {
                    cloaking_detected = detect_cloaking(walk.chain.first(), status);
                    debug!(url = %start, probe_status = status, cloaking_detected, "desktop probe");
                }
                Ok(Err(e)) => {
                    debug!(url = %start, error = %e, "desktop probe failed, no cloaking signal");
                }
                Err(_) => {
                    walk.outcome = TraceOutcome::Timeout;
                    walk.error = Some(format!(
                        "deadline of {:?} exceeded during desktop probe",
                        self.config.timeout
                    ));
                }
            }
        }

        let risk = classify(
            walk.outcome,
            walk.redirect_count,
            &walk.chain,
            cloaking_detected,
            self.config.max_hops,
        );

        info!(
            url = %start,
            final_url = %walk.final_url,
            hops = walk.redirect_count,
            outcome = %walk.outcome,
            high_risk = risk.is_high_risk,
            "trace finished"
        );

        Ok(TraceResult {
            final_url: walk.final_url.to_string(),
            redirect_count: walk.redirect_count,
            chain: walk.chain,
            is_high_risk: risk.is_high_risk,
            risk_reason: risk.reason,
            cloaking_detected,
            outcome: walk.outcome,
            error: walk.error,
        })
    }

    async fn walk(&self, start: Url, deadline: Instant) -> Walk {
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(start.to_string());

        let mut current = start;
        let mut chain = Vec::new();
        let mut redirect_count = 0;
        let mut error = None;

        let outcome = loop {
            if redirect_count >= self.config.max_hops {
                break TraceOutcome::TooDeep;
            }

            let step = match tokio::time::timeout_at(deadline, self.step(&current)).await {
                Ok(Ok(step)) => step,
                Ok(Err(e)) => {
                    debug!(url = %current, error = %e, "hop failed");
                    error = Some(e.to_string());
                    break TraceOutcome::Error;
                }
                Err(_) => {
                    debug!(url = %current, "trace deadline exceeded");
                    error = Some(format!("deadline of {:?} exceeded", self.config.timeout));
                    break TraceOutcome::Timeout;
                }
            };

            let note = step.next.as_ref().and_then(|(_, note)| *note);
            debug!(url = %current, status = step.status, ?note, "hop");
            chain.push(RedirectHop {
                url: current.to_string(),
                status: step.status,
                note,
            });

            let Some((next, _)) = step.next else {
                break TraceOutcome::Completed;
            };

            if !visited.insert(next.to_string()) {
                debug!(url = %next, "redirect loop");
                break TraceOutcome::Loop;
            }

            current = next;
            redirect_count += 1;
        };

        Walk {
            chain,
            final_url: current,
            redirect_count,
            outcome,
            error,
        }
    }

    /// One mobile request, classified.
    async fn step(&self, url: &Url) -> Result<Step, VerifyError> {
        let response = self
            .client
            .get(url.clone())
            .header(header::USER_AGENT, self.config.mobile_user_agent.as_str())
            .header(header::ACCEPT, BROWSER_ACCEPT)
            .send()
            .await?;

        let status = response.status();

        if status.is_redirection() {
            let next = response
                .headers()
                .get(header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|location| resolve_next(url, location))
                .map(|next| (next, None));
            return Ok(Step {
                status: status.as_u16(),
                next,
            });
        }

        if status == StatusCode::OK && is_html_like(response.headers()) {
            let body = read_body_prefix(response, self.config.max_body_bytes).await?;
            let next = find_client_redirect(&body, self.config.meta_refresh_max_delay)
                .and_then(|found| resolve_next(url, &found.target).map(|u| (u, Some(found.note))));
            return Ok(Step {
                status: status.as_u16(),
                next,
            });
        }

        Ok(Step {
            status: status.as_u16(),
            next: None,
        })
    }

    /// Status of a single desktop request to the original URL.
    async fn probe(&self, url: &Url) -> Result<u16, VerifyError> {
        let response = self
            .client
            .get(url.clone())
            .header(header::USER_AGENT, self.config.desktop_user_agent.as_str())
            .header(header::ACCEPT, BROWSER_ACCEPT)
            .send()
            .await?;
        Ok(response.status().as_u16())
    }
}

/// Resolve a redirect target against the page it came from.
///
/// Only http(s) targets are followed; fragments are dropped.
pub fn resolve_next(current: &Url, target: &str) -> Option<Url> {
    let mut next = current.join(target.trim()).ok()?;
    if !matches!(next.scheme(), "http" | "https") {
        return None;
    }
    next.set_fragment(None);
    Some(next)
}

fn is_html_like(headers: &header::HeaderMap) -> bool {
    match headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()) {
        Some(content_type) => {
            let content_type = content_type.to_ascii_lowercase();
            content_type.contains("html") || content_type.starts_with("text/")
        }
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_next() {
        let base = Url::parse("https://short.example/a/b?x=1").unwrap();

        assert_eq!(
            resolve_next(&base, "/login.php").unwrap().as_str(),
            "https://short.example/login.php"
        );
        assert_eq!(
            resolve_next(&base, "c").unwrap().as_str(),
            "https://short.example/a/c"
        );
        assert_eq!(
            resolve_next(&base, "//cdn.example/x").unwrap().as_str(),
            "https://cdn.example/x"
        );
        assert_eq!(
            resolve_next(&base, "http://other.example/#frag").unwrap().as_str(),
            "http://other.example/"
        );
        assert!(resolve_next(&base, "javascript:alert(1)").is_none());
        assert!(resolve_next(&base, "mailto:a@b.c").is_none());
    }

    #[test]
    fn test_is_html_like() {
        let mut headers = header::HeaderMap::new();
        assert!(is_html_like(&headers));

        headers.insert(header::CONTENT_TYPE, "text/html; charset=utf-8".parse().unwrap());
        assert!(is_html_like(&headers));

        headers.insert(header::CONTENT_TYPE, "image/png".parse().unwrap());
        assert!(!is_html_like(&headers));
    }

    #[test]
    fn test_user_agents_differ_by_device() {
        assert!(MOBILE_USER_AGENT.contains("iPhone"));
        assert!(DESKTOP_USER_AGENT.contains("Windows NT"));
    }

    #[tokio::test]
    async fn test_malformed_url_is_invalid_input() {
        let tracer = RedirectTracer::new(TraceConfig::default()).unwrap();
        let err = tracer.trace("   ").await.unwrap_err();
        assert!(matches!(err, VerifyError::InvalidInput { .. }));
    }
}
