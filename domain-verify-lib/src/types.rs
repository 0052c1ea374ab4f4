//! Core data types for registration lookups and redirect traces.
//!
//! Result types serialize to the wire JSON consumed by the front end: field
//! presence, not `null`, signals "unknown".

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// A hostname reduced to the part a registry actually sells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredDomain {
    /// Normalized input host (lowercase, no leading `www.`)
    pub hostname: String,
    /// eTLD+1, e.g. `example.com.tw`
    pub registrable_domain: String,
    /// Final label, e.g. `tw`
    pub tld: String,
}

/// One dated event from a registration record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationEvent {
    /// RDAP event action, e.g. "registration" or "expiration"
    pub action: String,
    /// ISO-8601 calendar date, `YYYY-MM-DD`
    pub date: String,
}

/// A party named in a registration record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationEntity {
    pub roles: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// Normalized output of whichever source answered first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionResult {
    pub events: Vec<RegistrationEvent>,
    pub entities: Vec<RegistrationEntity>,
    /// Name of the adapter that produced this result
    pub source: String,
}

impl ResolutionResult {
    /// Build a result from a creation date and optional registrar name.
    ///
    /// Used by the text-based adapters, which only ever recover these two fields.
    pub fn from_text_fields<S: Into<String>>(
        source: S,
        creation_date: String,
        registrar: Option<String>,
    ) -> Self {
        let entities = registrar
            .map(|name| {
                vec![RegistrationEntity {
                    roles: vec!["registrar".to_string()],
                    display_name: Some(name),
                }]
            })
            .unwrap_or_default();

        Self {
            events: vec![RegistrationEvent {
                action: "registration".to_string(),
                date: creation_date,
            }],
            entities,
            source: source.into(),
        }
    }

    /// Date of the first `registration` event.
    pub fn registration_date(&self) -> Option<&str> {
        self.events
            .iter()
            .find(|e| e.action == "registration")
            .map(|e| e.date.as_str())
    }

    /// Display name of the first entity carrying the `registrar` role.
    pub fn registrar(&self) -> Option<&str> {
        self.entities
            .iter()
            .filter(|e| e.roles.iter().any(|r| r == "registrar"))
            .find_map(|e| e.display_name.as_deref())
    }
}

/// Marker for hops whose next URL came from the page rather than a 3xx.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HopNote {
    #[serde(rename = "meta-refresh")]
    MetaRefresh,
    #[serde(rename = "script-redirect")]
    ScriptRedirect,
}

impl std::fmt::Display for HopNote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HopNote::MetaRefresh => write!(f, "meta-refresh"),
            HopNote::ScriptRedirect => write!(f, "script-redirect"),
        }
    }
}

/// One fetched URL in a redirect chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectHop {
    pub url: String,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<HopNote>,
}

/// Terminal state of a trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceOutcome {
    /// Reached a page that does not redirect
    Completed,
    /// A hop pointed back at an already visited URL
    Loop,
    /// Hop cap reached
    TooDeep,
    /// Global deadline expired
    Timeout,
    /// Transport failure mid-chain
    Error,
}

impl std::fmt::Display for TraceOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TraceOutcome::Completed => write!(f, "completed"),
            TraceOutcome::Loop => write!(f, "loop"),
            TraceOutcome::TooDeep => write!(f, "too_deep"),
            TraceOutcome::Timeout => write!(f, "timeout"),
            TraceOutcome::Error => write!(f, "error"),
        }
    }
}

/// Full result of following a URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceResult {
    pub final_url: String,
    /// Number of hops taken (redirects followed)
    pub redirect_count: usize,
    pub chain: Vec<RedirectHop>,
    pub is_high_risk: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_reason: Option<String>,
    pub cloaking_detected: bool,
    pub outcome: TraceOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Settings for the resolution cascade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveConfig {
    /// Deadline covering every stage of one resolution.
    /// Default: 12 seconds
    #[serde(skip)]
    pub timeout: Duration,

    /// Whether to consult the IANA bootstrap document for unknown TLDs
    /// Default: true
    pub enable_bootstrap: bool,

    /// Location of the bootstrap document
    pub bootstrap_url: String,

    /// How long a loaded bootstrap document stays fresh
    /// Default: 1 hour
    #[serde(skip)]
    pub bootstrap_ttl: Duration,

    /// RDAP redirector used when neither the manual table nor the bootstrap knows a TLD
    pub rdap_fallback_url: Option<String>,

    /// HTTP relay used by the proxied stages; receives the target as `?url=`
    pub relay_url: Option<String>,

    /// User agent sent to registry sources
    pub user_agent: String,

    /// TCP port for raw WHOIS queries
    /// Default: 43
    pub whois_port: u16,

    /// Bound on one WHOIS query (connect, send and read)
    /// Default: 5 seconds
    #[serde(skip)]
    pub whois_timeout: Duration,

    /// Whether to fall back to scraping public lookup pages
    /// Default: true
    pub enable_scrape: bool,

    /// TLD -> WHOIS host overrides
    pub whois_servers: HashMap<String, String>,

    /// TLD -> RDAP base URL overrides
    pub rdap_servers: HashMap<String, String>,

    /// Maximum number of concurrent resolutions in batch mode
    /// Default: 10, Range: 1-100
    pub concurrency: usize,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(12),
            enable_bootstrap: true,
            bootstrap_url: crate::protocols::registry::BOOTSTRAP_URL.to_string(),
            bootstrap_ttl: crate::protocols::registry::BOOTSTRAP_TTL,
            rdap_fallback_url: Some(crate::protocols::registry::RDAP_REDIRECTOR_URL.to_string()),
            relay_url: None,
            user_agent: crate::protocols::registry::REGISTRY_USER_AGENT.to_string(),
            whois_port: 43,
            whois_timeout: crate::protocols::whois::DEFAULT_WHOIS_TIMEOUT,
            enable_scrape: true,
            whois_servers: HashMap::new(),
            rdap_servers: HashMap::new(),
            concurrency: 10,
        }
    }
}

impl ResolveConfig {
    /// Set the deadline for one resolution.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the bound on one WHOIS query.
    pub fn with_whois_timeout(mut self, timeout: Duration) -> Self {
        self.whois_timeout = timeout;
        self
    }

    /// Enable or disable the IANA bootstrap.
    pub fn with_bootstrap(mut self, enabled: bool) -> Self {
        self.enable_bootstrap = enabled;
        self
    }

    /// Point the bootstrap directory at another document.
    pub fn with_bootstrap_url<S: Into<String>>(mut self, url: S) -> Self {
        self.bootstrap_url = url.into();
        self
    }

    /// Set (or clear) the RDAP redirector fallback.
    pub fn with_rdap_fallback(mut self, url: Option<String>) -> Self {
        self.rdap_fallback_url = url;
        self
    }

    /// Route the proxied stages through this relay.
    pub fn with_relay<S: Into<String>>(mut self, relay_url: S) -> Self {
        self.relay_url = Some(relay_url.into());
        self
    }

    /// Use a non-standard WHOIS port.
    pub fn with_whois_port(mut self, port: u16) -> Self {
        self.whois_port = port;
        self
    }

    /// Enable or disable the lookup-page scrape stages.
    pub fn with_scrape(mut self, enabled: bool) -> Self {
        self.enable_scrape = enabled;
        self
    }

    /// Override the WHOIS host for one TLD.
    pub fn with_whois_server<T: Into<String>, H: Into<String>>(mut self, tld: T, host: H) -> Self {
        self.whois_servers
            .insert(tld.into().to_lowercase(), host.into());
        self
    }

    /// Override the RDAP base URL for one TLD.
    pub fn with_rdap_server<T: Into<String>, U: Into<String>>(mut self, tld: T, url: U) -> Self {
        self.rdap_servers.insert(tld.into().to_lowercase(), url.into());
        self
    }

    /// Set batch concurrency. Capped at 100.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.clamp(1, 100);
        self
    }
}

/// Settings for the redirect tracer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceConfig {
    /// Deadline covering the whole trace including the cloaking probe.
    /// Default: 10 seconds
    #[serde(skip)]
    pub timeout: Duration,

    /// Hop cap. Default: 8
    pub max_hops: usize,

    /// Longest meta-refresh delay still treated as a redirect
    #[serde(skip)]
    pub meta_refresh_max_delay: Duration,

    /// Bytes of a 200 body scanned for client-side redirects
    pub max_body_bytes: usize,

    /// Identity used for the main trace
    pub mobile_user_agent: String,

    /// Identity used for the cloaking probe
    pub desktop_user_agent: String,

    /// Whether to send the desktop probe at all
    pub detect_cloaking: bool,

    /// Maximum number of concurrent traces in batch mode
    pub concurrency: usize,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_hops: 8,
            meta_refresh_max_delay: Duration::from_secs(10),
            max_body_bytes: 512 * 1024,
            mobile_user_agent: crate::trace::MOBILE_USER_AGENT.to_string(),
            desktop_user_agent: crate::trace::DESKTOP_USER_AGENT.to_string(),
            detect_cloaking: true,
            concurrency: 10,
        }
    }
}

impl TraceConfig {
    /// Set the deadline for one trace.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the hop cap (at least 1).
    pub fn with_max_hops(mut self, max_hops: usize) -> Self {
        self.max_hops = max_hops.max(1);
        self
    }

    /// Enable or disable the desktop cloaking probe.
    pub fn with_cloaking_probe(mut self, enabled: bool) -> Self {
        self.detect_cloaking = enabled;
        self
    }

    /// Set batch concurrency. Capped at 100.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.clamp(1, 100);
        self
    }
}
