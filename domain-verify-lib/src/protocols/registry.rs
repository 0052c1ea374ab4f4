//! Registry tables and the IANA bootstrap directory.
//!
//! Everything a source adapter needs to know about a TLD before it sends a
//! request lives here: which RDAP server to ask, which WHOIS host to dial,
//! whether the registry sits behind a firewall, and which headers to send.

use crate::error::VerifyError;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// IANA RDAP bootstrap document for DNS.
pub const BOOTSTRAP_URL: &str = "https://data.iana.org/rdap/dns.json";

/// Bootstrap cache TTL: 1 hour
pub const BOOTSTRAP_TTL: Duration = Duration::from_secs(3600);

/// Redirector used when no table knows the TLD.
pub const RDAP_REDIRECTOR_URL: &str = "https://rdap.org";

/// User agent sent to registries and the relay.
pub const REGISTRY_USER_AGENT: &str = "AntiScam-Tool/2.0";

/// TLDs whose registry blocks most foreign traffic; the direct RDAP stage is skipped.
pub const FIREWALL_TLDS: &[&str] = &["cn"];

/// Built-in RDAP base URLs, without the `/domain/` suffix.
pub fn manual_rdap_servers() -> HashMap<&'static str, &'static str> {
    HashMap::from([
        // gTLDs
        ("com", "https://rdap.verisign.com/com/v1"),
        ("net", "https://rdap.verisign.com/net/v1"),
        ("org", "https://rdap.publicinterestregistry.org/rdap"),
        ("info", "https://rdap.identitydigital.services/rdap"),
        ("biz", "https://rdap.nic.biz"),
        ("app", "https://pubapi.registry.google/rdap"),
        ("dev", "https://pubapi.registry.google/rdap"),
        ("xyz", "https://rdap.centralnic.com/xyz"),
        ("online", "https://rdap.centralnic.com/online"),
        ("site", "https://rdap.centralnic.com/site"),
        ("shop", "https://rdap.gmoregistry.net/rdap"),
        ("top", "https://rdap.zdnsgtld.com/top"),
        // ccTLDs
        ("tw", "https://ccrdap.twnic.tw/tw"),
        ("io", "https://rdap.identitydigital.services/rdap"),
        ("me", "https://rdap.identitydigital.services/rdap"),
        ("uk", "https://rdap.nominet.uk/uk"),
        ("de", "https://rdap.denic.de"),
        ("fr", "https://rdap.nic.fr"),
        ("nl", "https://rdap.sidn.nl"),
        ("au", "https://rdap.cctld.au/rdap"),
        ("br", "https://rdap.registro.br"),
        ("us", "https://rdap.nic.us"),
        ("cc", "https://tld-rdap.verisign.com/cc/v1"),
        ("tv", "https://rdap.nic.tv"),
    ])
}

/// Conventional port-43 WHOIS hosts.
pub fn whois_host_table() -> HashMap<&'static str, &'static str> {
    HashMap::from([
        ("com", "whois.verisign-grs.com"),
        ("net", "whois.verisign-grs.com"),
        ("org", "whois.pir.org"),
        ("info", "whois.nic.info"),
        ("tw", "whois.twnic.net.tw"),
        ("cn", "whois.cnnic.cn"),
        ("hk", "whois.hkirc.hk"),
        ("jp", "whois.jprs.jp"),
        ("uk", "whois.nic.uk"),
        ("io", "whois.nic.io"),
        ("de", "whois.denic.de"),
        ("fr", "whois.nic.fr"),
        ("au", "whois.auda.org.au"),
        ("sg", "whois.sgnic.sg"),
        ("my", "whois.mynic.my"),
        ("kr", "whois.kr"),
        ("cc", "ccwhois.verisign-grs.com"),
        ("tv", "tvwhois.verisign-grs.com"),
    ])
}

/// WHOIS host for a TLD: configured override, built-in table, then `whois.nic.<tld>`.
pub fn whois_host(tld: &str, overrides: &HashMap<String, String>) -> String {
    let tld = tld.to_lowercase();
    if let Some(host) = overrides.get(&tld) {
        return host.clone();
    }
    whois_host_table()
        .get(tld.as_str())
        .map(|h| h.to_string())
        .unwrap_or_else(|| format!("whois.nic.{}", tld))
}

/// Manual RDAP base URL for a TLD: configured override, then the built-in table.
pub fn manual_rdap_server(tld: &str, overrides: &HashMap<String, String>) -> Option<String> {
    let tld = tld.to_lowercase();
    overrides.get(&tld).cloned().or_else(|| {
        manual_rdap_servers()
            .get(tld.as_str())
            .map(|s| s.to_string())
    })
}

/// Full RDAP query URL for a domain under a base URL.
pub fn rdap_domain_url(base: &str, domain: &str) -> String {
    format!("{}/domain/{}", base.trim_end_matches('/'), domain)
}

/// Whether the direct RDAP stage should be skipped for this TLD.
pub fn is_firewalled(tld: &str) -> bool {
    FIREWALL_TLDS.contains(&tld.to_lowercase().as_str())
}

/// Who a request is addressed to; selects the header profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfileSource {
    /// An RDAP server, directly or through the relay
    Registry,
    /// A third-party WHOIS lookup web page
    LookupSite,
}

/// Headers sent with one outbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestProfile {
    pub user_agent: String,
    pub accept: &'static str,
    pub accept_language: &'static str,
    pub referer: Option<&'static str>,
    pub origin: Option<&'static str>,
}

impl RequestProfile {
    /// Resolve the profile for a (source, TLD) pair.
    pub fn resolve(source: ProfileSource, tld: &str, registry_user_agent: &str) -> Self {
        let mut profile = match source {
            ProfileSource::Registry => Self {
                user_agent: registry_user_agent.to_string(),
                accept: "application/rdap+json, application/json;q=0.9, */*;q=0.5",
                accept_language: "en-US,en;q=0.9",
                referer: None,
                origin: None,
            },
            ProfileSource::LookupSite => Self {
                user_agent: crate::trace::DESKTOP_USER_AGENT.to_string(),
                accept: "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
                accept_language: "en-US,en;q=0.9",
                referer: None,
                origin: None,
            },
        };

        match tld.to_lowercase().as_str() {
            "cn" => {
                profile.accept_language = "zh-CN,zh;q=0.9,en;q=0.6";
                profile.referer = Some("https://whois.cnnic.cn/");
                profile.origin = Some("https://whois.cnnic.cn");
            }
            "tw" => {
                profile.accept_language = "zh-TW,zh;q=0.9,en;q=0.6";
            }
            _ => {}
        }

        profile
    }

    /// Attach the profile's headers to a request.
    pub fn apply(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let mut request = request
            .header(reqwest::header::USER_AGENT, self.user_agent.as_str())
            .header(reqwest::header::ACCEPT, self.accept)
            .header(reqwest::header::ACCEPT_LANGUAGE, self.accept_language);
        if let Some(referer) = self.referer {
            request = request.header(reqwest::header::REFERER, referer);
        }
        if let Some(origin) = self.origin {
            request = request.header(reqwest::header::ORIGIN, origin);
        }
        request
    }
}

#[derive(Default)]
struct BootstrapCache {
    /// TLD -> RDAP base URL
    data: Option<HashMap<String, String>>,
    fetched_at: Option<Instant>,
}

/// TTL-cached TLD → RDAP base URL directory backed by the IANA bootstrap file.
///
/// A failed refresh never discards data already loaded and never moves the
/// refresh timestamp, so the next lookup retries straight away while still
/// answering from the old table.
pub struct BootstrapDirectory {
    client: reqwest::Client,
    source_url: String,
    ttl: Duration,
    cache: RwLock<BootstrapCache>,
}

impl BootstrapDirectory {
    /// Directory over the IANA document with the default TTL.
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_source(client, BOOTSTRAP_URL, BOOTSTRAP_TTL)
    }

    /// Directory over any document in the IANA bootstrap format.
    pub fn with_source<S: Into<String>>(client: reqwest::Client, source_url: S, ttl: Duration) -> Self {
        Self {
            client,
            source_url: source_url.into(),
            ttl,
            cache: RwLock::new(BootstrapCache::default()),
        }
    }

    /// True when nothing has been loaded yet or the last load is older than the TTL.
    pub fn is_stale(&self) -> bool {
        match self.cache.read() {
            Ok(cache) => match cache.fetched_at {
                Some(t) => t.elapsed() > self.ttl,
                None => true,
            },
            Err(_) => true,
        }
    }

    /// Look up a TLD, refreshing first if the cache is stale.
    ///
    /// Refresh failures are logged and otherwise ignored.
    pub async fn get(&self, tld: &str) -> Option<String> {
        if self.is_stale() {
            if let Err(e) = self.refresh().await {
                warn!(source = %self.source_url, error = %e, "bootstrap refresh failed, serving cached data");
            }
        }
        self.lookup_cached(tld)
    }

    /// Look up a TLD in whatever is loaded, without touching the network.
    pub fn lookup_cached(&self, tld: &str) -> Option<String> {
        let cache = self.cache.read().ok()?;
        cache.data.as_ref()?.get(&tld.to_lowercase()).cloned()
    }

    /// Fetch the bootstrap document and replace the cache.
    ///
    /// Returns the number of TLDs loaded. On error the cache is left untouched.
    pub async fn refresh(&self) -> Result<usize, VerifyError> {
        debug!(source = %self.source_url, "refreshing RDAP bootstrap");

        let response = self
            .client
            .get(&self.source_url)
            .header(reqwest::header::USER_AGENT, REGISTRY_USER_AGENT)
            .send()
            .await
            .map_err(|e| VerifyError::upstream("rdap-bootstrap", e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            return Err(VerifyError::upstream_with_status(
                "rdap-bootstrap",
                format!("Bootstrap registry returned HTTP {}", status),
                status,
            ));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| VerifyError::parse(format!("Failed to parse bootstrap JSON: {}", e)))?;
        let endpoints = parse_bootstrap_document(&json)?;
        let count = endpoints.len();

        let mut cache = self
            .cache
            .write()
            .map_err(|_| VerifyError::internal("Failed to acquire bootstrap cache lock"))?;
        cache.data = Some(endpoints);
        cache.fetched_at = Some(Instant::now());

        debug!(tlds = count, "RDAP bootstrap loaded");
        Ok(count)
    }
}

/// Flatten an IANA bootstrap document into TLD → first service URL.
pub fn parse_bootstrap_document(
    json: &serde_json::Value,
) -> Result<HashMap<String, String>, VerifyError> {
    let services = json
        .get("services")
        .and_then(|s| s.as_array())
        .ok_or_else(|| {
            VerifyError::parse("Invalid bootstrap JSON: missing or invalid 'services' array")
        })?;

    let mut endpoints = HashMap::new();

    for service in services {
        let Some(entry) = service.as_array() else {
            continue;
        };
        if entry.len() < 2 {
            continue;
        }

        let url = entry[1]
            .as_array()
            .and_then(|urls| urls.first())
            .and_then(|u| u.as_str());
        let (Some(url), Some(tlds)) = (url, entry[0].as_array()) else {
            continue;
        };

        let base = url.trim_end_matches('/').to_string();
        for tld in tlds.iter().filter_map(|t| t.as_str()) {
            endpoints
                .entry(tld.to_lowercase())
                .or_insert_with(|| base.clone());
        }
    }

    Ok(endpoints)
}
