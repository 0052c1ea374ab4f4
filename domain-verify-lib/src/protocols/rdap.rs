//! RDAP (Registration Data Access Protocol) source adapters.
//!
//! Two adapters share one endpoint resolver: the direct adapter talks to the
//! registry's RDAP server itself, the relay adapter sends the same request
//! through an HTTP relay that receives the target as its `url` query parameter.

use crate::cascade::{AdapterOutcome, SourceAdapter};
use crate::error::VerifyError;
use crate::protocols::registry::{
    is_firewalled, manual_rdap_server, rdap_domain_url, BootstrapDirectory, ProfileSource,
    RequestProfile,
};
use crate::types::{RegistrationEntity, RegistrationEvent, ResolutionResult};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::StatusCode;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Delay before the single retry after an HTTP 429.
const RATE_LIMIT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Where an RDAP base URL came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointOrigin {
    /// Configured override or the built-in table
    Manual,
    /// IANA bootstrap document
    Bootstrap,
    /// The RDAP redirector
    Redirector,
}

/// Picks the RDAP base URL for a TLD.
///
/// Lookup order: configured overrides and the built-in table, the bootstrap
/// directory (when enabled), then the redirector (when configured).
pub struct RdapEndpoints {
    overrides: HashMap<String, String>,
    bootstrap: Option<Arc<BootstrapDirectory>>,
    redirector: Option<String>,
}

impl RdapEndpoints {
    pub fn new(
        overrides: HashMap<String, String>,
        bootstrap: Option<Arc<BootstrapDirectory>>,
        redirector: Option<String>,
    ) -> Self {
        Self {
            overrides,
            bootstrap,
            redirector,
        }
    }

    /// Base URL for `tld` and where it came from.
    pub async fn locate(&self, tld: &str) -> Option<(String, EndpointOrigin)> {
        if let Some(base) = manual_rdap_server(tld, &self.overrides) {
            return Some((base, EndpointOrigin::Manual));
        }
        if let Some(bootstrap) = &self.bootstrap {
            if let Some(base) = bootstrap.get(tld).await {
                return Some((base, EndpointOrigin::Bootstrap));
            }
        }
        self.redirector
            .clone()
            .map(|base| (base, EndpointOrigin::Redirector))
    }
}

/// Direct RDAP lookup against the registry's own server.
///
/// Skipped for firewalled TLDs, whose registries reject foreign clients.
pub struct RdapAdapter {
    client: reqwest::Client,
    endpoints: Arc<RdapEndpoints>,
    user_agent: String,
}

impl RdapAdapter {
    pub fn new(client: reqwest::Client, endpoints: Arc<RdapEndpoints>, user_agent: String) -> Self {
        Self {
            client,
            endpoints,
            user_agent,
        }
    }
}

#[async_trait]
impl SourceAdapter for RdapAdapter {
    fn name(&self) -> &str {
        "rdap"
    }

    fn applies_to(&self, tld: &str) -> bool {
        !is_firewalled(tld)
    }

    async fn attempt(&self, domain: &str, tld: &str) -> AdapterOutcome {
        let Some((base, origin)) = self.endpoints.locate(tld).await else {
            return AdapterOutcome::absent(format!("no RDAP server known for .{}", tld));
        };

        let source = match origin {
            EndpointOrigin::Bootstrap => "rdap-bootstrap",
            EndpointOrigin::Manual | EndpointOrigin::Redirector => "rdap",
        };
        let url = rdap_domain_url(&base, domain);
        let profile = RequestProfile::resolve(ProfileSource::Registry, tld, &self.user_agent);

        debug!(%url, source, "direct RDAP request");
        fetch_rdap(source, || profile.apply(self.client.get(&url)))
            .await
            .into()
    }
}

/// RDAP lookup routed through an HTTP relay.
pub struct RelayRdapAdapter {
    client: reqwest::Client,
    endpoints: Arc<RdapEndpoints>,
    relay_url: Option<String>,
    user_agent: String,
}

impl RelayRdapAdapter {
    pub fn new(
        client: reqwest::Client,
        endpoints: Arc<RdapEndpoints>,
        relay_url: Option<String>,
        user_agent: String,
    ) -> Self {
        Self {
            client,
            endpoints,
            relay_url,
            user_agent,
        }
    }
}

#[async_trait]
impl SourceAdapter for RelayRdapAdapter {
    fn name(&self) -> &str {
        "rdap-proxy"
    }

    async fn attempt(&self, domain: &str, tld: &str) -> AdapterOutcome {
        let Some(relay) = &self.relay_url else {
            return AdapterOutcome::absent("no relay configured");
        };
        let Some((base, _)) = self.endpoints.locate(tld).await else {
            return AdapterOutcome::absent(format!("no RDAP server known for .{}", tld));
        };

        let target = rdap_domain_url(&base, domain);
        let profile = RequestProfile::resolve(ProfileSource::Registry, tld, &self.user_agent);

        debug!(%relay, %target, "relayed RDAP request");
        fetch_rdap("rdap-proxy", || {
            profile.apply(self.client.get(relay).query(&[("url", target.as_str())]))
        })
        .await
        .into()
    }
}

/// Send an RDAP request, retrying once after a 429, and normalize the answer.
async fn fetch_rdap<F>(source: &str, build: F) -> Result<ResolutionResult, VerifyError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut response = build()
        .send()
        .await
        .map_err(|e| VerifyError::upstream(source, format!("Request failed: {}", e)))?;

    if response.status() == StatusCode::TOO_MANY_REQUESTS {
        debug!(source, "rate limited, retrying after 500ms");
        tokio::time::sleep(RATE_LIMIT_RETRY_DELAY).await;
        response = build()
            .send()
            .await
            .map_err(|e| VerifyError::upstream(source, format!("Retry request failed: {}", e)))?;
    }

    let status = response.status();
    if !status.is_success() {
        return Err(VerifyError::upstream_with_status(
            source,
            format!("RDAP server returned {}", status),
            status.as_u16(),
        ));
    }

    let json = response
        .json::<serde_json::Value>()
        .await
        .map_err(|e| VerifyError::parse(format!("{}: failed to parse JSON: {}", source, e)))?;

    rdap_to_resolution(&json, source)
}

/// Map an RDAP domain object onto a [`ResolutionResult`].
///
/// Event dates are cut to `YYYY-MM-DD`; events whose date does not parse are
/// dropped. A response with neither events nor entities is a parse failure.
pub fn rdap_to_resolution(
    json: &serde_json::Value,
    source: &str,
) -> Result<ResolutionResult, VerifyError> {
    let events: Vec<RegistrationEvent> = json
        .get("events")
        .and_then(|e| e.as_array())
        .map(|events| {
            events
                .iter()
                .filter_map(|event| {
                    let action = event.get("eventAction")?.as_str()?;
                    let date = normalize_rdap_date(event.get("eventDate")?.as_str()?)?;
                    Some(RegistrationEvent {
                        action: action.to_string(),
                        date,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let entities: Vec<RegistrationEntity> = json
        .get("entities")
        .and_then(|e| e.as_array())
        .map(|entities| {
            entities
                .iter()
                .map(|entity| RegistrationEntity {
                    roles: entity
                        .get("roles")
                        .and_then(|r| r.as_array())
                        .map(|roles| {
                            roles
                                .iter()
                                .filter_map(|r| r.as_str().map(String::from))
                                .collect()
                        })
                        .unwrap_or_default(),
                    display_name: extract_vcard_name(entity)
                        .or_else(|| extract_entity_identifier(entity)),
                })
                .collect()
        })
        .unwrap_or_default();

    if events.is_empty() && entities.is_empty() {
        return Err(VerifyError::parse(format!(
            "{}: response has no events or entities",
            source
        )));
    }

    Ok(ResolutionResult {
        events,
        entities,
        source: source.to_string(),
    })
}

/// `1995-08-14T04:00:00Z` → `1995-08-14`
fn normalize_rdap_date(raw: &str) -> Option<String> {
    let day = raw.trim().get(..10)?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .ok()
        .map(|d| d.format("%Y-%m-%d").to_string())
}

/// Extract the `fn` value from an entity's vCard.
fn extract_vcard_name(entity: &serde_json::Value) -> Option<String> {
    entity
        .get("vcardArray")?
        .as_array()?
        .get(1)?
        .as_array()?
        .iter()
        .filter_map(|item| item.as_array())
        .find(|item| item.len() >= 4 && item[0].as_str() == Some("fn"))
        .and_then(|item| item[3].as_str())
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
}

/// Extract entity identifier from publicIds or handle.
fn extract_entity_identifier(entity: &serde_json::Value) -> Option<String> {
    if let Some(id) = entity
        .get("publicIds")
        .and_then(|p| p.as_array())
        .and_then(|ids| ids.first())
        .and_then(|id| id.get("identifier"))
        .and_then(|i| i.as_str())
    {
        return Some(id.to_string());
    }

    entity
        .get("handle")
        .and_then(|h| h.as_str())
        .map(String::from)
}
