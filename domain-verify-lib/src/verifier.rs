//! Public entry point tying both engines together.
//!
//! `DomainVerifier` owns one resolution cascade and one redirect tracer. The
//! two never call each other; they only share this struct.

use crate::cascade::{ResolutionCascade, SourceAdapter};
use crate::domain::registered_domain;
use crate::error::VerifyError;
use crate::protocols::{
    generic_scrape_site, tld_scrape_sites, BootstrapDirectory, RdapAdapter, RdapEndpoints,
    RelayRdapAdapter, ScrapeAdapter, WhoisAdapter,
};
use crate::trace::RedirectTracer;
use crate::types::{ResolutionResult, ResolveConfig, TraceConfig, TraceResult};
use futures::stream::{self, StreamExt};
use std::sync::Arc;

/// Domain legitimacy checks: registration lookup and redirect tracing.
///
/// # Example
///
/// ```rust,no_run
/// use domain_verify_lib::DomainVerifier;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let verifier = DomainVerifier::new()?;
///
///     let registration = verifier.resolve_domain("shop.example.com.tw").await?;
///     println!("registered {:?}", registration.registration_date());
///
///     let trace = verifier.trace_url("bit.do/abc").await?;
///     println!("{} after {} hops", trace.final_url, trace.redirect_count);
///     Ok(())
/// }
/// ```
pub struct DomainVerifier {
    resolve_config: ResolveConfig,
    cascade: ResolutionCascade,
    tracer: RedirectTracer,
    bootstrap: Option<Arc<BootstrapDirectory>>,
}

impl DomainVerifier {
    /// Create a verifier with default settings.
    pub fn new() -> Result<Self, VerifyError> {
        Self::with_config(ResolveConfig::default(), TraceConfig::default())
    }

    /// Create a verifier with custom settings.
    ///
    /// ```rust
    /// use domain_verify_lib::{DomainVerifier, ResolveConfig, TraceConfig};
    /// use std::time::Duration;
    ///
    /// let resolve = ResolveConfig::default()
    ///     .with_timeout(Duration::from_secs(8))
    ///     .with_relay("https://relay.example/fetch");
    /// let trace = TraceConfig::default().with_max_hops(5);
    ///
    /// let verifier = DomainVerifier::with_config(resolve, trace).unwrap();
    /// assert!(verifier.stage_names().contains(&"rdap-proxy"));
    /// ```
    pub fn with_config(
        resolve_config: ResolveConfig,
        trace_config: TraceConfig,
    ) -> Result<Self, VerifyError> {
        let client = reqwest::Client::builder()
            .timeout(resolve_config.timeout)
            .build()
            .map_err(|e| VerifyError::internal(format!("Failed to create HTTP client: {}", e)))?;

        let bootstrap = resolve_config.enable_bootstrap.then(|| {
            Arc::new(BootstrapDirectory::with_source(
                client.clone(),
                resolve_config.bootstrap_url.clone(),
                resolve_config.bootstrap_ttl,
            ))
        });

        let cascade = build_cascade(&resolve_config, client, bootstrap.clone());
        let tracer = RedirectTracer::new(trace_config)?;

        Ok(Self {
            resolve_config,
            cascade,
            tracer,
            bootstrap,
        })
    }

    /// Registration date and registrar for the domain behind `raw`.
    ///
    /// `raw` may be a hostname at any depth or a full URL; it is reduced to its
    /// registrable domain before any source is asked.
    pub async fn resolve_domain(&self, raw: &str) -> Result<ResolutionResult, VerifyError> {
        let domain = registered_domain(raw)?;
        self.cascade.run(&domain).await
    }

    /// Follow `raw` to its destination and classify the path.
    pub async fn trace_url(&self, raw: &str) -> Result<TraceResult, VerifyError> {
        self.tracer.trace(raw).await
    }

    /// Resolve several domains concurrently. Results are in input order.
    pub async fn resolve_domains(
        &self,
        inputs: &[String],
    ) -> Vec<Result<ResolutionResult, VerifyError>> {
        stream::iter(inputs)
            .map(|input| self.resolve_domain(input))
            .buffered(self.resolve_config.concurrency.max(1))
            .collect()
            .await
    }

    /// Trace several URLs concurrently. Results are in input order.
    pub async fn trace_urls(&self, inputs: &[String]) -> Vec<Result<TraceResult, VerifyError>> {
        stream::iter(inputs)
            .map(|input| self.trace_url(input))
            .buffered(self.tracer.config().concurrency.max(1))
            .collect()
            .await
    }

    /// Cascade stage names in evaluation order.
    pub fn stage_names(&self) -> Vec<&str> {
        self.cascade.adapter_names()
    }

    /// The bootstrap directory, when enabled.
    pub fn bootstrap(&self) -> Option<&Arc<BootstrapDirectory>> {
        self.bootstrap.as_ref()
    }

    pub fn resolve_config(&self) -> &ResolveConfig {
        &self.resolve_config
    }

    pub fn trace_config(&self) -> &TraceConfig {
        self.tracer.config()
    }
}

/// Stage order: direct RDAP, relayed RDAP, raw WHOIS, TLD lookup pages, generic lookup page.
fn build_cascade(
    config: &ResolveConfig,
    client: reqwest::Client,
    bootstrap: Option<Arc<BootstrapDirectory>>,
) -> ResolutionCascade {
    let endpoints = Arc::new(RdapEndpoints::new(
        config.rdap_servers.clone(),
        bootstrap,
        config.rdap_fallback_url.clone(),
    ));

    let mut adapters: Vec<Box<dyn SourceAdapter>> = vec![Box::new(RdapAdapter::new(
        client.clone(),
        endpoints.clone(),
        config.user_agent.clone(),
    ))];

    if config.relay_url.is_some() {
        adapters.push(Box::new(RelayRdapAdapter::new(
            client.clone(),
            endpoints,
            config.relay_url.clone(),
            config.user_agent.clone(),
        )));
    }

    adapters.push(Box::new(
        WhoisAdapter::new(config.whois_port, config.whois_servers.clone())
            .with_timeout(config.whois_timeout),
    ));

    if config.enable_scrape {
        for site in tld_scrape_sites() {
            adapters.push(Box::new(ScrapeAdapter::new(
                site,
                client.clone(),
                config.relay_url.clone(),
            )));
        }
        adapters.push(Box::new(ScrapeAdapter::new(
            generic_scrape_site(),
            client,
            config.relay_url.clone(),
        )));
    }

    ResolutionCascade::new(adapters, config.timeout)
}
