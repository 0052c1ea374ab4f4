//! HTML-scrape source adapters against public WHOIS lookup pages.
//!
//! The page is fetched (through the relay when one is configured), reduced to
//! text and run through the same extractors as raw WHOIS replies. Only the
//! first [`MAX_PAGE_BYTES`] of a page are read.

use crate::cascade::{AdapterOutcome, SourceAdapter};
use crate::error::VerifyError;
use crate::extract::{extract_date, extract_registrar, strip_markup};
use crate::protocols::registry::{ProfileSource, RequestProfile};
use crate::types::ResolutionResult;
use crate::utils::read_body_prefix;
use async_trait::async_trait;
use tracing::debug;

/// Most bytes read from one lookup page.
pub const MAX_PAGE_BYTES: usize = 512 * 1024;

/// A lookup page, addressed by a URL template containing `{domain}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeSite {
    /// Short site name; the adapter reports itself as `scrape:<name>`
    pub name: String,
    pub url_template: String,
    /// TLD this site is limited to; `None` for a generic site
    pub tld: Option<String>,
}

impl ScrapeSite {
    pub fn new<N: Into<String>, U: Into<String>>(name: N, url_template: U, tld: Option<&str>) -> Self {
        Self {
            name: name.into(),
            url_template: url_template.into(),
            tld: tld.map(|t| t.to_lowercase()),
        }
    }

    /// Lookup page URL for a domain.
    pub fn url_for(&self, domain: &str) -> String {
        self.url_template.replace("{domain}", domain)
    }
}

/// Registry-run lookup pages, one per TLD.
pub fn tld_scrape_sites() -> Vec<ScrapeSite> {
    vec![
        ScrapeSite::new(
            "cnnic",
            "https://whois.cnnic.cn/WhoisServlet?queryType=Domain&domain={domain}",
            Some("cn"),
        ),
        ScrapeSite::new(
            "twnic",
            "https://www.twnic.tw/whois_n.cgi?query={domain}",
            Some("tw"),
        ),
    ]
}

/// Lookup page that answers for any TLD.
pub fn generic_scrape_site() -> ScrapeSite {
    ScrapeSite::new("whois.com", "https://www.whois.com/whois/{domain}", None)
}

/// Adapter scraping one lookup site.
pub struct ScrapeAdapter {
    name: String,
    site: ScrapeSite,
    client: reqwest::Client,
    relay_url: Option<String>,
}

impl ScrapeAdapter {
    pub fn new(site: ScrapeSite, client: reqwest::Client, relay_url: Option<String>) -> Self {
        Self {
            name: format!("scrape:{}", site.name),
            site,
            client,
            relay_url,
        }
    }

    async fn fetch_page(&self, domain: &str, tld: &str) -> Result<String, VerifyError> {
        let target = self.site.url_for(domain);
        let profile = RequestProfile::resolve(ProfileSource::LookupSite, tld, "");

        let request = match &self.relay_url {
            Some(relay) => self.client.get(relay).query(&[("url", target.as_str())]),
            None => self.client.get(&target),
        };

        debug!(site = %self.site.name, %target, relayed = self.relay_url.is_some(), "fetching lookup page");
        let response = profile
            .apply(request)
            .send()
            .await
            .map_err(|e| VerifyError::upstream(self.name.as_str(), format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(VerifyError::upstream_with_status(
                self.name.as_str(),
                format!("lookup page returned {}", status),
                status.as_u16(),
            ));
        }

        read_body_prefix(response, MAX_PAGE_BYTES)
            .await
            .map_err(|e| VerifyError::upstream(self.name.as_str(), format!("Body read failed: {}", e)))
    }
}

#[async_trait]
impl SourceAdapter for ScrapeAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn applies_to(&self, tld: &str) -> bool {
        match &self.site.tld {
            Some(site_tld) => site_tld.eq_ignore_ascii_case(tld),
            None => true,
        }
    }

    async fn attempt(&self, domain: &str, tld: &str) -> AdapterOutcome {
        let html = match self.fetch_page(domain, tld).await {
            Ok(html) => html,
            Err(e) => return e.into(),
        };

        let text = strip_markup(&html);
        match extract_date(&text) {
            Some(date) => AdapterOutcome::Found(ResolutionResult::from_text_fields(
                self.name.as_str(),
                date,
                extract_registrar(&text),
            )),
            None => VerifyError::parse(format!("{}: no creation date on page", self.name)).into(),
        }
    }
}
