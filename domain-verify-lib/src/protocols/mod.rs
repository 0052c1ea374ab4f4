//! Registration data sources.
//!
//! Each submodule provides one or more [`SourceAdapter`](crate::cascade::SourceAdapter)
//! implementations; `registry` holds the tables and bootstrap directory they share.

/// RDAP over HTTP, direct and relayed
pub mod rdap;

/// Registry tables and the IANA bootstrap directory
pub mod registry;

/// Third-party WHOIS lookup pages
pub mod scrape;

/// Raw WHOIS over TCP port 43
pub mod whois;

pub use rdap::{rdap_to_resolution, RdapAdapter, RdapEndpoints, RelayRdapAdapter};
pub use registry::{BootstrapDirectory, ProfileSource, RequestProfile};
pub use scrape::{generic_scrape_site, tld_scrape_sites, ScrapeAdapter, ScrapeSite};
pub use whois::WhoisAdapter;
