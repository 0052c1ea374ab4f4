//! # Domain Verify Library
//!
//! Two checks for a suspicious link: when (and through whom) its domain was
//! registered, and where the URL really leads.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use domain_verify_lib::DomainVerifier;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let verifier = DomainVerifier::new()?;
//!
//!     let registration = verifier.resolve_domain("antiscam.showcha.com").await?;
//!     println!("Registered: {:?} via {}", registration.registration_date(), registration.source);
//!
//!     let trace = verifier.trace_url("https://bit.do/example").await?;
//!     println!("{} (high risk: {})", trace.final_url, trace.is_high_risk);
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Resolution cascade**: RDAP (manual table, IANA bootstrap, redirector),
//!   relayed RDAP, raw WHOIS and lookup-page scraping, tried in order under one deadline
//! - **Redirect tracing**: 3xx, meta-refresh and script redirects with loop
//!   detection and a hop cap
//! - **Cloaking detection**: a desktop probe compared with the mobile trace
//! - **Configurable**: TOML files and `DV_*` environment variables

pub use cascade::{AdapterOutcome, ResolutionCascade, SourceAdapter};
pub use config::{load_env_config, parse_timeout_string, ConfigManager, EnvConfig, FileConfig};
pub use domain::{registered_domain, SECOND_LEVEL_SUFFIXES};
pub use error::VerifyError;
pub use extract::{extract_date, extract_registrar, strip_markup};
pub use protocols::{BootstrapDirectory, RdapAdapter, RelayRdapAdapter, ScrapeAdapter, WhoisAdapter};
pub use risk::RiskAssessment;
pub use trace::{RedirectTracer, DESKTOP_USER_AGENT, MOBILE_USER_AGENT};
pub use types::{
    HopNote, RedirectHop, RegisteredDomain, RegistrationEntity, RegistrationEvent,
    ResolutionResult, ResolveConfig, TraceConfig, TraceOutcome, TraceResult,
};
pub use verifier::DomainVerifier;

// Building blocks, public for custom cascades and for testing against local servers
pub mod cascade;
pub mod html;
pub mod protocols;
pub mod risk;

mod config;
mod domain;
mod error;
mod extract;
mod trace;
mod types;
mod utils;
mod verifier;

pub type Result<T> = std::result::Result<T, VerifyError>;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
