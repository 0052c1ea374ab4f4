//! Ordered fallback over registration data sources.
//!
//! The cascade is a list of [`SourceAdapter`]s evaluated one at a time under a
//! single deadline. The first adapter that returns a structured result wins;
//! later adapters never run and results are never merged across sources.

use crate::error::VerifyError;
use crate::types::{RegisteredDomain, ResolutionResult};
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// What a single source had to say about a domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterOutcome {
    /// Structured registration data
    Found(ResolutionResult),
    /// No usable data; the cascade moves on
    Absent {
        /// HTTP status the source answered with, if it answered at all
        status: Option<u16>,
        reason: String,
    },
}

impl AdapterOutcome {
    pub fn absent<S: Into<String>>(reason: S) -> Self {
        Self::Absent {
            status: None,
            reason: reason.into(),
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

impl From<VerifyError> for AdapterOutcome {
    fn from(err: VerifyError) -> Self {
        Self::Absent {
            status: err.status_code(),
            reason: err.to_string(),
        }
    }
}

impl From<Result<ResolutionResult, VerifyError>> for AdapterOutcome {
    fn from(result: Result<ResolutionResult, VerifyError>) -> Self {
        match result {
            Ok(found) => Self::Found(found),
            Err(e) => e.into(),
        }
    }
}

/// One registration data source.
///
/// Implementations never fail past their own boundary: transport errors,
/// non-2xx answers and unparseable bodies all become [`AdapterOutcome::Absent`].
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Name recorded as `source` on results and in the attempt log.
    fn name(&self) -> &str;

    /// Whether this adapter should run for a TLD at all.
    fn applies_to(&self, _tld: &str) -> bool {
        true
    }

    /// Query the source for a registrable domain.
    async fn attempt(&self, domain: &str, tld: &str) -> AdapterOutcome;
}

/// Runs adapters in priority order with early return.
pub struct ResolutionCascade {
    adapters: Vec<Box<dyn SourceAdapter>>,
    deadline: Duration,
}

impl ResolutionCascade {
    /// Create a cascade over `adapters`, in the order given.
    pub fn new(adapters: Vec<Box<dyn SourceAdapter>>, deadline: Duration) -> Self {
        Self { adapters, deadline }
    }

    /// Adapter names in evaluation order.
    pub fn adapter_names(&self) -> Vec<&str> {
        self.adapters.iter().map(|a| a.name()).collect()
    }

    /// Resolve one domain.
    ///
    /// Returns the first structured result, or `NotFound` carrying the last HTTP
    /// status any stage saw and a per-stage log once every stage came back empty
    /// or the deadline expired.
    pub async fn run(&self, domain: &RegisteredDomain) -> Result<ResolutionResult, VerifyError> {
        let deadline = Instant::now() + self.deadline;
        let name = domain.registrable_domain.as_str();
        let tld = domain.tld.as_str();

        let mut attempts = Vec::new();
        let mut last_status = None;
        let mut timed_out = false;

        for adapter in &self.adapters {
            if !adapter.applies_to(tld) {
                debug!(stage = adapter.name(), tld, "stage skipped for TLD");
                continue;
            }

            debug!(stage = adapter.name(), domain = name, "trying source");
            match tokio::time::timeout_at(deadline, adapter.attempt(name, tld)).await {
                Ok(AdapterOutcome::Found(result)) => {
                    info!(stage = adapter.name(), domain = name, "registration data found");
                    return Ok(result);
                }
                Ok(AdapterOutcome::Absent { status, reason }) => {
                    debug!(stage = adapter.name(), ?status, %reason, "source had no data");
                    if status.is_some() {
                        last_status = status;
                    }
                    attempts.push(format!("{}: {}", adapter.name(), reason));
                }
                Err(_) => {
                    warn!(stage = adapter.name(), domain = name, deadline = ?self.deadline, "resolution deadline exceeded");
                    attempts.push(format!("{}: deadline exceeded", adapter.name()));
                    timed_out = true;
                    break;
                }
            }
        }

        Err(VerifyError::NotFound {
            domain: name.to_string(),
            last_status,
            attempts,
            timed_out,
        })
    }
}
