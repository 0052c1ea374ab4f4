//! Error handling for registration lookups and redirect traces.
//!
//! Only two conditions ever reach a caller: bad input, and a lookup where every
//! source came back empty. Everything else is recovered inside the cascade or
//! folded into a trace's risk classification.

use std::fmt;
use std::time::Duration;

/// Main error type for the library.
#[derive(Debug, Clone)]
pub enum VerifyError {
    /// Missing or unparseable domain / URL. Raised before any network call.
    InvalidInput {
        input: String,
        reason: String,
    },

    /// A source answered with a non-2xx status or the transport failed.
    UpstreamUnavailable {
        source: String,
        message: String,
        status_code: Option<u16>,
    },

    /// The per-request deadline expired.
    Timeout {
        operation: String,
        duration: Duration,
    },

    /// Structured or unstructured data held no recognizable field.
    ParseFailure {
        message: String,
    },

    /// Every stage of the resolution cascade came back empty.
    NotFound {
        domain: String,
        last_status: Option<u16>,
        attempts: Vec<String>,
        timed_out: bool,
    },

    /// Invalid settings in a config file or the environment
    ConfigError {
        message: String,
    },

    /// Config file could not be read
    FileError {
        path: String,
        message: String,
    },

    /// Generic internal errors that don't fit other categories
    Internal {
        message: String,
    },
}

impl VerifyError {
    /// Create a new invalid input error.
    pub fn invalid_input<I: Into<String>, R: Into<String>>(input: I, reason: R) -> Self {
        Self::InvalidInput {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Create a new upstream error without an HTTP status.
    pub fn upstream<S: Into<String>, M: Into<String>>(source: S, message: M) -> Self {
        Self::UpstreamUnavailable {
            source: source.into(),
            message: message.into(),
            status_code: None,
        }
    }

    /// Create a new upstream error carrying the HTTP status the source returned.
    pub fn upstream_with_status<S: Into<String>, M: Into<String>>(
        source: S,
        message: M,
        status_code: u16,
    ) -> Self {
        Self::UpstreamUnavailable {
            source: source.into(),
            message: message.into(),
            status_code: Some(status_code),
        }
    }

    /// Create a new timeout error.
    pub fn timeout<O: Into<String>>(operation: O, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a new parse failure.
    pub fn parse<M: Into<String>>(message: M) -> Self {
        Self::ParseFailure {
            message: message.into(),
        }
    }

    /// Create a new config error.
    pub fn config<M: Into<String>>(message: M) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create a new internal error.
    pub fn internal<M: Into<String>>(message: M) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create a new file error.
    pub fn file_error<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::FileError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// HTTP status attached to this error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::UpstreamUnavailable { status_code, .. } => *status_code,
            Self::NotFound { last_status, .. } => *last_status,
            _ => None,
        }
    }

    /// Whether a caller should show this error to the user.
    ///
    /// Upstream, timeout and parse failures are absorbed by the cascade and
    /// the tracer; they only surface through `NotFound`.
    pub fn is_user_visible(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput { .. }
                | Self::NotFound { .. }
                | Self::ConfigError { .. }
                | Self::FileError { .. }
        )
    }
}

impl fmt::Display for VerifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput { input, reason } => {
                write!(f, "Invalid input '{}': {}", input, reason)
            }
            Self::UpstreamUnavailable {
                source,
                message,
                status_code,
            } => {
                if let Some(code) = status_code {
                    write!(f, "{} unavailable (HTTP {}): {}", source, code, message)
                } else {
                    write!(f, "{} unavailable: {}", source, message)
                }
            }
            Self::Timeout {
                operation,
                duration,
            } => {
                write!(f, "Timeout after {:?} during: {}", duration, operation)
            }
            Self::ParseFailure { message } => {
                write!(f, "Parse error: {}", message)
            }
            Self::NotFound {
                domain,
                last_status,
                attempts,
                timed_out,
            } => {
                write!(f, "No registration data found for '{}'", domain)?;
                if let Some(code) = last_status {
                    write!(f, " (last HTTP status {})", code)?;
                }
                if *timed_out {
                    write!(f, " [deadline exceeded]")?;
                }
                if !attempts.is_empty() {
                    write!(f, ": {}", attempts.join("; "))?;
                }
                Ok(())
            }
            Self::ConfigError { message } => {
                write!(f, "Configuration error: {}", message)
            }
            Self::FileError { path, message } => {
                write!(f, "File error at '{}': {}", path, message)
            }
            Self::Internal { message } => {
                write!(f, "Internal error: {}", message)
            }
        }
    }
}

impl std::error::Error for VerifyError {}

impl From<reqwest::Error> for VerifyError {
    fn from(err: reqwest::Error) -> Self {
        let status = err.status().map(|s| s.as_u16());
        if err.is_timeout() {
            Self::timeout("HTTP request", Duration::from_secs(0))
        } else if let Some(code) = status {
            Self::upstream_with_status("http", err.to_string(), code)
        } else if err.is_connect() {
            Self::upstream("http", format!("Connection failed: {}", err))
        } else {
            Self::upstream("http", format!("HTTP request failed: {}", err))
        }
    }
}

impl From<serde_json::Error> for VerifyError {
    fn from(err: serde_json::Error) -> Self {
        Self::parse(format!("JSON parsing failed: {}", err))
    }
}

impl From<std::io::Error> for VerifyError {
    fn from(err: std::io::Error) -> Self {
        Self::upstream("socket", format!("I/O error: {}", err))
    }
}
