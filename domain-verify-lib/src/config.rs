//! Configuration file parsing and management.
//!
//! Settings come from TOML files and `DV_*` environment variables. Files are
//! merged lowest precedence first; the environment is applied on top, and the
//! CLI applies its own flags last.

use crate::error::VerifyError;
use crate::types::{ResolveConfig, TraceConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration loaded from TOML files.
///
/// ```toml
/// [resolve]
/// timeout = "12s"
/// relay_url = "https://relay.example/fetch"
///
/// [trace]
/// max_hops = 8
///
/// [whois_servers]
/// tw = "whois.twnic.net.tw"
///
/// [rdap_servers]
/// tw = "https://ccrdap.twnic.tw/tw"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolve: Option<ResolveSection>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<TraceSection>,

    /// TLD -> WHOIS host overrides
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whois_servers: Option<HashMap<String, String>>,

    /// TLD -> RDAP base URL overrides
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rdap_servers: Option<HashMap<String, String>>,
}

/// `[resolve]` section.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ResolveSection {
    /// Deadline for one resolution (e.g. "12s", "1m")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub relay_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bootstrap_url: Option<String>,

    /// Whether to use the IANA bootstrap
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bootstrap: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub whois_port: Option<u16>,

    /// Bound on one port-43 query, e.g. "5s"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whois_timeout: Option<String>,

    /// Whether to scrape public lookup pages as a last resort
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scrape: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,
}

/// `[trace]` section.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TraceSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_hops: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mobile_user_agent: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub desktop_user_agent: Option<String>,

    /// Whether to send the desktop cloaking probe
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloaking_probe: Option<bool>,
}

impl FileConfig {
    /// Apply every value present in this file on top of `resolve` and `trace`.
    pub fn apply(&self, resolve: &mut ResolveConfig, trace: &mut TraceConfig) {
        if let Some(section) = &self.resolve {
            if let Some(timeout) = section.timeout.as_deref().and_then(parse_timeout_string) {
                resolve.timeout = Duration::from_secs(timeout);
            }
            if let Some(relay) = &section.relay_url {
                resolve.relay_url = Some(relay.clone());
            }
            if let Some(url) = &section.bootstrap_url {
                resolve.bootstrap_url = url.clone();
            }
            if let Some(enabled) = section.bootstrap {
                resolve.enable_bootstrap = enabled;
            }
            if let Some(port) = section.whois_port {
                resolve.whois_port = port;
            }
            if let Some(timeout) = section.whois_timeout.as_deref().and_then(parse_timeout_string) {
                resolve.whois_timeout = Duration::from_secs(timeout);
            }
            if let Some(enabled) = section.scrape {
                resolve.enable_scrape = enabled;
            }
            if let Some(concurrency) = section.concurrency {
                resolve.concurrency = concurrency;
            }
        }

        if let Some(section) = &self.trace {
            if let Some(timeout) = section.timeout.as_deref().and_then(parse_timeout_string) {
                trace.timeout = Duration::from_secs(timeout);
            }
            if let Some(max_hops) = section.max_hops {
                trace.max_hops = max_hops;
            }
            if let Some(ua) = &section.mobile_user_agent {
                trace.mobile_user_agent = ua.clone();
            }
            if let Some(ua) = &section.desktop_user_agent {
                trace.desktop_user_agent = ua.clone();
            }
            if let Some(enabled) = section.cloaking_probe {
                trace.detect_cloaking = enabled;
            }
        }

        for (tld, host) in self.whois_servers.iter().flatten() {
            resolve.whois_servers.insert(tld.to_lowercase(), host.clone());
        }
        for (tld, url) in self.rdap_servers.iter().flatten() {
            resolve.rdap_servers.insert(tld.to_lowercase(), url.clone());
        }
    }
}

/// Configuration discovery and loading functionality.
pub struct ConfigManager {
    /// Whether to report which of several discovered files won
    pub verbose: bool,
}

impl ConfigManager {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Load and validate one configuration file.
    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<FileConfig, VerifyError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(VerifyError::file_error(
                path.to_string_lossy(),
                "Configuration file not found",
            ));
        }

        let content = fs::read_to_string(path).map_err(|e| {
            VerifyError::file_error(
                path.to_string_lossy(),
                format!("Failed to read configuration file: {}", e),
            )
        })?;

        let config: FileConfig = toml::from_str(&content)
            .map_err(|e| VerifyError::config(format!("Failed to parse TOML configuration: {}", e)))?;

        self.validate_config(&config)?;
        debug!(path = %path.display(), "loaded configuration file");

        Ok(config)
    }

    /// Discover and load configuration files in precedence order.
    ///
    /// Files that exist but fail to parse are skipped with a warning.
    pub fn discover_and_load(&self) -> Result<FileConfig, VerifyError> {
        let mut merged_config = FileConfig::default();
        let mut loaded_files = Vec::new();

        let candidates = [
            self.get_xdg_config_path(),
            self.get_global_config_path(),
            self.get_local_config_path(),
        ];

        for path in candidates.into_iter().flatten() {
            match self.load_file(&path) {
                Ok(config) => {
                    merged_config = self.merge_configs(merged_config, config);
                    loaded_files.push(path);
                }
                Err(e) => warn!(path = %path.display(), error = %e, "ignoring configuration file"),
            }
        }

        if self.verbose && loaded_files.len() > 1 {
            for (i, path) in loaded_files.iter().enumerate() {
                let role = if i == loaded_files.len() - 1 {
                    "highest precedence"
                } else {
                    "overridden where set above"
                };
                warn!(path = %path.display(), role, "multiple configuration files");
            }
        }

        Ok(merged_config)
    }

    fn get_local_config_path(&self) -> Option<PathBuf> {
        ["./domain-verify.toml", "./.domain-verify.toml"]
            .iter()
            .map(Path::new)
            .find(|path| path.exists())
            .map(Path::to_path_buf)
    }

    fn get_global_config_path(&self) -> Option<PathBuf> {
        let home = env::var_os("HOME")?;
        [".domain-verify.toml", "domain-verify.toml"]
            .iter()
            .map(|candidate| Path::new(&home).join(candidate))
            .find(|path| path.exists())
    }

    /// `$XDG_CONFIG_HOME/domain-verify/config.toml`, defaulting to `~/.config`.
    fn get_xdg_config_path(&self) -> Option<PathBuf> {
        let config_dir = env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| env::var_os("HOME").map(|home| Path::new(&home).join(".config")))?;

        let path = config_dir.join("domain-verify").join("config.toml");
        path.exists().then_some(path)
    }

    /// Values from `higher` take precedence over values from `lower`.
    fn merge_configs(&self, lower: FileConfig, higher: FileConfig) -> FileConfig {
        FileConfig {
            resolve: match (lower.resolve, higher.resolve) {
                (Some(lower), Some(higher)) => Some(ResolveSection {
                    timeout: higher.timeout.or(lower.timeout),
                    relay_url: higher.relay_url.or(lower.relay_url),
                    bootstrap_url: higher.bootstrap_url.or(lower.bootstrap_url),
                    bootstrap: higher.bootstrap.or(lower.bootstrap),
                    whois_port: higher.whois_port.or(lower.whois_port),
                    whois_timeout: higher.whois_timeout.or(lower.whois_timeout),
                    scrape: higher.scrape.or(lower.scrape),
                    concurrency: higher.concurrency.or(lower.concurrency),
                }),
                (lower, higher) => higher.or(lower),
            },
            trace: match (lower.trace, higher.trace) {
                (Some(lower), Some(higher)) => Some(TraceSection {
                    timeout: higher.timeout.or(lower.timeout),
                    max_hops: higher.max_hops.or(lower.max_hops),
                    mobile_user_agent: higher.mobile_user_agent.or(lower.mobile_user_agent),
                    desktop_user_agent: higher.desktop_user_agent.or(lower.desktop_user_agent),
                    cloaking_probe: higher.cloaking_probe.or(lower.cloaking_probe),
                }),
                (lower, higher) => higher.or(lower),
            },
            whois_servers: merge_tables(lower.whois_servers, higher.whois_servers),
            rdap_servers: merge_tables(lower.rdap_servers, higher.rdap_servers),
        }
    }

    fn validate_config(&self, config: &FileConfig) -> Result<(), VerifyError> {
        if let Some(resolve) = &config.resolve {
            if let Some(concurrency) = resolve.concurrency {
                if concurrency == 0 || concurrency > 100 {
                    return Err(VerifyError::config("Concurrency must be between 1 and 100"));
                }
            }
            validate_timeout("resolve.timeout", resolve.timeout.as_deref())?;
            validate_timeout("resolve.whois_timeout", resolve.whois_timeout.as_deref())?;
            if resolve.whois_port == Some(0) {
                return Err(VerifyError::config("whois_port cannot be 0"));
            }
        }

        if let Some(trace) = &config.trace {
            validate_timeout("trace.timeout", trace.timeout.as_deref())?;
            if trace.max_hops == Some(0) {
                return Err(VerifyError::config("max_hops must be at least 1"));
            }
        }

        let tables = [
            ("whois_servers", &config.whois_servers),
            ("rdap_servers", &config.rdap_servers),
        ];
        for (section, table) in tables {
            for (tld, target) in table.iter().flatten() {
                if tld.is_empty() || tld.contains('.') || tld.contains(' ') {
                    return Err(VerifyError::config(format!(
                        "Invalid TLD '{}' in [{}]",
                        tld, section
                    )));
                }
                if target.trim().is_empty() {
                    return Err(VerifyError::config(format!(
                        "Empty server for '{}' in [{}]",
                        tld, section
                    )));
                }
            }
        }

        if let Some(servers) = &config.rdap_servers {
            for (tld, url) in servers {
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    return Err(VerifyError::config(format!(
                        "RDAP server for '{}' must be an http(s) URL, got '{}'",
                        tld, url
                    )));
                }
            }
        }

        Ok(())
    }
}

fn merge_tables(
    lower: Option<HashMap<String, String>>,
    higher: Option<HashMap<String, String>>,
) -> Option<HashMap<String, String>> {
    match (lower, higher) {
        (Some(mut lower), Some(higher)) => {
            lower.extend(higher);
            Some(lower)
        }
        (lower, higher) => higher.or(lower),
    }
}

fn validate_timeout(field: &str, value: Option<&str>) -> Result<(), VerifyError> {
    match value {
        Some(raw) if parse_timeout_string(raw).is_none() => Err(VerifyError::config(format!(
            "Invalid {} '{}'. Use format like '5s', '30s', '2m'",
            field, raw
        ))),
        _ => Ok(()),
    }
}

/// Settings taken from `DV_*` environment variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvConfig {
    /// `DV_TIMEOUT`, seconds
    pub timeout: Option<u64>,
    /// `DV_TRACE_TIMEOUT`, seconds
    pub trace_timeout: Option<u64>,
    pub relay_url: Option<String>,
    pub max_hops: Option<usize>,
    pub bootstrap: Option<bool>,
    pub concurrency: Option<usize>,
    pub json: Option<bool>,
    /// `DV_CONFIG`: explicit config file path
    pub config: Option<String>,
}

impl EnvConfig {
    /// Build from an arbitrary variable lookup. Invalid values are logged and ignored.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut env_config = EnvConfig::default();

        if let Some(val) = lookup("DV_TIMEOUT") {
            env_config.timeout = parse_timeout_string(&val);
            if env_config.timeout.is_none() {
                warn!(value = %val, "invalid DV_TIMEOUT, use a format like '5s', '30s', '2m'");
            }
        }

        if let Some(val) = lookup("DV_TRACE_TIMEOUT") {
            env_config.trace_timeout = parse_timeout_string(&val);
            if env_config.trace_timeout.is_none() {
                warn!(value = %val, "invalid DV_TRACE_TIMEOUT, use a format like '5s', '30s', '2m'");
            }
        }

        if let Some(val) = lookup("DV_RELAY_URL") {
            if !val.trim().is_empty() {
                env_config.relay_url = Some(val.trim().to_string());
            }
        }

        if let Some(val) = lookup("DV_MAX_HOPS") {
            match val.trim().parse::<usize>() {
                Ok(hops) if hops > 0 => env_config.max_hops = Some(hops),
                _ => warn!(value = %val, "invalid DV_MAX_HOPS, must be a positive integer"),
            }
        }

        if let Some(val) = lookup("DV_CONCURRENCY") {
            match val.trim().parse::<usize>() {
                Ok(concurrency) if (1..=100).contains(&concurrency) => {
                    env_config.concurrency = Some(concurrency)
                }
                _ => warn!(value = %val, "invalid DV_CONCURRENCY, must be 1-100"),
            }
        }

        env_config.bootstrap = lookup("DV_BOOTSTRAP").and_then(|val| parse_flag("DV_BOOTSTRAP", &val));
        env_config.json = lookup("DV_JSON").and_then(|val| parse_flag("DV_JSON", &val));

        if let Some(val) = lookup("DV_CONFIG") {
            if !val.trim().is_empty() {
                env_config.config = Some(val);
            }
        }

        debug!(?env_config, "environment configuration");
        env_config
    }

    /// Apply every value present on top of `resolve` and `trace`.
    pub fn apply(&self, resolve: &mut ResolveConfig, trace: &mut TraceConfig) {
        if let Some(secs) = self.timeout {
            resolve.timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.trace_timeout {
            trace.timeout = Duration::from_secs(secs);
        }
        if let Some(relay) = &self.relay_url {
            resolve.relay_url = Some(relay.clone());
        }
        if let Some(max_hops) = self.max_hops {
            trace.max_hops = max_hops;
        }
        if let Some(enabled) = self.bootstrap {
            resolve.enable_bootstrap = enabled;
        }
        if let Some(concurrency) = self.concurrency {
            resolve.concurrency = concurrency;
            trace.concurrency = concurrency;
        }
    }
}

/// Read `DV_*` variables from the process environment.
pub fn load_env_config() -> EnvConfig {
    EnvConfig::from_lookup(|name| env::var(name).ok())
}

fn parse_flag(name: &str, val: &str) -> Option<bool> {
    match val.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => {
            warn!(variable = name, value = %val, "invalid boolean, use true/false");
            None
        }
    }
}

/// Parse a timeout like "5s", "30s", "2m" or bare seconds.
pub fn parse_timeout_string(timeout_str: &str) -> Option<u64> {
    let timeout_str = timeout_str.trim().to_lowercase();

    if let Some(secs) = timeout_str.strip_suffix('s') {
        secs.parse::<u64>().ok()
    } else if let Some(mins) = timeout_str.strip_suffix('m') {
        mins.parse::<u64>().ok().map(|m| m * 60)
    } else {
        timeout_str.parse::<u64>().ok()
    }
}
