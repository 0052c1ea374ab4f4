//! Domain Verify CLI Application
//!
//! A command-line front end over domain-verify-lib: look up when a domain was
//! registered, or follow a link to where it really leads.

mod ui;

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::{Args as ClapArgs, Parser, Subcommand};
use console::Term;
use domain_verify_lib::{
    load_env_config, parse_timeout_string, ConfigManager, DomainVerifier, ResolutionResult,
    ResolveConfig, TraceConfig, TraceResult, VerifyError,
};
use std::io::BufRead;
use std::process;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

/// CLI arguments for domain-verify
#[derive(Parser, Debug)]
#[command(name = "domain-verify")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Check a domain's registration age and trace suspicious redirect chains")]
#[command(
    long_about = "Check a domain's registration age and trace suspicious redirect chains.\n\nRegistration data comes from RDAP, a relay, raw WHOIS or public lookup pages, whichever answers first. Traces follow HTTP, meta-refresh and script redirects with a mobile identity and compare against a desktop probe."
)]
#[command(styles = STYLES)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub options: Options,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Look up registration date and registrar
    Domain {
        /// Hostnames or URLs; each is reduced to its registrable domain
        #[arg(value_name = "NAME")]
        names: Vec<String>,
    },
    /// Follow URLs hop by hop and classify the redirect path
    Trace {
        /// URLs to trace; a missing scheme defaults to https
        #[arg(value_name = "URL")]
        urls: Vec<String>,
    },
}

#[derive(ClapArgs, Debug, Default)]
pub struct Options {
    /// Read additional inputs from a file (one per line, # for comments)
    #[arg(short = 'f', long = "file", value_name = "FILE", global = true, help_heading = "Input")]
    pub file: Option<String>,

    /// Output results in JSON format
    #[arg(short = 'j', long = "json", global = true, help_heading = "Output Format")]
    pub json: bool,

    /// Pretty output: indented JSON, or a header and summary around text
    #[arg(short = 'p', long = "pretty", global = true, help_heading = "Output Format")]
    pub pretty: bool,

    /// Deadline per lookup or trace (e.g. "8s", "1m")
    #[arg(long = "timeout", value_name = "DURATION", global = true, help_heading = "Network")]
    pub timeout: Option<String>,

    /// HTTP relay for RDAP and lookup pages; receives the target as ?url=
    #[arg(long = "relay", value_name = "URL", global = true, help_heading = "Network")]
    pub relay: Option<String>,

    /// Disable the IANA bootstrap (built-in RDAP table and redirector only)
    #[arg(long = "no-bootstrap", global = true, help_heading = "Network")]
    pub no_bootstrap: bool,

    /// Hop cap for traces
    #[arg(long = "max-hops", value_name = "N", global = true, help_heading = "Network")]
    pub max_hops: Option<usize>,

    /// Max concurrent lookups or traces (1-100)
    #[arg(short = 'c', long = "concurrency", value_name = "N", global = true, help_heading = "Network")]
    pub concurrency: Option<usize>,

    /// Use specific config file instead of automatic discovery
    #[arg(long = "config", value_name = "FILE", global = true, help_heading = "Configuration")]
    pub config: Option<String>,

    /// Debug logging on stderr
    #[arg(short = 'v', long = "verbose", global = true, help_heading = "Configuration")]
    pub verbose: bool,
}

/// Output mode after flags and environment are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct OutputMode {
    pub json: bool,
    pub pretty: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_tracing(args.options.verbose);

    if let Err(e) = validate_args(&args) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }

    match run(args).await {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

/// Log to stderr; `RUST_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "domain_verify=debug,domain_verify_lib=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn validate_args(args: &Args) -> Result<(), String> {
    let opts = &args.options;

    let inputs = match &args.command {
        Command::Domain { names } => names,
        Command::Trace { urls } => urls,
    };
    if inputs.is_empty() && opts.file.is_none() {
        return Err("Provide at least one input, or --file".to_string());
    }

    if let Some(concurrency) = opts.concurrency {
        if concurrency == 0 || concurrency > 100 {
            return Err("Concurrency must be between 1 and 100".to_string());
        }
    }

    if opts.max_hops == Some(0) {
        return Err("--max-hops must be at least 1".to_string());
    }

    if let Some(timeout) = &opts.timeout {
        if parse_timeout_string(timeout).is_none() {
            return Err(format!(
                "Invalid timeout '{}'. Use format like '5s', '30s', '2m'",
                timeout
            ));
        }
    }

    if let Some(relay) = &opts.relay {
        if !relay.starts_with("http://") && !relay.starts_with("https://") {
            return Err(format!("Relay must be an http(s) URL, got '{}'", relay));
        }
    }

    Ok(())
}

/// Returns whether every input produced a result.
async fn run(args: Args) -> Result<bool, Box<dyn std::error::Error>> {
    let (resolve_config, trace_config, output) = build_config(&args.options)?;
    let verifier = DomainVerifier::with_config(resolve_config, trace_config)?;

    let (inputs, is_trace) = match &args.command {
        Command::Domain { names } => (names.clone(), false),
        Command::Trace { urls } => (urls.clone(), true),
    };
    let inputs = collect_inputs(inputs, args.options.file.as_deref())?;

    if output.pretty && !output.json {
        ui::print_header(is_trace, inputs.len(), &verifier);
    }

    let spinner = (output.pretty && !output.json && Term::stderr().is_term()).then(|| {
        let noun = if is_trace { "URL" } else { "domain" };
        ui::Spinner::start(format!(
            "Checking {} {}{}...",
            inputs.len(),
            noun,
            if inputs.len() == 1 { "" } else { "s" }
        ))
    });

    let started = Instant::now();
    let all_ok = if is_trace {
        let results = verifier.trace_urls(&inputs).await;
        if let Some(spinner) = spinner {
            spinner.stop().await;
        }
        display_traces(&inputs, &results, output, started.elapsed())?
    } else {
        let results = verifier.resolve_domains(&inputs).await;
        if let Some(spinner) = spinner {
            spinner.stop().await;
        }
        display_resolutions(&inputs, &results, output, started.elapsed())?
    };

    Ok(all_ok)
}

/// Config files, then `DV_*` variables, then flags.
fn build_config(
    opts: &Options,
) -> Result<(ResolveConfig, TraceConfig, OutputMode), Box<dyn std::error::Error>> {
    let mut resolve = ResolveConfig::default();
    let mut trace = TraceConfig::default();

    let config_manager = ConfigManager::new(opts.verbose);
    let env_config = load_env_config();

    let explicit_path = opts.config.clone().or_else(|| env_config.config.clone());
    let file_config = match &explicit_path {
        Some(path) => {
            tracing::debug!(%path, "using explicit config file");
            config_manager
                .load_file(path)
                .map_err(|e| format!("Failed to load config file '{}': {}", path, e))?
        }
        None => config_manager.discover_and_load()?,
    };
    file_config.apply(&mut resolve, &mut trace);
    env_config.apply(&mut resolve, &mut trace);

    apply_cli_args(opts, &mut resolve, &mut trace);

    let output = OutputMode {
        json: opts.json || env_config.json.unwrap_or(false),
        pretty: opts.pretty,
    };

    Ok((resolve, trace, output))
}

/// CLI arguments override both environment variables and config file settings.
fn apply_cli_args(opts: &Options, resolve: &mut ResolveConfig, trace: &mut TraceConfig) {
    if let Some(secs) = opts.timeout.as_deref().and_then(parse_timeout_string) {
        resolve.timeout = Duration::from_secs(secs);
        trace.timeout = Duration::from_secs(secs);
    }
    if let Some(relay) = &opts.relay {
        resolve.relay_url = Some(relay.clone());
    }
    // Only override when the user explicitly passes the flag
    if opts.no_bootstrap {
        resolve.enable_bootstrap = false;
    }
    if let Some(max_hops) = opts.max_hops {
        trace.max_hops = max_hops;
    }
    if let Some(concurrency) = opts.concurrency {
        resolve.concurrency = concurrency;
        trace.concurrency = concurrency;
    }
}

/// Positional inputs followed by the file's lines, blanks and comments skipped.
fn collect_inputs(
    mut inputs: Vec<String>,
    file: Option<&str>,
) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    if let Some(path) = file {
        let handle = std::fs::File::open(path)
            .map_err(|e| format!("Cannot open input file '{}': {}", path, e))?;
        for line in std::io::BufReader::new(handle).lines() {
            let line = line?;
            let trimmed = strip_comment(&line).trim();
            if !trimmed.is_empty() {
                inputs.push(trimmed.to_string());
            }
        }
    }

    if inputs.is_empty() {
        return Err("No inputs to check".into());
    }
    Ok(inputs)
}

/// Drop a `#` comment that starts the line or follows whitespace; a `#` inside
/// a URL (`https://x.app/#/verify`) is kept.
fn strip_comment(line: &str) -> &str {
    let mut prev_is_space = true;
    for (idx, c) in line.char_indices() {
        if c == '#' && prev_is_space {
            return &line[..idx];
        }
        prev_is_space = c.is_whitespace();
    }
    line
}

fn display_resolutions(
    inputs: &[String],
    results: &[Result<ResolutionResult, VerifyError>],
    output: OutputMode,
    duration: Duration,
) -> Result<bool, Box<dyn std::error::Error>> {
    if output.json {
        let values: Vec<serde_json::Value> = inputs
            .iter()
            .zip(results)
            .map(|(input, result)| match result {
                Ok(found) => serde_json::to_value(found).unwrap_or_default(),
                Err(e) => error_json(input, e),
            })
            .collect();
        print_json(values, output.pretty)?;
    } else {
        for (input, result) in inputs.iter().zip(results) {
            ui::print_resolution(input, result);
        }
        if output.pretty {
            let found = results.iter().filter(|r| r.is_ok()).count();
            println!();
            ui::print_summary(results.len(), found, results.len() - found, duration);
        }
    }

    Ok(results.iter().all(|r| !matches!(r, Err(e) if e.is_user_visible())))
}

fn display_traces(
    inputs: &[String],
    results: &[Result<TraceResult, VerifyError>],
    output: OutputMode,
    duration: Duration,
) -> Result<bool, Box<dyn std::error::Error>> {
    if output.json {
        let values: Vec<serde_json::Value> = inputs
            .iter()
            .zip(results)
            .map(|(input, result)| match result {
                Ok(trace) => serde_json::to_value(trace).unwrap_or_default(),
                Err(e) => error_json(input, e),
            })
            .collect();
        print_json(values, output.pretty)?;
    } else {
        for (input, result) in inputs.iter().zip(results) {
            ui::print_trace(input, result);
        }
        if output.pretty {
            let risky = results
                .iter()
                .filter(|r| matches!(r, Ok(t) if t.is_high_risk))
                .count();
            println!();
            ui::print_summary(results.len(), results.len() - risky, risky, duration);
        }
    }

    Ok(results.iter().all(|r| !matches!(r, Err(e) if e.is_user_visible())))
}

/// Wire shape of a failed input.
fn error_json(input: &str, error: &VerifyError) -> serde_json::Value {
    let mut value = serde_json::json!({
        "input": input,
        "error": error.to_string(),
    });
    if let Some(status) = error.status_code() {
        value["status"] = serde_json::json!(status);
    }
    value
}

/// One value prints as an object, several as an array.
fn print_json(
    mut values: Vec<serde_json::Value>,
    pretty: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let value = if values.len() == 1 {
        values.remove(0)
    } else {
        serde_json::Value::Array(values)
    };
    let rendered = if pretty {
        serde_json::to_string_pretty(&value)?
    } else {
        serde_json::to_string(&value)?
    };
    println!("{}", rendered);
    Ok(())
}
