//! Text-mode display logic for domain-verify CLI.
//!
//! Colored result lines, the `--pretty` header and summary, and a spinner.
//! Uses only the `console` crate.

use console::{pad_str, style, Alignment, Term};
use domain_verify_lib::{DomainVerifier, ResolutionResult, TraceOutcome, TraceResult, VerifyError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const INPUT_WIDTH: usize = 32;

// ── Spinner ──────────────────────────────────────────────────────────────────

const SPINNER_FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// An async braille-dot spinner that writes to stderr so stdout stays clean.
pub struct Spinner {
    running: Arc<AtomicBool>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl Spinner {
    pub fn start(message: String) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let running_clone = running.clone();

        let handle = tokio::spawn(async move {
            let term = Term::stderr();
            let mut idx = 0usize;
            while running_clone.load(Ordering::Relaxed) {
                let frame = SPINNER_FRAMES[idx % SPINNER_FRAMES.len()];
                let _ = term.clear_line();
                let _ = term.write_str(&format!("{} {}", style(frame).cyan(), message));
                idx += 1;
                tokio::time::sleep(Duration::from_millis(80)).await;
            }
            let _ = term.clear_line();
        });

        Self {
            running,
            handle: Some(handle),
        }
    }

    /// Stop the spinner and clear the line.
    pub async fn stop(mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(h) = self.handle.take() {
            let _ = h.await;
        }
    }
}

// ── Header ───────────────────────────────────────────────────────────────────

pub fn print_header(is_trace: bool, input_count: usize, verifier: &DomainVerifier) {
    let what = if is_trace { "Tracing" } else { "Resolving" };
    println!(
        "{} {} {}",
        style("domain-verify").bold(),
        style(format!("v{}", env!("CARGO_PKG_VERSION"))).dim(),
        style(format!(
            "· {} {} input{}",
            what,
            input_count,
            if input_count == 1 { "" } else { "s" }
        ))
        .dim(),
    );

    let meta = if is_trace {
        let config = verifier.trace_config();
        format!(
            "Max hops: {} | Timeout: {}s | Cloaking probe: {}",
            config.max_hops,
            config.timeout.as_secs(),
            if config.detect_cloaking { "on" } else { "off" }
        )
    } else {
        format!(
            "Sources: {} | Timeout: {}s",
            verifier.stage_names().join(" → "),
            verifier.resolve_config().timeout.as_secs()
        )
    };
    println!("{}", style(meta).dim());
    println!();
}

// ── Result lines ─────────────────────────────────────────────────────────────

pub fn print_resolution(input: &str, result: &Result<ResolutionResult, VerifyError>) {
    let padded = pad_str(input, INPUT_WIDTH, Alignment::Left, Some(".."));
    match result {
        Ok(found) => println!(
            "  {}  {}  {}",
            style(&padded).white(),
            style(found.registration_date().unwrap_or("no date")).green().bold(),
            style(format_resolution(found)).dim(),
        ),
        Err(e) => println!(
            "  {}  {}  {}",
            style(&padded).white(),
            style("NOT FOUND").yellow(),
            style(brief_error(e)).dim(),
        ),
    }
}

pub fn print_trace(input: &str, result: &Result<TraceResult, VerifyError>) {
    let padded = pad_str(input, INPUT_WIDTH, Alignment::Left, Some(".."));
    let trace = match result {
        Ok(trace) => trace,
        Err(e) => {
            println!(
                "  {}  {}  {}",
                style(&padded).white(),
                style("ERROR").yellow(),
                style(brief_error(e)).dim(),
            );
            return;
        }
    };

    let verdict = if trace.is_high_risk {
        style("HIGH RISK").red().bold()
    } else {
        style("OK").green().bold()
    };
    println!(
        "  {}  {}  {}",
        style(&padded).white(),
        verdict,
        style(format!("{} → {}", trace_summary(trace), trace.final_url)).dim(),
    );

    for hop in &trace.chain {
        let note = hop.note.map(|n| format!(" ({})", n)).unwrap_or_default();
        println!("    {} {} {}{}", style("└─").dim(), hop.status, hop.url, note);
    }
    if let Some(reason) = &trace.risk_reason {
        println!("    {} {}", style("!").red(), reason);
    }
}

// ── Summary ──────────────────────────────────────────────────────────────────

pub fn print_summary(total: usize, good: usize, flagged: usize, duration: Duration) {
    println!(
        "  {}",
        style("────────────────────────────────────────────────────").dim()
    );
    println!(
        "  {} input{} in {:.1}s  {}  {}  {}  {}",
        style(total).bold(),
        if total == 1 { "" } else { "s" },
        duration.as_secs_f64(),
        style("|").dim(),
        style(format!("{} ok", good)).green(),
        style("|").dim(),
        style(format!("{} flagged", flagged)).red(),
    );
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Registrar and source as one short string.
pub fn format_resolution(result: &ResolutionResult) -> String {
    match result.registrar() {
        Some(registrar) => format!("Registrar: {}, via {}", registrar, result.source),
        None => format!("via {}", result.source),
    }
}

/// Hop count and terminal state, e.g. "2 hops" or "1 hop, loop".
pub fn trace_summary(trace: &TraceResult) -> String {
    let hops = format!(
        "{} hop{}",
        trace.redirect_count,
        if trace.redirect_count == 1 { "" } else { "s" }
    );
    match trace.outcome {
        TraceOutcome::Completed => hops,
        other => format!("{}, {}", hops, other),
    }
}

fn brief_error(error: &VerifyError) -> &'static str {
    match error {
        VerifyError::InvalidInput { .. } => "(invalid input)",
        VerifyError::NotFound {
            timed_out: true, ..
        } => "(timeout)",
        VerifyError::NotFound { .. } => "(no source had data)",
        VerifyError::Timeout { .. } => "(timeout)",
        VerifyError::ConfigError { .. } | VerifyError::FileError { .. } => "(configuration error)",
        _ => "(error)",
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
