//! `pactverify-replay` — Rebuilds a verification report from a captured event log.
//!
//! Reads a JSON Lines file of lifecycle events, folds it into a report, and
//! merges the report into `<report-dir>/<provider><extension>`.
//!
//! **Usage:**
//! ```
//! pactverify-replay <events.jsonl> [--config <file.toml>] [--report-dir <path>] [--extension <ext>]
//! ```
//!
//! Exits non-zero if any interaction failed or any pact failed to load.

#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    missing_docs,
    clippy::missing_errors_doc
)]

use std::fs;
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use pactverify_report::{parse_event_log, persist, replay, MergeOutcome, ReporterConfig};
use tracing_subscriber::EnvFilter;

/// Replay a captured verification event log into a report.
#[derive(Parser)]
#[command(
    name = "pactverify-replay",
    about = "Rebuild a provider verification report from a JSON Lines event log"
)]
struct Args {
    /// Event log, one JSON event per line.
    events: PathBuf,

    /// TOML file with `report_dir` and `extension` keys.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory receiving the report (overrides the config file).
    #[arg(long)]
    report_dir: Option<PathBuf>,

    /// Report file extension (overrides the config file).
    #[arg(long)]
    extension: Option<String>,
}

fn resolve_config(args: &Args) -> Result<ReporterConfig> {
    let mut config = match &args.config {
        Some(path) => ReporterConfig::from_toml_file(path)?,
        None => ReporterConfig::default(),
    };
    if let Some(dir) = &args.report_dir {
        config.report_dir = dir.clone();
    }
    if let Some(extension) = &args.extension {
        config = config.with_extension(extension);
    }
    Ok(config)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = resolve_config(&args)?;

    let text = fs::read_to_string(&args.events)
        .with_context(|| format!("Failed to read event log: {}", args.events.display()))?;
    let document = replay(parse_event_log(&text)?)?;
    let path = config.report_path(&document.provider.name);
    let outcome = persist(&document, &path)?;

    println!("Verification Report: {}", document.provider.name);
    println!("================================");
    println!();

    let mut passed = 0usize;
    let mut failed = 0usize;

    for execution in &document.executions {
        let consumer = &execution.consumer.name;
        if let Some(failure) = execution.load_failure() {
            failed += 1;
            println!("[FAIL] {} — {}: {}", consumer, failure.state, failure.message);
            continue;
        }
        for entry in &execution.interactions {
            let description = entry.interaction.description().unwrap_or("<no description>");
            let status = if entry.verification.is_failed() {
                failed += 1;
                "FAIL"
            } else {
                passed += 1;
                "PASS"
            };
            println!("[{}] {} — {}", status, consumer, description);
        }
    }

    println!();
    println!("Summary: {} passed, {} failed", passed, failed);
    let action = match outcome {
        MergeOutcome::Created => "written".to_owned(),
        MergeOutcome::Merged { prior_executions } => {
            format!("merged after {} prior execution(s)", prior_executions)
        }
        MergeOutcome::Replaced { previous_provider } => {
            format!("replaced report for {}", previous_provider)
        }
    };
    println!("Report {}: {}", action, path.display());

    if failed > 0 {
        eprintln!("Verification FAILED: {} check(s) did not pass.", failed);
        process::exit(1);
    }

    Ok(())
}
