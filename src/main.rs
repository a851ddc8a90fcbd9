mod cli;

use std::fs;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use bracketsheet::engine::{ReconstructOptions, reconstruct};
use bracketsheet::model::{Page, Severity};
use bracketsheet::util::{now_utc_string, write_json_pretty};

use crate::cli::Cli;

#[derive(Debug, Serialize)]
struct RunManifest {
    manifest_version: u32,
    generated_at: String,
    tokens_path: String,
    mode: String,
    page_count: usize,
    match_count: usize,
    diagnostic_counts: DiagnosticCounts,
}

#[derive(Debug, Serialize)]
struct DiagnosticCounts {
    info: usize,
    warning: usize,
    fatal: usize,
}

fn main() {
    init_tracing();

    if let Err(err) = run() {
        error!(error = %err, "command failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let raw = fs::read(&cli.tokens_path)
        .with_context(|| format!("failed to read {}", cli.tokens_path.display()))?;
    let pages: Vec<Page> = serde_json::from_slice(&raw)
        .with_context(|| format!("failed to parse {}", cli.tokens_path.display()))?;

    let options = ReconstructOptions {
        mode: cli.mode.into(),
        bracket_size: cli.bracket_size,
        max_unresolved_winner_ratio: cli.max_unresolved_winner_ratio,
        max_dropped_token_ratio: cli.max_dropped_token_ratio,
    };

    info!(
        pages = pages.len(),
        mode = ?options.mode,
        bracket_size = ?options.bracket_size,
        "reconstructing"
    );

    let result = reconstruct(&pages, &options);

    let match_count = result.rounds.iter().map(Vec::len).sum::<usize>()
        + result.pools.values().map(Vec::len).sum::<usize>();
    info!(
        matches = match_count,
        diagnostics = result.diagnostics.len(),
        fatal = result.has_fatal(),
        "reconstruction finished"
    );

    match &cli.output {
        Some(path) => write_json_pretty(path, &result)?,
        None => {
            let rendered = serde_json::to_string_pretty(&result)
                .context("failed to serialize reconstruction result")?;
            println!("{rendered}");
        }
    }

    if let Some(manifest_path) = &cli.manifest {
        let manifest = RunManifest {
            manifest_version: 1,
            generated_at: now_utc_string(),
            tokens_path: cli.tokens_path.display().to_string(),
            mode: format!("{:?}", options.mode).to_ascii_lowercase(),
            page_count: pages.len(),
            match_count,
            diagnostic_counts: DiagnosticCounts {
                info: count_severity(&result, Severity::Info),
                warning: count_severity(&result, Severity::Warning),
                fatal: count_severity(&result, Severity::Fatal),
            },
        };
        write_json_pretty(manifest_path, &manifest)?;
    }

    Ok(())
}

fn count_severity(
    result: &bracketsheet::model::ReconstructionResult,
    severity: Severity,
) -> usize {
    result
        .diagnostics
        .iter()
        .filter(|diagnostic| diagnostic.severity == severity)
        .count()
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
