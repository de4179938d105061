//! # junos-lifecycle
//!
//! Runs one reconciler against one device and prints one JSON result.
//!
//! ## Streams
//!
//! - stdout: the result document only
//! - stderr: diagnostics, filtered by `--log-level` or `RUST_LOG` (default `warn`)
//!
//! ## Exit codes
//!
//! - `0`: the reconciler succeeded (changed or not)
//! - `1`: the reconciler reported a failure document
//! - `2`: usage or configuration error; no document is printed

#![forbid(unsafe_code)]
#![forbid(clippy::unwrap_used)]
#![forbid(clippy::panic)]
#![deny(clippy::expect_used)]

use std::process::ExitCode;

use clap::Parser;
use tracing::error;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use junos_lifecycle::cli::Cli;
use junos_lifecycle::commands::execute_command;

const EXIT_USAGE: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    match execute_command(cli.command, cli.tooling_config.as_deref()).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "Invocation aborted");
            eprintln!("error: {e:#}");
            ExitCode::from(EXIT_USAGE)
        }
    }
}

/// Diagnostics go to stderr; stdout carries only the result.
fn init_tracing(level: Option<&str>) {
    let filter = level
        .and_then(|level| EnvFilter::try_new(level).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
