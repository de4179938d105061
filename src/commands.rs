//! CLI command handlers.
//!
//! Each handler resolves parameters, runs one reconciler against one device
//! and prints exactly one JSON document on stdout.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use junos_core::open_progress_log;
use junos_device::{CommandConsoleTool, NetconfConnector, ToolingConfig};
use junos_reconciler::{ClusterParams, InstallOsParams, ModuleOutput, install_os, reconcile_cluster};
use tracing::{debug, info};

use crate::args::{env_lookup, resolve};
use crate::cli::{ClusterArgs, Commands, InstallOsArgs};

/// Exit status when the reconciler reported a failure.
pub const EXIT_FAILED: u8 = 1;

/// Execute a CLI command.
///
/// # Errors
///
/// Fails on configuration problems; reconciliation failures are printed as
/// a failure document instead.
pub async fn execute_command(command: Commands, tooling_config: Option<&Path>) -> Result<ExitCode> {
    let tooling = load_tooling(tooling_config)?;
    debug!(?tooling, "Tooling configuration loaded");

    let output = match command {
        Commands::InstallOs(args) => cmd_install_os(&args, tooling).await?,
        Commands::Cluster(args) => cmd_cluster(&args, tooling).await?,
    };

    emit(&output)
}

/// Tooling from the optional TOML file, with `JUNOS_*` overrides on top.
///
/// # Errors
///
/// Fails when the file cannot be read or parsed.
pub fn load_tooling(path: Option<&Path>) -> Result<ToolingConfig> {
    let base = match path {
        Some(path) => ToolingConfig::from_file(path)
            .with_context(|| format!("Failed to load tooling config {}", path.display()))?,
        None => ToolingConfig::default(),
    };
    Ok(base.with_env())
}

async fn cmd_install_os(args: &InstallOsArgs, tooling: ToolingConfig) -> Result<ModuleOutput> {
    let params: InstallOsParams = resolve(args.args_file.as_deref(), args.overrides(), env_lookup)?;
    info!(host = %params.device.host, package = %params.package.display(), "Running install-os");

    let result = match open_progress_log(params.logfile.as_deref(), &params.device.host) {
        Ok(progress) => {
            let connector = NetconfConnector::new(tooling);
            install_os(&connector, &params, progress.as_ref()).await
        }
        Err(e) => Err(e),
    };

    Ok(ModuleOutput::from_result(result))
}

async fn cmd_cluster(args: &ClusterArgs, tooling: ToolingConfig) -> Result<ModuleOutput> {
    let params: ClusterParams = resolve(args.args_file.as_deref(), args.overrides(), env_lookup)?;
    info!(host = %params.device.host, cluster_enable = params.cluster_enable, "Running cluster");

    let result = match open_progress_log(params.logfile.as_deref(), &params.device.host) {
        Ok(progress) => {
            let tool = CommandConsoleTool::from_config(&tooling);
            let connector = NetconfConnector::new(tooling);
            reconcile_cluster(&connector, &tool, &params, progress.as_ref()).await
        }
        Err(e) => Err(e),
    };

    Ok(ModuleOutput::from_result(result))
}

fn emit(output: &ModuleOutput) -> Result<ExitCode> {
    let json = output.to_json().context("Failed to serialize result")?;
    println!("{json}");

    if output.is_failure() {
        Ok(ExitCode::from(EXIT_FAILED))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
