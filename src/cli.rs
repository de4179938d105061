//! CLI command definitions using clap.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use serde_json::{Map, Value, json};

/// Reconcile Junos devices to a desired state.
#[derive(Parser, Debug)]
#[command(name = "junos-lifecycle")]
#[command(version)]
#[command(about = "Reconcile a Junos device's OS version or SRX chassis-cluster state")]
#[command(
    long_about = "Each invocation targets one device and prints one JSON result on stdout. \
                  Parameters come from an args file (JSON, YAML or TOML) and/or flags; flags win."
)]
pub struct Cli {
    /// Diagnostic log filter for stderr (overrides RUST_LOG)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// TOML file configuring the console tool, SSH host keys and identities, and timeouts
    #[arg(long, global = true, env = "JUNOS_TOOLING_CONFIG")]
    pub tooling_config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ensure the device runs a desired software version
    InstallOs(InstallOsArgs),

    /// Enable or disable SRX chassis clustering
    Cluster(ClusterArgs),
}

/// Device identity flags shared by both commands.
#[derive(Args, Debug, Clone, Default)]
pub struct DeviceArgs {
    /// Device host name or address (tty path for serial mode)
    #[arg(long)]
    pub host: Option<String>,

    /// Login user (default: JUNOS_USER, then the current OS user)
    #[arg(long)]
    pub user: Option<String>,

    /// Login password (default: JUNOS_PASSWD, else key-based auth)
    #[arg(long)]
    pub passwd: Option<String>,

    /// Device port (default 830; 23 for telnet)
    #[arg(long)]
    pub port: Option<u16>,
}

impl DeviceArgs {
    fn overrides(&self) -> Map<String, Value> {
        object(json!({
            "host": self.host,
            "user": self.user,
            "passwd": self.passwd,
            "port": self.port,
        }))
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct InstallOsArgs {
    /// Parameters file (.json, .yaml/.yml or .toml)
    #[arg(long)]
    pub args_file: Option<PathBuf>,

    #[command(flatten)]
    pub device: DeviceArgs,

    /// Local path of the software package
    #[arg(long)]
    pub package: Option<PathBuf>,

    /// Desired version (default: inferred from the package file name)
    #[arg(long = "os-version")]
    pub os_version: Option<String>,

    /// The package is already staged in /var/tmp on the device
    #[arg(long)]
    pub no_copy: bool,

    /// Reboot after installing [default: true]
    #[arg(long)]
    pub reboot: Option<bool>,

    /// Seconds to wait after a change [default: 10]
    #[arg(long)]
    pub reboot_pause: Option<u64>,

    /// Append progress to this file
    #[arg(long)]
    pub logfile: Option<PathBuf>,

    /// Report what would change without installing
    #[arg(long)]
    pub check: bool,
}

impl InstallOsArgs {
    /// Parameter values given on the command line.
    #[must_use]
    pub fn overrides(&self) -> Map<String, Value> {
        let mut map = self.device.overrides();
        map.extend(object(json!({
            "package": self.package,
            "version": self.os_version,
            "no_copy": self.no_copy.then_some(true),
            "reboot": self.reboot,
            "reboot_pause": self.reboot_pause,
            "logfile": self.logfile,
            "check_mode": self.check.then_some(true),
        })));
        map
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct ClusterArgs {
    /// Parameters file (.json, .yaml/.yml or .toml)
    #[arg(long)]
    pub args_file: Option<PathBuf>,

    #[command(flatten)]
    pub device: DeviceArgs,

    /// Session transport: none (ssh), telnet or serial
    #[arg(long)]
    pub mode: Option<String>,

    /// Console-tool target spec; selects console provisioning
    #[arg(long)]
    pub console: Option<String>,

    /// true to enable clustering, false to disable it
    #[arg(long)]
    pub cluster_enable: Option<bool>,

    /// Cluster id (required when enabling)
    #[arg(long)]
    pub cluster_id: Option<String>,

    /// Node index (required when enabling)
    #[arg(long)]
    pub node: Option<String>,

    /// Append progress to this file
    #[arg(long)]
    pub logfile: Option<PathBuf>,
}

impl ClusterArgs {
    /// Parameter values given on the command line.
    #[must_use]
    pub fn overrides(&self) -> Map<String, Value> {
        let mut map = self.device.overrides();
        map.extend(object(json!({
            "mode": self.mode,
            "console": self.console,
            "cluster_enable": self.cluster_enable,
            "cluster_id": self.cluster_id,
            "node": self.node,
            "logfile": self.logfile,
        })));
        map
    }
}

/// Keep only the keys that carry a value.
fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map.into_iter().filter(|(_, v)| !v.is_null()).collect(),
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::panic)]
    #![allow(clippy::indexing_slicing)]

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_install_overrides_skip_unset_flags() {
        let cli = Cli::try_parse_from([
            "junos-lifecycle",
            "install-os",
            "--host",
            "srx1",
            "--package",
            "/images/junos-srxsme-15.1-domestic.tgz",
            "--check",
        ])
        .unwrap();

        let Commands::InstallOs(args) = cli.command else {
            panic!("expected install-os");
        };
        let overrides = args.overrides();
        assert_eq!(overrides["host"], "srx1");
        assert_eq!(overrides["check_mode"], true);
        assert!(!overrides.contains_key("no_copy"));
        assert!(!overrides.contains_key("reboot"));
        assert!(!overrides.contains_key("user"));
    }

    #[test]
    fn test_cluster_enable_takes_a_value() {
        let cli = Cli::try_parse_from([
            "junos-lifecycle",
            "cluster",
            "--host",
            "srx1",
            "--cluster-enable",
            "false",
            "--log-level",
            "debug",
        ])
        .unwrap();

        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        let Commands::Cluster(args) = cli.command else {
            panic!("expected cluster");
        };
        assert_eq!(args.overrides()["cluster_enable"], false);
    }
}
