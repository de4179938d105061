//! Single-device reconciliation for Junos lifecycle operations.
//!
//! Each reconciler follows the same shape:
//!
//! - **Connect**: open a session (or hand off to the console tool)
//! - **Compare**: current vs. desired state
//! - **Act**: at most once, logging each step to the invocation's [`ProgressLog`]
//! - **Report**: a structured outcome, or an error rendered as a failure
//!
//! # Reconcilers
//!
//! - [`install_os`] - ensure the device runs a desired software version
//! - [`reconcile_cluster`] - enable or disable SRX chassis clustering
//!
//! Sessions are always closed before a reconciler returns, whatever the
//! outcome. Collaborators are injected through the [`junos_device`]
//! capability traits, so the procedures run unchanged against fakes.
//!
//! # Example
//!
//! ```ignore
//! use junos_core::NoopProgressLog;
//! use junos_device::{NetconfConnector, ToolingConfig};
//! use junos_reconciler::{InstallOsParams, ModuleOutput, install_os};
//!
//! #[tokio::main]
//! async fn main() {
//!     let connector = NetconfConnector::new(ToolingConfig::from_env());
//!     let params = InstallOsParams::new("srx1", "/images/junos-srxsme-15.1X49-D100.6-domestic.tgz");
//!
//!     let result = install_os(&connector, &params, &NoopProgressLog).await;
//!     println!("{}", ModuleOutput::from_result(result).to_json().unwrap_or_default());
//! }
//! ```
//!
//! [`ProgressLog`]: junos_core::ProgressLog

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod cluster;
pub mod os_install;
pub mod outcome;
pub mod params;

pub use cluster::{
    ApplyClusterState, ClusterPath, ConsolePath, SessionPath, console_args, reconcile_cluster,
};
pub use os_install::install_os;
pub use outcome::{ClusterOutcome, FailureReport, InstallOutcome, ModuleOutput, PathKind, VersionPair};
pub use params::{
    ClusterParams, ClusterState, DEFAULT_REBOOT_PAUSE_SECS, DeviceParams, InstallOsParams,
    infer_version,
};
