//! Cluster-state reconciler.
//!
//! The path is chosen once, from whether a console spec was supplied:
//!
//! - [`SessionPath`]: open a device session and issue the cluster RPC
//! - [`ConsolePath`]: hand the whole job to the console-provisioning tool
//!
//! Both implement [`ApplyClusterState`]. Neither checks the current state
//! first; every run changes state and reboots the device.

use async_trait::async_trait;
use junos_core::{ProgressLog, Requirement, Result, ResultExt};
use junos_device::{ConsoleTool, DeviceConnector, DeviceSession, Rpc, TransportMode};
use semver::Version;
use tracing::{debug, info};

use crate::outcome::{ClusterOutcome, PathKind};
use crate::params::{ClusterParams, ClusterState};

/// How a cluster state will be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterPath {
    Session { mode: TransportMode },
    Console { spec: String },
}

impl ClusterPath {
    /// The console path exactly when a console spec is present.
    #[must_use]
    pub fn select(params: &ClusterParams) -> Self {
        match params.console_spec() {
            Some(spec) => Self::Console {
                spec: spec.to_string(),
            },
            None => Self::Session { mode: params.mode },
        }
    }

    #[must_use]
    pub const fn kind(&self) -> PathKind {
        match self {
            Self::Session { .. } => PathKind::Session,
            Self::Console { .. } => PathKind::Console,
        }
    }
}

/// Applies a validated [`ClusterState`] to a device.
#[async_trait]
pub trait ApplyClusterState: Send + Sync {
    fn kind(&self) -> PathKind;

    /// Apply `state` to the device described by `params`.
    async fn apply(
        &self,
        params: &ClusterParams,
        state: &ClusterState,
        progress: &dyn ProgressLog,
    ) -> Result<()>;
}

/// Cluster RPCs over a device session.
pub struct SessionPath<'a> {
    connector: &'a dyn DeviceConnector,
    mode: TransportMode,
}

impl<'a> SessionPath<'a> {
    pub fn new(connector: &'a dyn DeviceConnector, mode: TransportMode) -> Self {
        Self { connector, mode }
    }
}

#[async_trait]
impl ApplyClusterState for SessionPath<'_> {
    fn kind(&self) -> PathKind {
        PathKind::Session
    }

    async fn apply(
        &self,
        params: &ClusterParams,
        state: &ClusterState,
        progress: &dyn ProgressLog,
    ) -> Result<()> {
        let library = self.connector.library_version();
        Requirement::session().check(&library)?;
        if self.mode.is_console() {
            Requirement::alternate_transport().check(&library)?;
        }

        let target = params.device.target(self.mode);
        progress.record(&format!("connecting to {} (mode {})", target.host, self.mode));
        let mut session = self.connector.open(&target).await?;

        let result = issue(session.as_mut(), state, &library, progress).await;

        session
            .close()
            .await
            .warn_and_discard("Failed to close session after cluster change");
        result
    }
}

async fn issue(
    session: &mut dyn DeviceSession,
    state: &ClusterState,
    library: &Version,
    progress: &dyn ProgressLog,
) -> Result<()> {
    let rpc = match state {
        ClusterState::Enabled { cluster_id, node } => {
            progress.record(&format!("enabling cluster {cluster_id} as node {node}"));
            Rpc::ChassisClusterEnable {
                cluster_id: cluster_id.clone(),
                node: node.clone(),
                reboot: true,
            }
        }
        ClusterState::Disabled => {
            progress.record("disabling cluster");
            Rpc::ChassisClusterDisable { reboot: true }
        }
    };

    let reply = session.rpc(&rpc).await?;

    // Older libraries hand back the reply unparsed.
    let message = if Requirement::rpc_output_parsing().check(library).is_ok() {
        reply.message()
    } else {
        reply.as_xml().to_string()
    };
    debug!(rpc = rpc.name(), "Cluster RPC accepted");
    progress.record(&message);
    Ok(())
}

/// Console-tool provisioning.
pub struct ConsolePath<'a> {
    tool: &'a dyn ConsoleTool,
    spec: String,
}

impl<'a> ConsolePath<'a> {
    pub fn new(tool: &'a dyn ConsoleTool, spec: impl Into<String>) -> Self {
        Self {
            tool,
            spec: spec.into(),
        }
    }
}

#[async_trait]
impl ApplyClusterState for ConsolePath<'_> {
    fn kind(&self) -> PathKind {
        PathKind::Console
    }

    async fn apply(
        &self,
        params: &ClusterParams,
        state: &ClusterState,
        progress: &dyn ProgressLog,
    ) -> Result<()> {
        let version = self.tool.version().await?;
        Requirement::console_tool().check(&version)?;

        let args = console_args(&self.spec, params, state);
        progress.record(&format!("running console tool for {}", params.device.host));
        self.tool.run(&args, progress).await
    }
}

/// Flat argument list for the console tool.
///
/// The console spec's own tokens come first, then the cluster flag, the optional
/// credentials, and the host last.
#[must_use]
pub fn console_args(spec: &str, params: &ClusterParams, state: &ClusterState) -> Vec<String> {
    let mut args: Vec<String> = spec.split_whitespace().map(str::to_string).collect();

    args.push(match state {
        ClusterState::Enabled { cluster_id, node } => format!("--srx_cluster={cluster_id}:{node}"),
        ClusterState::Disabled => "--srx_cluster_disable".to_string(),
    });

    if let Some(user) = params.device.user.as_deref().filter(|u| !u.is_empty()) {
        args.push(format!("--user={user}"));
    }
    if let Some(passwd) = params.device.passwd.as_deref().filter(|p| !p.is_empty()) {
        args.push(format!("--passwd={passwd}"));
    }

    args.push(params.device.host.trim().to_string());
    args
}

/// Bring the device to the requested cluster state.
///
/// The state is validated before either collaborator is touched.
///
/// # Errors
///
/// Returns [`junos_core::Error::Validation`] for an incomplete enable
/// request, [`junos_core::Error::LibraryTooOld`] when the chosen path's
/// collaborator is outdated, and whatever the device or tool reported
/// otherwise.
pub async fn reconcile_cluster(
    connector: &dyn DeviceConnector,
    tool: &dyn ConsoleTool,
    params: &ClusterParams,
    progress: &dyn ProgressLog,
) -> Result<ClusterOutcome> {
    params.device.validate()?;
    let state = ClusterState::from_params(params)
        .inspect_error(|e| progress.record(&format!("invalid parameters: {e}")))?;

    let path = ClusterPath::select(params);
    info!(host = %params.device.host, path = %path.kind(), ?state, "Starting cluster reconciliation");

    let applier: Box<dyn ApplyClusterState + '_> = match &path {
        ClusterPath::Session { mode } => Box::new(SessionPath::new(connector, *mode)),
        ClusterPath::Console { spec } => Box::new(ConsolePath::new(tool, spec.clone())),
    };

    applier
        .apply(params, &state, progress)
        .await
        .inspect_error(|e| progress.record(&format!("failed: {e}")))?;

    progress.record("cluster change issued; device is rebooting");
    info!(host = %params.device.host, path = %applier.kind(), "Cluster reconciliation complete");
    Ok(ClusterOutcome::applied(applier.kind()))
}
