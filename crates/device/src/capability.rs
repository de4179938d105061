//! Capability traits the reconcilers are written against.
//!
//! Keeping the device library and the console tool behind these seams lets
//! the reconciliation logic run against in-memory fakes.

use async_trait::async_trait;
use junos_core::{ProgressLog, Result};
use semver::Version;

use crate::rpc::{Rpc, RpcReply};
use crate::types::{ConnectionTarget, DeviceFacts, InstallReport, InstallRequest};

/// Opens sessions to devices.
#[async_trait]
pub trait DeviceConnector: Send + Sync {
    /// Version of the session library backing this connector.
    fn library_version(&self) -> Version;

    /// Open a session to `target`.
    ///
    /// # Errors
    ///
    /// Returns [`junos_core::Error::ConnectionFailed`] when the device cannot be reached
    /// or refuses the session.
    async fn open(&self, target: &ConnectionTarget) -> Result<Box<dyn DeviceSession>>;
}

/// An open session to exactly one device.
///
/// Owned by a single invocation. [`DeviceSession::close`] must be called
/// exactly once on every exit path once the session is open.
#[async_trait]
pub trait DeviceSession: Send {
    /// Query the device facts, including the running software version.
    async fn facts(&mut self) -> Result<DeviceFacts>;

    /// Transfer (unless `no_copy`) and install a software package.
    ///
    /// A device that rejects the package yields `Ok` with
    /// [`InstallReport::succeeded`] false; `Err` is reserved for transport
    /// and protocol failures.
    async fn install(
        &mut self,
        request: &InstallRequest,
        progress: &dyn ProgressLog,
    ) -> Result<InstallReport>;

    /// Ask the device to reboot. Returns the device's status text.
    ///
    /// The reboot tears the session down, so success here only means the
    /// request was issued.
    async fn reboot(&mut self) -> Result<String>;

    /// Execute an arbitrary RPC.
    async fn rpc(&mut self, rpc: &Rpc) -> Result<RpcReply>;

    /// Close the session.
    async fn close(&mut self) -> Result<()>;
}

/// The external console-provisioning tool.
#[async_trait]
pub trait ConsoleTool: Send + Sync {
    /// Version of the installed tool.
    async fn version(&self) -> Result<Version>;

    /// Run the tool with a flat argument list, forwarding its notifications
    /// to `notify`.
    async fn run(&self, args: &[String], notify: &dyn ProgressLog) -> Result<()>;
}
