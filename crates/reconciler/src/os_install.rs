//! OS-install reconciler.

use std::time::Duration;

use junos_core::{Error, ProgressLog, Requirement, Result, ResultExt};
use junos_device::{DeviceConnector, DeviceSession, InstallRequest, TransportMode};
use tracing::{debug, info, warn};

use crate::outcome::InstallOutcome;
use crate::params::InstallOsParams;

/// Bring the device to the desired software version.
///
/// 1. Resolve the desired version (before any device contact)
/// 2. Open a session and read the running version
/// 3. Equal versions: no change. Check mode: predict the change
/// 4. Otherwise install, then reboot when requested
/// 5. Close the session; after a real change, pause for `reboot_pause`
///
/// # Errors
///
/// Returns [`Error::PackageName`] when the version cannot be inferred,
/// [`Error::LibraryTooOld`] for an outdated session library,
/// [`Error::ConnectionFailed`] when the device cannot be reached and
/// [`Error::InstallFailed`] when the device rejects the package.
pub async fn install_os(
    connector: &dyn DeviceConnector,
    params: &InstallOsParams,
    progress: &dyn ProgressLog,
) -> Result<InstallOutcome> {
    params.device.validate()?;
    Requirement::session().check(&connector.library_version())?;
    let should = params.desired_version()?;

    let target = params.device.target(TransportMode::Ssh);
    info!(host = %target.host, should = %should, check_mode = params.check_mode, "Starting OS install reconciliation");
    progress.record(&format!("connecting to {}", target.host));

    let mut session = connector.open(&target).await.inspect_error(|e| {
        progress.record(&format!("unable to connect: {e}"));
    })?;

    let outcome = converge(session.as_mut(), params, should, progress).await;

    session
        .close()
        .await
        .warn_and_discard("Failed to close session after OS install");

    let outcome = outcome.inspect_error(|e| progress.record(&format!("failed: {e}")))?;

    if outcome.changed && !outcome.check_mode {
        progress.record(&format!(
            "pausing {}s for the device to begin rebooting",
            params.reboot_pause
        ));
        tokio::time::sleep(Duration::from_secs(params.reboot_pause)).await;
    }

    info!(
        host = %target.host,
        changed = outcome.changed,
        reboot = outcome.reboot,
        "OS install reconciliation complete"
    );
    Ok(outcome)
}

async fn converge(
    session: &mut dyn DeviceSession,
    params: &InstallOsParams,
    should: String,
    progress: &dyn ProgressLog,
) -> Result<InstallOutcome> {
    let facts = session.facts().await?;
    let has = facts.version.trim().to_string();
    progress.record(&format!("device runs {has}, desired {should}"));

    if has == should {
        progress.record("already running the desired version");
        return Ok(InstallOutcome::unchanged(has, should, params.check_mode));
    }

    if params.check_mode {
        progress.record("check mode: install skipped");
        return Ok(InstallOutcome::predicted(has, should));
    }

    progress.record(&format!("installing {}", params.package.display()));
    let request = InstallRequest::new(&params.package).no_copy(params.no_copy);
    let report = session.install(&request, progress).await?;

    if !report.succeeded {
        return Err(Error::install_failed(&params.package, report.message));
    }
    progress.record("install completed");

    let reboot = params.reboot;
    if reboot {
        progress.record("rebooting");
        // The session dies with the reboot; failures here are expected.
        match session.reboot().await {
            Ok(status) => {
                debug!(status = %status, "Reboot requested");
                progress.record(&status);
            }
            Err(e) => {
                warn!(error = %e, "Reboot request did not complete cleanly");
                progress.record(&format!("reboot request returned: {e}"));
            }
        }
    } else {
        progress.record("reboot not requested");
    }

    Ok(InstallOutcome::installed(has, should, reboot))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use async_trait::async_trait;
    use junos_core::MemoryProgressLog;
    use junos_device::{ConnectionTarget, DeviceFacts, InstallReport, Rpc, RpcReply};
    use semver::Version;

    use super::*;

    /// Connector whose library predates sessions entirely.
    struct AncientConnector;

    #[async_trait]
    impl DeviceConnector for AncientConnector {
        fn library_version(&self) -> Version {
            Version::new(1, 1, 0)
        }

        async fn open(&self, _target: &ConnectionTarget) -> Result<Box<dyn DeviceSession>> {
            Ok(Box::new(NullSession))
        }
    }

    struct NullSession;

    #[async_trait]
    impl DeviceSession for NullSession {
        async fn facts(&mut self) -> Result<DeviceFacts> {
            Err(Error::transport("unreachable"))
        }
        async fn install(
            &mut self,
            _request: &InstallRequest,
            _progress: &dyn ProgressLog,
        ) -> Result<InstallReport> {
            Err(Error::transport("unreachable"))
        }
        async fn reboot(&mut self) -> Result<String> {
            Err(Error::transport("unreachable"))
        }
        async fn rpc(&mut self, _rpc: &Rpc) -> Result<RpcReply> {
            Err(Error::transport("unreachable"))
        }
        async fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_old_library_fails_before_connecting() {
        let params = InstallOsParams::new("srx1", "junos-srxsme-15.1-domestic.tgz");
        let err = install_os(&AncientConnector, &params, &MemoryProgressLog::new())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::LibraryTooOld { .. }));
    }

    #[tokio::test]
    async fn test_bad_package_name_fails_before_connecting() {
        let params = InstallOsParams::new("srx1", "junos.tgz");
        let progress = MemoryProgressLog::new();
        let connector = junos_device::NetconfConnector::new(junos_device::ToolingConfig::default());

        let err = install_os(&connector, &params, &progress).await.err().unwrap();
        assert!(matches!(err, Error::PackageName { .. }));
        assert!(progress.entries().is_empty());
    }
}
