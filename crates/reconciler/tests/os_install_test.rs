//! OS-install reconciler against a simulated device.

#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]

mod common;

use common::FakeConnector;
use junos_core::{Error, FileProgressLog, MemoryProgressLog, ProgressLog};
use junos_reconciler::{InstallOsParams, InstallOutcome, ModuleOutput, VersionPair, install_os};
use semver::Version;
use tokio::time::{Duration, Instant};

const PACKAGE: &str = "/images/junos-srxsme-15.1-domestic.tgz";

fn params(package: &str) -> InstallOsParams {
    let mut params = InstallOsParams::new("srx1", package);
    params.reboot_pause = 0;
    params
}

fn versions(has: &str, should: &str) -> VersionPair {
    VersionPair {
        has: has.to_string(),
        should: should.to_string(),
    }
}

#[tokio::test]
async fn test_already_at_desired_version() {
    // GIVEN: A device already running 15.1
    let device = FakeConnector::running("15.1");
    let progress = MemoryProgressLog::new();

    // WHEN: Reconciling to 15.1
    let outcome = install_os(&device, &params(PACKAGE), &progress).await.unwrap();

    // THEN: Nothing changes and the session is released
    assert_eq!(
        outcome,
        InstallOutcome {
            changed: false,
            ver: versions("15.1", "15.1"),
            reboot: false,
            check_mode: false,
        }
    );
    assert_eq!(device.installs(), 0);
    assert_eq!(device.reboots(), 0);
    assert_eq!((device.opens(), device.closes()), (1, 1));
}

#[tokio::test]
async fn test_check_mode_predicts_change() {
    // GIVEN: A device on 12.1 and check mode
    let device = FakeConnector::running("12.1");
    let mut params = params(PACKAGE);
    params.check_mode = true;

    // WHEN: Reconciling
    let outcome = install_os(&device, &params, &MemoryProgressLog::new())
        .await
        .unwrap();

    // THEN: A change is predicted but nothing is installed
    assert!(outcome.changed);
    assert!(outcome.check_mode);
    assert_eq!(outcome.ver, versions("12.1", "15.1"));
    assert_eq!(device.installs(), 0);
    assert_eq!(device.running_version(), "12.1");
    assert_eq!(device.closes(), 1);
}

#[tokio::test]
async fn test_install_and_reboot() {
    // GIVEN: A device on 12.1
    let device = FakeConnector::running("12.1");
    let progress = MemoryProgressLog::new();

    // WHEN: Reconciling to the package version
    let outcome = install_os(&device, &params(PACKAGE), &progress).await.unwrap();

    // THEN: The package is installed once and a reboot issued
    assert!(outcome.changed);
    assert!(outcome.reboot);
    assert_eq!(device.installs(), 1);
    assert_eq!(device.reboots(), 1);
    assert_eq!(device.closes(), 1);

    let record = device.record();
    assert_eq!(record.installs[0].package.to_str(), Some(PACKAGE));
    assert!(!record.installs[0].no_copy);
    drop(record);

    // AND: Each step reached the progress log, including the device's own
    let entries = progress.entries();
    assert!(entries.contains(&"package staged".to_string()));
    assert!(entries.contains(&"install completed".to_string()));
    assert!(entries.contains(&"Shutdown NOW!".to_string()));
    assert!(entries.last().unwrap().starts_with("pausing 0s"));
}

#[tokio::test]
async fn test_second_run_is_a_no_op() {
    // GIVEN: A device that was just upgraded by a first run
    let device = FakeConnector::running("12.1");
    let first = install_os(&device, &params(PACKAGE), &MemoryProgressLog::new())
        .await
        .unwrap();
    assert!(first.changed);

    // WHEN: Running again with the same desired version
    let second = install_os(&device, &params(PACKAGE), &MemoryProgressLog::new())
        .await
        .unwrap();

    // THEN: Nothing changes
    assert!(!second.changed);
    assert_eq!(second.ver, versions("15.1", "15.1"));
    assert_eq!(device.installs(), 1);
    assert_eq!(device.closes(), 2);
}

#[tokio::test]
async fn test_no_reboot_when_not_requested() {
    let device = FakeConnector::running("12.1");
    let mut params = params(PACKAGE);
    params.reboot = false;
    params.no_copy = true;

    let outcome = install_os(&device, &params, &MemoryProgressLog::new())
        .await
        .unwrap();

    assert!(outcome.changed);
    assert!(!outcome.reboot);
    assert_eq!(device.reboots(), 0);
    assert!(device.record().installs[0].no_copy);
}

#[tokio::test]
async fn test_reboot_failure_is_not_reported() {
    // GIVEN: A device that drops the session when asked to reboot
    let device = FakeConnector::running("12.1").failing_reboots();

    // WHEN: Installing
    let outcome = install_os(&device, &params(PACKAGE), &MemoryProgressLog::new())
        .await
        .unwrap();

    // THEN: The reboot still counts as issued
    assert!(outcome.changed);
    assert!(outcome.reboot);
    assert_eq!(device.reboots(), 1);
    assert_eq!(device.closes(), 1);
}

#[tokio::test]
async fn test_rejected_install_fails_and_closes() {
    // GIVEN: A device that rejects the package
    let device = FakeConnector::running("12.1").rejecting_installs();
    let progress = MemoryProgressLog::new();

    // WHEN: Installing
    let err = install_os(&device, &params(PACKAGE), &progress)
        .await
        .err()
        .unwrap();

    // THEN: The invocation fails, no reboot, session closed
    assert!(matches!(err, Error::InstallFailed { .. }));
    assert!(err.to_string().contains("package is corrupt"));
    assert_eq!(device.reboots(), 0);
    assert_eq!(device.closes(), 1);

    let output = ModuleOutput::from_result::<InstallOutcome>(Err(err));
    let json: serde_json::Value = serde_json::from_str(&output.to_json().unwrap()).unwrap();
    assert_eq!(json["failed"], true);
    assert_eq!(json["changed"], false);
    assert_eq!(json["error_kind"], "install_failure");
}

#[tokio::test]
async fn test_facts_failure_closes_session() {
    let device = FakeConnector::running("12.1").failing_facts();

    let err = install_os(&device, &params(PACKAGE), &MemoryProgressLog::new())
        .await
        .err()
        .unwrap();

    assert!(matches!(err, Error::Rpc { .. }));
    assert_eq!((device.opens(), device.closes()), (1, 1));
}

#[tokio::test]
async fn test_connection_failure() {
    // GIVEN: An unreachable device
    let device = FakeConnector::running("12.1").refusing_connections();

    // WHEN: Reconciling
    let err = install_os(&device, &params(PACKAGE), &MemoryProgressLog::new())
        .await
        .err()
        .unwrap();

    // THEN: A connection error, and nothing to close
    assert!(matches!(err, Error::ConnectionFailed { .. }));
    assert_eq!((device.opens(), device.closes()), (0, 0));
}

#[tokio::test]
async fn test_unparseable_package_never_contacts_device() {
    let device = FakeConnector::running("12.1");

    let err = install_os(
        &device,
        &params("/images/junos-srxsme-15.1.tgz"),
        &MemoryProgressLog::new(),
    )
    .await
    .err()
    .unwrap();

    assert!(matches!(err, Error::PackageName { .. }));
    assert!(device.record().targets.is_empty());
}

#[tokio::test]
async fn test_explicit_version_overrides_package_name() {
    let device = FakeConnector::running("15.1X49-D100.6");
    let mut params = params("/images/custom.tgz");
    params.version = Some("15.1X49-D100.6".to_string());

    let outcome = install_os(&device, &params, &MemoryProgressLog::new())
        .await
        .unwrap();

    assert!(!outcome.changed);
}

#[tokio::test]
async fn test_outdated_library() {
    let device = FakeConnector::running("12.1").with_library(Version::new(1, 2, 1));

    let err = install_os(&device, &params(PACKAGE), &MemoryProgressLog::new())
        .await
        .err()
        .unwrap();

    assert!(matches!(err, Error::LibraryTooOld { .. }));
    assert!(err.to_string().contains("1.2.2"));
    assert_eq!(device.opens(), 0);
}

#[tokio::test]
async fn test_progress_written_to_file() {
    // GIVEN: A file-backed progress log
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("srx1.log");
    let log = FileProgressLog::open(&path, "srx1").unwrap();
    let device = FakeConnector::running("15.1");

    // WHEN: Reconciling
    install_os(&device, &params(PACKAGE), &log as &dyn ProgressLog)
        .await
        .unwrap();
    drop(log);

    // THEN: Each line carries the host
    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.lines().count() >= 3);
    assert!(content.lines().all(|line| line.contains(" - srx1 - ")));
    assert!(content.contains("already running the desired version"));
}

fn pausing(progress: &MemoryProgressLog) -> bool {
    progress.entries().iter().any(|entry| entry.starts_with("pausing"))
}

/// # GIVEN
/// A device on 12.1 and a ten second reboot pause
///
/// # WHEN
/// The package is installed
///
/// # THEN
/// The reconciler waits out the pause before returning
#[tokio::test(start_paused = true)]
async fn test_pause_follows_real_change() {
    let device = FakeConnector::running("12.1");
    let mut params = params(PACKAGE);
    params.reboot_pause = 10;
    let progress = MemoryProgressLog::new();

    let started = Instant::now();
    let outcome = install_os(&device, &params, &progress).await.unwrap();

    assert!(outcome.changed);
    assert!(started.elapsed() >= Duration::from_secs(10));
    assert!(pausing(&progress));
}

#[tokio::test(start_paused = true)]
async fn test_no_pause_when_unchanged() {
    let device = FakeConnector::running("15.1");
    let mut params = params(PACKAGE);
    params.reboot_pause = 10;
    let progress = MemoryProgressLog::new();

    let started = Instant::now();
    let outcome = install_os(&device, &params, &progress).await.unwrap();

    assert!(!outcome.changed);
    assert_eq!(started.elapsed(), Duration::ZERO);
    assert!(!pausing(&progress));
}

/// # GIVEN
/// A device on 12.1, check mode, and a ten second reboot pause
///
/// # WHEN
/// Reconciling
///
/// # THEN
/// A change is predicted but no time passes
#[tokio::test(start_paused = true)]
async fn test_no_pause_in_check_mode() {
    let device = FakeConnector::running("12.1");
    let mut params = params(PACKAGE);
    params.reboot_pause = 10;
    params.check_mode = true;
    let progress = MemoryProgressLog::new();

    let started = Instant::now();
    let outcome = install_os(&device, &params, &progress).await.unwrap();

    assert!(outcome.changed);
    assert_eq!(started.elapsed(), Duration::ZERO);
    assert!(!pausing(&progress));
    assert_eq!(device.installs(), 0);
}
