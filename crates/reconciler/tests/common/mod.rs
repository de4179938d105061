//! In-memory collaborators that record every interaction.

#![allow(dead_code)]
#![allow(clippy::unwrap_used)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use junos_core::{Error, ProgressLog, Result};
use junos_device::{
    ConnectionTarget, ConsoleTool, DeviceConnector, DeviceFacts, DeviceSession, InstallReport,
    InstallRequest, Rpc, RpcReply,
};
use junos_reconciler::infer_version;
use semver::Version;

/// What the fake device has seen.
#[derive(Debug, Default)]
pub struct DeviceRecord {
    pub running_version: String,
    pub opens: usize,
    pub closes: usize,
    pub installs: Vec<InstallRequest>,
    pub reboots: usize,
    pub rpcs: Vec<Rpc>,
    pub targets: Vec<ConnectionTarget>,
}

#[derive(Debug, Clone, Default)]
struct Behaviour {
    refuse_connection: bool,
    reject_install: bool,
    fail_reboot: bool,
    fail_facts: bool,
    rpc_error: Option<String>,
    rpc_reply: Option<String>,
}

/// Connector to a single simulated device.
#[derive(Clone)]
pub struct FakeConnector {
    library: Version,
    behaviour: Behaviour,
    record: Arc<Mutex<DeviceRecord>>,
}

impl FakeConnector {
    /// A reachable device running `version`.
    pub fn running(version: &str) -> Self {
        Self {
            library: Version::new(2, 1, 0),
            behaviour: Behaviour::default(),
            record: Arc::new(Mutex::new(DeviceRecord {
                running_version: version.to_string(),
                ..DeviceRecord::default()
            })),
        }
    }

    pub fn with_library(mut self, version: Version) -> Self {
        self.library = version;
        self
    }

    pub fn refusing_connections(mut self) -> Self {
        self.behaviour.refuse_connection = true;
        self
    }

    pub fn rejecting_installs(mut self) -> Self {
        self.behaviour.reject_install = true;
        self
    }

    pub fn failing_reboots(mut self) -> Self {
        self.behaviour.fail_reboot = true;
        self
    }

    pub fn failing_facts(mut self) -> Self {
        self.behaviour.fail_facts = true;
        self
    }

    pub fn failing_rpcs(mut self, message: &str) -> Self {
        self.behaviour.rpc_error = Some(message.to_string());
        self
    }

    pub fn replying(mut self, xml: &str) -> Self {
        self.behaviour.rpc_reply = Some(xml.to_string());
        self
    }

    pub fn record(&self) -> std::sync::MutexGuard<'_, DeviceRecord> {
        self.record.lock().unwrap()
    }

    pub fn opens(&self) -> usize {
        self.record().opens
    }

    pub fn closes(&self) -> usize {
        self.record().closes
    }

    pub fn installs(&self) -> usize {
        self.record().installs.len()
    }

    pub fn reboots(&self) -> usize {
        self.record().reboots
    }

    pub fn rpcs(&self) -> Vec<Rpc> {
        self.record().rpcs.clone()
    }

    pub fn running_version(&self) -> String {
        self.record().running_version.clone()
    }
}

#[async_trait]
impl DeviceConnector for FakeConnector {
    fn library_version(&self) -> Version {
        self.library.clone()
    }

    async fn open(&self, target: &ConnectionTarget) -> Result<Box<dyn DeviceSession>> {
        self.record().targets.push(target.clone());
        if self.behaviour.refuse_connection {
            return Err(Error::connection_failed(&target.host, "connection refused"));
        }
        self.record().opens += 1;
        Ok(Box::new(FakeSession {
            behaviour: self.behaviour.clone(),
            record: Arc::clone(&self.record),
            closed: false,
        }))
    }
}

struct FakeSession {
    behaviour: Behaviour,
    record: Arc<Mutex<DeviceRecord>>,
    closed: bool,
}

impl FakeSession {
    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(Error::transport("session is closed"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DeviceSession for FakeSession {
    async fn facts(&mut self) -> Result<DeviceFacts> {
        self.ensure_open()?;
        if self.behaviour.fail_facts {
            return Err(Error::rpc("get-software-information", "permission denied"));
        }
        Ok(DeviceFacts {
            hostname: Some("fake".to_string()),
            model: Some("srx240h2".to_string()),
            version: self.record.lock().unwrap().running_version.clone(),
        })
    }

    async fn install(
        &mut self,
        request: &InstallRequest,
        progress: &dyn ProgressLog,
    ) -> Result<InstallReport> {
        self.ensure_open()?;
        let mut record = self.record.lock().unwrap();
        record.installs.push(request.clone());
        progress.record("package staged");

        if self.behaviour.reject_install {
            return Ok(InstallReport::failure("ERROR: package is corrupt"));
        }
        if let Ok(version) = infer_version(request.local_path()) {
            record.running_version = version;
        }
        Ok(InstallReport::success("Reboot required"))
    }

    async fn reboot(&mut self) -> Result<String> {
        self.ensure_open()?;
        self.record.lock().unwrap().reboots += 1;
        if self.behaviour.fail_reboot {
            Err(Error::transport("connection closed by peer"))
        } else {
            Ok("Shutdown NOW!".to_string())
        }
    }

    async fn rpc(&mut self, rpc: &Rpc) -> Result<RpcReply> {
        self.ensure_open()?;
        self.record.lock().unwrap().rpcs.push(rpc.clone());
        match &self.behaviour.rpc_error {
            Some(message) => Err(Error::rpc(rpc.name(), message.clone())),
            None => Ok(RpcReply::new(self.behaviour.rpc_reply.clone().unwrap_or_else(|| {
                "<rpc-reply><output>Successfully enabled chassis cluster. Going to reboot now.</output></rpc-reply>"
                    .to_string()
            }))),
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.record.lock().unwrap().closes += 1;
        Ok(())
    }
}

/// Console tool that records its invocations.
pub struct FakeConsoleTool {
    version: Version,
    failure: Option<String>,
    notifications: Vec<String>,
    runs: Mutex<Vec<Vec<String>>>,
    version_queries: Mutex<usize>,
}

impl FakeConsoleTool {
    pub fn new() -> Self {
        Self {
            version: Version::new(1, 0, 3),
            failure: None,
            notifications: vec!["logging in".to_string(), "cluster configured".to_string()],
            runs: Mutex::new(Vec::new()),
            version_queries: Mutex::new(0),
        }
    }

    pub fn with_version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    pub fn failing(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }

    pub fn runs(&self) -> Vec<Vec<String>> {
        self.runs.lock().unwrap().clone()
    }

    pub fn version_queries(&self) -> usize {
        *self.version_queries.lock().unwrap()
    }
}

#[async_trait]
impl ConsoleTool for FakeConsoleTool {
    async fn version(&self) -> Result<Version> {
        *self.version_queries.lock().unwrap() += 1;
        Ok(self.version.clone())
    }

    async fn run(&self, args: &[String], notify: &dyn ProgressLog) -> Result<()> {
        self.runs.lock().unwrap().push(args.to_vec());
        for line in &self.notifications {
            notify.record(line);
        }
        match &self.failure {
            Some(message) => Err(Error::console_tool(message.clone())),
            None => Ok(()),
        }
    }
}
