//! NETCONF 1.0 sessions over any [`Channel`].

use async_trait::async_trait;
use junos_core::{Error, ProgressLog, Result, ResultExt};
use semver::Version;
use tracing::{debug, info, warn};

use crate::capability::{DeviceConnector, DeviceSession};
use crate::channel::Channel;
use crate::config::ToolingConfig;
use crate::copy;
use crate::rpc::{Rpc, RpcReply};
use crate::ssh::SshConnection;
use crate::transport::{self, Link};
use crate::types::{ConnectionTarget, DeviceFacts, InstallReport, InstallRequest};

/// End-of-message marker for NETCONF 1.0 framing.
pub const DELIMITER: &[u8] = b"]]>]]>";

const CLIENT_HELLO: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8"?>"#,
    r#"<hello xmlns="urn:ietf:params:xml:ns:netconf:base:1.0">"#,
    "<capabilities><capability>urn:ietf:params:netconf:base:1.0</capability></capabilities>",
    "</hello>",
);

/// Opens [`NetconfSession`]s over SSH, telnet or a serial console.
#[derive(Debug, Clone)]
pub struct NetconfConnector {
    config: ToolingConfig,
}

impl NetconfConnector {
    /// API level of this implementation; it supports alternate transports
    /// and parsed RPC output.
    pub const API_VERSION: Version = Version::new(2, 1, 0);

    #[must_use]
    pub const fn new(config: ToolingConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl DeviceConnector for NetconfConnector {
    fn library_version(&self) -> Version {
        Self::API_VERSION
    }

    async fn open(&self, target: &ConnectionTarget) -> Result<Box<dyn DeviceSession>> {
        let Link { channel, ssh } = transport::open(&self.config, target).await?;
        match NetconfSession::establish(channel, target.clone(), self.config.clone()).await {
            Ok(session) => Ok(Box::new(session.with_ssh(ssh))),
            Err(e) => {
                if let Some(ssh) = ssh {
                    ssh.disconnect()
                        .await
                        .warn_and_discard("Failed to disconnect after a failed hello");
                }
                Err(e)
            }
        }
    }
}

/// A NETCONF session to one device.
#[derive(Debug)]
pub struct NetconfSession {
    channel: Channel,
    ssh: Option<SshConnection>,
    target: ConnectionTarget,
    config: ToolingConfig,
    next_message_id: u64,
    closed: bool,
}

impl NetconfSession {
    /// Exchange hellos over an already-open channel.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionFailed`] if the device does not greet with
    /// a NETCONF hello.
    pub async fn establish(
        mut channel: Channel,
        target: ConnectionTarget,
        config: ToolingConfig,
    ) -> Result<Self> {
        let greeting = match channel
            .read_until(DELIMITER, config.connect_timeout, "NETCONF hello")
            .await
        {
            Ok(greeting) => greeting,
            Err(e) => {
                channel
                    .shutdown()
                    .await
                    .warn_and_discard("Failed to stop transport after a failed hello");
                return Err(Error::connection_failed(&target.host, e.to_string()));
            }
        };

        let greeting = String::from_utf8_lossy(&greeting);
        if !greeting.contains("<hello") {
            channel
                .shutdown()
                .await
                .warn_and_discard("Failed to stop transport after a bad hello");
            return Err(Error::connection_failed(
                &target.host,
                "device did not send a NETCONF hello",
            ));
        }

        channel
            .send(format!("{CLIENT_HELLO}{}", String::from_utf8_lossy(DELIMITER)).as_bytes())
            .await
            .map_err(|e| Error::connection_failed(&target.host, e.to_string()))?;

        info!(host = %target.host, mode = %target.mode, "NETCONF session established");

        Ok(Self {
            channel,
            ssh: None,
            target,
            config,
            next_message_id: 1,
            closed: false,
        })
    }

    /// Keep the SSH connection the channel runs on; packages are copied
    /// over it and it is closed with the session.
    #[must_use]
    pub fn with_ssh(mut self, ssh: Option<SshConnection>) -> Self {
        self.ssh = ssh;
        self
    }

    async fn remote_sha256(&mut self, path: &str) -> Result<Option<String>> {
        match self
            .rpc(&Rpc::GetSha256Checksum {
                path: path.to_string(),
            })
            .await
        {
            Ok(reply) => Ok(reply.text_of("checksum")),
            // Missing file
            Err(Error::Rpc { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn stage_package(
        &mut self,
        request: &InstallRequest,
        remote: &str,
        progress: &dyn ProgressLog,
    ) -> Result<()> {
        if self.ssh.is_none() {
            return Err(Error::transport(format!(
                "copying a package needs the ssh transport; stage it as {remote} and set no_copy"
            )));
        }

        progress.record(&format!(
            "computing checksum of {}",
            request.local_path().display()
        ));
        let local = copy::local_sha256(request.local_path()).await?;

        if self.remote_sha256(remote).await?.as_deref() == Some(local.as_str()) {
            progress.record(&format!("{remote} already present with matching checksum, skipping copy"));
            return Ok(());
        }

        let ssh = self
            .ssh
            .as_ref()
            .ok_or_else(|| Error::transport("ssh connection is gone"))?;
        progress.record(&format!("copying package to {}:{remote}", self.target.host));
        ssh.upload(request.local_path(), remote, progress).await?;
        progress.record("package copy complete");
        Ok(())
    }
}

#[async_trait]
impl DeviceSession for NetconfSession {
    async fn facts(&mut self) -> Result<DeviceFacts> {
        self.rpc(&Rpc::GetSoftwareInformation).await?.software_facts()
    }

    async fn install(
        &mut self,
        request: &InstallRequest,
        progress: &dyn ProgressLog,
    ) -> Result<InstallReport> {
        let remote = request
            .remote_path()
            .ok_or_else(|| Error::validation("package path has no file name"))?;

        if !request.no_copy {
            self.stage_package(request, &remote, progress).await?;
        }

        progress.record(&format!("installing software {remote}, please be patient"));
        let add = Rpc::RequestPackageAdd {
            package: remote,
            no_validate: true,
        };

        match self.rpc(&add).await {
            Ok(reply) => {
                let output = reply.output_text().unwrap_or_default();
                for line in output.lines() {
                    progress.record(line);
                }
                if reply.package_result().is_none_or(|code| code == 0) {
                    Ok(InstallReport::success(output))
                } else {
                    Ok(InstallReport::failure(output))
                }
            }
            Err(Error::Rpc { reason, .. }) => Ok(InstallReport::failure(reason)),
            Err(e) => Err(e),
        }
    }

    async fn reboot(&mut self) -> Result<String> {
        Ok(self.rpc(&Rpc::RequestReboot).await?.message())
    }

    async fn rpc(&mut self, rpc: &Rpc) -> Result<RpcReply> {
        if self.closed {
            return Err(Error::transport("session is closed"));
        }

        let message_id = self.next_message_id;
        self.next_message_id = self.next_message_id.saturating_add(1);

        debug!(host = %self.target.host, rpc = rpc.name(), message_id, "Sending RPC");
        let request = format!(
            r#"<rpc message-id="{message_id}">{}</rpc>{}"#,
            rpc.to_xml(),
            String::from_utf8_lossy(DELIMITER)
        );
        self.channel.send(request.as_bytes()).await?;

        let raw = self
            .channel
            .read_until(DELIMITER, self.config.rpc_timeout, rpc.name())
            .await?;
        let reply = RpcReply::new(String::from_utf8_lossy(&raw));

        let errors = reply.errors();
        if errors.is_empty() {
            Ok(reply)
        } else {
            Err(Error::rpc(rpc.name(), errors.join("; ")))
        }
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let goodbye = format!(
            "<rpc message-id=\"{}\">{}</rpc>{}",
            self.next_message_id,
            Rpc::CloseSession.to_xml(),
            String::from_utf8_lossy(DELIMITER)
        );
        // A rebooting device may already be gone.
        if let Err(e) = self.channel.send(goodbye.as_bytes()).await {
            debug!(host = %self.target.host, error = %e, "close-session not delivered");
        } else if let Err(e) = self
            .channel
            .read_until(DELIMITER, self.config.connect_timeout, "close-session reply")
            .await
        {
            debug!(host = %self.target.host, error = %e, "close-session not acknowledged");
        }

        if let Err(e) = self.channel.shutdown().await {
            warn!(host = %self.target.host, error = %e, "Channel shutdown failed");
        }
        if let Some(ssh) = self.ssh.take() {
            ssh.disconnect().await.inspect_error(|e| {
                warn!(host = %self.target.host, error = %e, "SSH disconnect failed");
            })?;
        }
        info!(host = %self.target.host, "NETCONF session closed");
        Ok(())
    }
}
