//! SSH connections made with `russh`.
//!
//! One authenticated connection carries the `netconf` subsystem channel and,
//! when a package has to be staged, a second channel running `scp -t`.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use junos_core::{Error, ProgressLog, Result};
use russh::Disconnect;
use russh::client::{self, Handle};
use russh_keys::key::PublicKey;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::channel::Channel;
use crate::config::{HostKeyPolicy, ToolingConfig};
use crate::copy::{self, Upload};
use crate::types::{ConnectionTarget, NETCONF_PORT};

const NETCONF_SUBSYSTEM: &str = "netconf";

/// Checks server keys against `~/.ssh/known_hosts`.
#[derive(Debug)]
pub struct HostKeyVerifier {
    host: String,
    port: u16,
    policy: HostKeyPolicy,
}

impl HostKeyVerifier {
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16, policy: HostKeyPolicy) -> Self {
        Self {
            host: host.into(),
            port,
            policy,
        }
    }

    fn accepts(&self, key: &PublicKey) -> bool {
        let host = self.host.as_str();
        match self.policy {
            HostKeyPolicy::Insecure => {
                warn!(host, "Accepting host key without verification");
                true
            }
            HostKeyPolicy::Strict => match russh_keys::check_known_hosts(host, self.port, key) {
                Ok(true) => true,
                Ok(false) => {
                    warn!(host, "Host key is not in known_hosts");
                    false
                }
                Err(e) => {
                    warn!(host, error = %e, "Host key rejected");
                    false
                }
            },
            HostKeyPolicy::AcceptNew => match russh_keys::check_known_hosts(host, self.port, key) {
                Ok(true) => true,
                Ok(false) => {
                    match russh_keys::learn_known_hosts(host, self.port, key) {
                        Ok(()) => info!(host, "Recorded new host key"),
                        Err(e) => warn!(host, error = %e, "Could not record host key"),
                    }
                    true
                }
                Err(e) => {
                    warn!(host, error = %e, "Host key rejected");
                    false
                }
            },
        }
    }
}

#[async_trait]
impl client::Handler for HostKeyVerifier {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        Ok(self.accepts(server_public_key))
    }
}

/// An authenticated SSH connection to one device.
pub struct SshConnection {
    handle: Handle<HostKeyVerifier>,
    host: String,
}

impl std::fmt::Debug for SshConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshConnection")
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}

impl SshConnection {
    /// Connect and authenticate: with the password when one is given,
    /// otherwise with each configured private key in turn.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionFailed`] when the device cannot be reached,
    /// its host key is refused, or no credential is accepted.
    pub async fn connect(config: &ToolingConfig, target: &ConnectionTarget) -> Result<Self> {
        let host = target.host.as_str();
        let port = target.effective_port().unwrap_or(NETCONF_PORT);
        let verifier = HostKeyVerifier::new(host, port, config.host_key_policy);

        debug!(host, port, policy = %config.host_key_policy, "Connecting over SSH");
        let connecting = client::connect(Arc::new(client::Config::default()), (host, port), verifier);
        let mut handle = tokio::time::timeout(config.connect_timeout, connecting)
            .await
            .map_err(|_| Error::connection_failed(host, "ssh connect timed out"))?
            .map_err(|e| Error::connection_failed(host, format!("ssh connect failed: {e}")))?;

        if !authenticate(&mut handle, config, target).await? {
            return Err(Error::connection_failed(
                host,
                format!("authentication failed for user {}", target.user),
            ));
        }

        info!(host, port, user = %target.user, "SSH connection authenticated");
        Ok(Self {
            handle,
            host: target.host.clone(),
        })
    }

    /// Open a channel running the `netconf` subsystem.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionFailed`] if the device refuses the channel.
    pub async fn open_netconf(&self) -> Result<Channel> {
        let channel = self.handle.channel_open_session().await.map_err(|e| {
            Error::connection_failed(&self.host, format!("cannot open ssh channel: {e}"))
        })?;
        channel
            .request_subsystem(true, NETCONF_SUBSYSTEM)
            .await
            .map_err(|e| {
                Error::connection_failed(&self.host, format!("netconf subsystem refused: {e}"))
            })?;

        let (reader, writer) = tokio::io::split(channel.into_stream());
        Ok(Channel::new(reader, writer))
    }

    /// Copy `local` to `remote` on the device over this connection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if `local` cannot be read and
    /// [`Error::Transport`] if the device refuses or interrupts the copy.
    pub async fn upload(&self, local: &Path, remote: &str, progress: &dyn ProgressLog) -> Result<()> {
        let file = tokio::fs::File::open(local).await?;
        let size = file.metadata().await?.len();
        let name = Path::new(remote)
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| Error::transport(format!("{remote} has no file name")))?;

        let channel = self.handle.channel_open_session().await.map_err(|e| {
            Error::transport(format!("cannot open ssh channel for the copy: {e}"))
        })?;
        channel
            .exec(true, format!("scp -t {remote}"))
            .await
            .map_err(|e| Error::transport(format!("cannot start scp on the device: {e}")))?;

        info!(host = %self.host, local = %local.display(), remote, size, "Copying package");
        let mut stream = channel.into_stream();
        let upload = Upload {
            host: &self.host,
            name,
            size,
        };
        copy::scp_send(&mut stream, file, upload, progress).await?;
        stream
            .shutdown()
            .await
            .map_err(|e| Error::transport(format!("copy channel did not close: {e}")))
    }

    /// Say goodbye to the device.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the disconnect message cannot be sent.
    pub async fn disconnect(&self) -> Result<()> {
        self.handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
            .map_err(|e| Error::transport(format!("ssh disconnect failed: {e}")))
    }
}

async fn authenticate(
    handle: &mut Handle<HostKeyVerifier>,
    config: &ToolingConfig,
    target: &ConnectionTarget,
) -> Result<bool> {
    let host = target.host.as_str();

    if let Some(passwd) = &target.passwd {
        debug!(host, user = %target.user, "Authenticating with password");
        return handle
            .authenticate_password(target.user.clone(), passwd.clone())
            .await
            .map_err(|e| Error::connection_failed(host, format!("password authentication failed: {e}")));
    }

    let home = std::env::var_os("HOME").map(std::path::PathBuf::from);
    for path in config.identities(home.as_deref()) {
        let key = match russh_keys::load_secret_key(&path, None) {
            Ok(key) => key,
            Err(e) => {
                debug!(host, key = %path.display(), error = %e, "Skipping unusable key");
                continue;
            }
        };
        debug!(host, user = %target.user, key = %path.display(), "Offering key");
        let accepted = handle
            .authenticate_publickey(target.user.clone(), Arc::new(key))
            .await
            .map_err(|e| Error::connection_failed(host, format!("key authentication failed: {e}")))?;
        if accepted {
            return Ok(true);
        }
    }
    Ok(false)
}
