//! Configuration for the built-in connector: SSH trust, the console tool
//! and timeouts.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use junos_core::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// How an unknown or changed SSH host key is treated.
///
/// Keys are checked against `~/.ssh/known_hosts`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HostKeyPolicy {
    /// Only hosts already in `known_hosts` are accepted.
    Strict,
    /// Unknown hosts are recorded and accepted; changed keys are refused.
    #[default]
    AcceptNew,
    /// Every key is accepted.
    Insecure,
}

impl fmt::Display for HostKeyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strict => write!(f, "strict"),
            Self::AcceptNew => write!(f, "accept-new"),
            Self::Insecure => write!(f, "insecure"),
        }
    }
}

impl FromStr for HostKeyPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "strict" | "yes" => Ok(Self::Strict),
            "accept-new" => Ok(Self::AcceptNew),
            "insecure" | "no" => Ok(Self::Insecure),
            other => Err(Error::config(format!(
                "host key policy must be strict, accept-new or insecure (got '{other}')"
            ))),
        }
    }
}

/// Settings used by [`crate::NetconfConnector`] and
/// [`crate::CommandConsoleTool`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolingConfig {
    /// Console-provisioning tool.
    #[serde(default = "default_console_tool")]
    pub console_tool: String,

    #[serde(default)]
    pub host_key_policy: HostKeyPolicy,

    /// Private keys tried in order when no password is given; empty means
    /// the usual `~/.ssh/id_*` files.
    #[serde(default)]
    pub identity_files: Vec<PathBuf>,

    /// Limit for connecting, logging in and the NETCONF hello.
    #[serde(with = "duration_secs", default = "default_connect_timeout")]
    pub connect_timeout: Duration,

    /// Limit for a single RPC; package installs are slow.
    #[serde(with = "duration_secs", default = "default_rpc_timeout")]
    pub rpc_timeout: Duration,
}

impl Default for ToolingConfig {
    fn default() -> Self {
        Self {
            console_tool: default_console_tool(),
            host_key_policy: HostKeyPolicy::default(),
            identity_files: Vec::new(),
            connect_timeout: default_connect_timeout(),
            rpc_timeout: default_rpc_timeout(),
        }
    }
}

impl ToolingConfig {
    /// Set the connect timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the RPC timeout.
    #[must_use]
    pub const fn rpc_timeout(mut self, timeout: Duration) -> Self {
        self.rpc_timeout = timeout;
        self
    }

    /// Set the console tool program.
    #[must_use]
    pub fn console_tool(mut self, program: impl Into<String>) -> Self {
        self.console_tool = program.into();
        self
    }

    /// Load configuration from environment variables over the defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env()
    }

    /// Apply `JUNOS_*` environment overrides.
    #[must_use]
    pub fn with_env(mut self) -> Self {
        if let Ok(program) = std::env::var("JUNOS_CONSOLE_TOOL") {
            self.console_tool = program;
        }
        if let Ok(value) = std::env::var("JUNOS_HOST_KEY_POLICY") {
            match value.parse() {
                Ok(policy) => self.host_key_policy = policy,
                Err(e) => warn!(error = %e, "Ignoring JUNOS_HOST_KEY_POLICY"),
            }
        }
        if let Ok(path) = std::env::var("JUNOS_SSH_KEY") {
            self.identity_files = vec![PathBuf::from(path)];
        }
        if let Some(secs) = env_secs("JUNOS_CONNECT_TIMEOUT") {
            self.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env_secs("JUNOS_RPC_TIMEOUT") {
            self.rpc_timeout = Duration::from_secs(secs);
        }
        self
    }

    /// Set the host key policy.
    #[must_use]
    pub const fn host_key_policy(mut self, policy: HostKeyPolicy) -> Self {
        self.host_key_policy = policy;
        self
    }

    /// Keys to offer, in order.
    ///
    /// The configured list, or whichever of `id_ed25519`, `id_ecdsa` and
    /// `id_rsa` exist under `home/.ssh`.
    #[must_use]
    pub fn identities(&self, home: Option<&Path>) -> Vec<PathBuf> {
        if !self.identity_files.is_empty() {
            return self.identity_files.clone();
        }
        home.map(|home| {
            DEFAULT_IDENTITIES
                .iter()
                .map(|name| home.join(".ssh").join(name))
                .filter(|path| path.is_file())
                .collect()
        })
        .unwrap_or_default()
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("failed to read {}: {e}", path.display()))
        })?;
        toml::from_str(&content)
            .map_err(|e| Error::config(format!("failed to parse {}: {e}", path.display())))
    }
}

const DEFAULT_IDENTITIES: [&str; 3] = ["id_ed25519", "id_ecdsa", "id_rsa"];

fn env_secs(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn lookup(program: &str) -> String {
    which::which(program)
        .map(|path| path.to_string_lossy().to_string())
        .unwrap_or_else(|_| program.to_string())
}

fn default_console_tool() -> String {
    lookup("netconify")
}

const fn default_connect_timeout() -> Duration {
    Duration::from_secs(30)
}

const fn default_rpc_timeout() -> Duration {
    Duration::from_secs(1800)
}

/// Serialization helper for Duration as seconds.
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
