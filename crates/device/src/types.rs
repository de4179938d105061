//! Plain data exchanged between reconcilers and device capabilities.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use junos_core::Error;
use serde::{Deserialize, Serialize};

/// Default NETCONF-over-SSH port.
pub const NETCONF_PORT: u16 = 830;

/// Default telnet port.
pub const TELNET_PORT: u16 = 23;

/// Where packages are staged on the device.
pub const REMOTE_STAGING_DIR: &str = "/var/tmp";

/// How a session reaches the device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    /// NETCONF over SSH (the `none` mode: no alternate transport).
    #[default]
    #[serde(rename = "none", alias = "ssh")]
    Ssh,
    /// Console login over telnet, then NETCONF on the console.
    Telnet,
    /// Console login on a local serial line, then NETCONF on the console.
    Serial,
}

impl TransportMode {
    /// Whether this mode goes through a console login.
    #[must_use]
    pub const fn is_console(self) -> bool {
        matches!(self, Self::Telnet | Self::Serial)
    }

    /// Port used when none is configured.
    #[must_use]
    pub const fn default_port(self) -> Option<u16> {
        match self {
            Self::Ssh => Some(NETCONF_PORT),
            Self::Telnet => Some(TELNET_PORT),
            Self::Serial => None,
        }
    }
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ssh => write!(f, "none"),
            Self::Telnet => write!(f, "telnet"),
            Self::Serial => write!(f, "serial"),
        }
    }
}

impl FromStr for TransportMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" | "ssh" | "" => Ok(Self::Ssh),
            "telnet" => Ok(Self::Telnet),
            "serial" => Ok(Self::Serial),
            other => Err(Error::validation(format!(
                "mode must be one of none, telnet, serial (got '{other}')"
            ))),
        }
    }
}

/// Identity and credentials of the one device an invocation talks to.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionTarget {
    /// Host name or address; for [`TransportMode::Serial`] the tty device path.
    pub host: String,
    pub port: Option<u16>,
    pub user: String,
    /// `None` means key-based authentication.
    pub passwd: Option<String>,
    pub mode: TransportMode,
}

impl ConnectionTarget {
    /// An SSH target using key-based authentication.
    pub fn ssh(host: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            user: user.into(),
            passwd: None,
            mode: TransportMode::Ssh,
        }
    }

    /// Set the password.
    #[must_use]
    pub fn with_passwd(mut self, passwd: impl Into<String>) -> Self {
        self.passwd = Some(passwd.into());
        self
    }

    /// Set the port.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the transport mode.
    #[must_use]
    pub const fn with_mode(mut self, mode: TransportMode) -> Self {
        self.mode = mode;
        self
    }

    /// The configured port, or the mode's default.
    #[must_use]
    pub fn effective_port(&self) -> Option<u16> {
        self.port.or_else(|| self.mode.default_port())
    }
}

impl fmt::Debug for ConnectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionTarget")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("passwd", &self.passwd.as_ref().map(|_| "<redacted>"))
            .field("mode", &self.mode)
            .finish()
    }
}

/// Facts a session reports about its device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceFacts {
    pub hostname: Option<String>,
    pub model: Option<String>,
    /// Running software version, e.g. `12.1X46-D10.2`.
    pub version: String,
}

/// A software installation to perform on the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallRequest {
    /// Local path of the package.
    pub package: PathBuf,
    /// The package is already staged on the device; skip the copy.
    pub no_copy: bool,
}

impl InstallRequest {
    /// Install `package`, copying it to the device first.
    pub fn new(package: impl Into<PathBuf>) -> Self {
        Self {
            package: package.into(),
            no_copy: false,
        }
    }

    /// Set whether the copy is skipped.
    #[must_use]
    pub const fn no_copy(mut self, no_copy: bool) -> Self {
        self.no_copy = no_copy;
        self
    }

    /// File name of the package.
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.package.file_name().and_then(|name| name.to_str())
    }

    /// Where the package lives on the device.
    #[must_use]
    pub fn remote_path(&self) -> Option<String> {
        self.file_name()
            .map(|name| format!("{REMOTE_STAGING_DIR}/{name}"))
    }

    /// Local path of the package.
    #[must_use]
    pub fn local_path(&self) -> &Path {
        &self.package
    }
}

/// What the device said about an installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub succeeded: bool,
    pub message: String,
}

impl InstallReport {
    /// Installation accepted.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            succeeded: true,
            message: message.into(),
        }
    }

    /// Installation rejected.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            message: message.into(),
        }
    }
}
