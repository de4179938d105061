//! Invocation parameters and the state they describe.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use junos_core::{Error, Result};
use junos_device::{ConnectionTarget, TransportMode};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Seconds to wait after a change so the device can start rebooting.
pub const DEFAULT_REBOOT_PAUSE_SECS: u64 = 10;

/// `<name>-<version>-domestic.<ext>`; the version starts at the first `-`
/// followed by a digit.
static PACKAGE_VERSION: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"-(\d.*)-domestic\.[\w.]+$").ok());

/// Device identity and credentials shared by both reconcilers.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceParams {
    pub host: String,

    /// Falls back to the current OS user.
    #[serde(default)]
    pub user: Option<String>,

    /// `None` assumes key-based authentication.
    #[serde(default)]
    pub passwd: Option<String>,

    /// Defaults to 830 for NETCONF over SSH.
    #[serde(default)]
    pub port: Option<u16>,
}

impl DeviceParams {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    /// # Errors
    ///
    /// Returns [`Error::Validation`] when the host is empty.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::validation("host is required"));
        }
        Ok(())
    }

    /// The user to log in as.
    #[must_use]
    pub fn effective_user(&self) -> String {
        self.user
            .clone()
            .filter(|user| !user.is_empty())
            .unwrap_or_else(current_user)
    }

    /// Connection target for `mode`.
    #[must_use]
    pub fn target(&self, mode: TransportMode) -> ConnectionTarget {
        ConnectionTarget {
            host: self.host.trim().to_string(),
            port: self.port,
            user: self.effective_user(),
            passwd: self.passwd.clone(),
            mode,
        }
    }
}

impl fmt::Debug for DeviceParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceParams")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("passwd", &self.passwd.as_ref().map(|_| "<redacted>"))
            .field("port", &self.port)
            .finish()
    }
}

fn current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("LOGNAME"))
        .unwrap_or_else(|_| "root".to_string())
}

const fn default_true() -> bool {
    true
}

const fn default_reboot_pause() -> u64 {
    DEFAULT_REBOOT_PAUSE_SECS
}

/// Parameters of the OS-install reconciler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallOsParams {
    #[serde(flatten)]
    pub device: DeviceParams,

    /// Local path of the software package.
    pub package: PathBuf,

    /// Desired version; inferred from the package file name when absent.
    #[serde(default)]
    pub version: Option<String>,

    /// The package is already staged on the device.
    #[serde(default)]
    pub no_copy: bool,

    #[serde(default = "default_true")]
    pub reboot: bool,

    #[serde(default = "default_reboot_pause")]
    pub reboot_pause: u64,

    #[serde(default)]
    pub logfile: Option<PathBuf>,

    /// Report what would change without installing.
    #[serde(default)]
    pub check_mode: bool,
}

impl InstallOsParams {
    pub fn new(host: impl Into<String>, package: impl Into<PathBuf>) -> Self {
        Self {
            device: DeviceParams::new(host),
            package: package.into(),
            version: None,
            no_copy: false,
            reboot: true,
            reboot_pause: DEFAULT_REBOOT_PAUSE_SECS,
            logfile: None,
            check_mode: false,
        }
    }

    /// The version the device should run: the explicit `version`, or the
    /// one embedded in the package file name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PackageName`] when no version is given and the
    /// package name does not embed one.
    pub fn desired_version(&self) -> Result<String> {
        match self.version.as_deref().map(str::trim) {
            Some(version) if !version.is_empty() => Ok(version.to_string()),
            _ => infer_version(&self.package),
        }
    }
}

/// Extract the version from a `<name>-<version>-domestic.<ext>` package.
///
/// ```
/// # use junos_reconciler::infer_version;
/// let version = infer_version("images/junos-srxsme-12.1X46-D10.2-domestic.tgz".as_ref());
/// assert_eq!(version.ok().as_deref(), Some("12.1X46-D10.2"));
/// ```
///
/// # Errors
///
/// Returns [`Error::PackageName`] when the file name does not follow the
/// convention.
pub fn infer_version(package: &Path) -> Result<String> {
    let file_name = package
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();

    PACKAGE_VERSION
        .as_ref()
        .and_then(|re| re.captures(&file_name))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| Error::package_name(package.to_string_lossy()))
}

/// Parameters of the cluster-state reconciler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterParams {
    #[serde(flatten)]
    pub device: DeviceParams,

    #[serde(default)]
    pub mode: TransportMode,

    /// Console-tool target specification; selects the console path.
    #[serde(default)]
    pub console: Option<String>,

    pub cluster_enable: bool,

    #[serde(default)]
    pub cluster_id: Option<String>,

    #[serde(default)]
    pub node: Option<String>,

    #[serde(default)]
    pub logfile: Option<PathBuf>,
}

impl ClusterParams {
    /// Enable clustering with `cluster_id` and `node`.
    pub fn enable(
        host: impl Into<String>,
        cluster_id: impl Into<String>,
        node: impl Into<String>,
    ) -> Self {
        Self {
            cluster_enable: true,
            cluster_id: Some(cluster_id.into()),
            node: Some(node.into()),
            ..Self::disable(host)
        }
    }

    /// Disable clustering.
    pub fn disable(host: impl Into<String>) -> Self {
        Self {
            device: DeviceParams::new(host),
            mode: TransportMode::Ssh,
            console: None,
            cluster_enable: false,
            cluster_id: None,
            node: None,
            logfile: None,
        }
    }

    #[must_use]
    pub fn with_console(mut self, console: impl Into<String>) -> Self {
        self.console = Some(console.into());
        self
    }

    #[must_use]
    pub const fn with_mode(mut self, mode: TransportMode) -> Self {
        self.mode = mode;
        self
    }

    /// The console spec, when one was supplied and is not blank.
    #[must_use]
    pub fn console_spec(&self) -> Option<&str> {
        self.console
            .as_deref()
            .map(str::trim)
            .filter(|spec| !spec.is_empty())
    }
}

/// Desired chassis-cluster membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum ClusterState {
    Enabled { cluster_id: String, node: String },
    Disabled,
}

impl ClusterState {
    /// Validate the enable flag and its paired fields.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] when clustering is enabled without both
    /// a cluster id and a node.
    pub fn from_params(params: &ClusterParams) -> Result<Self> {
        if !params.cluster_enable {
            return Ok(Self::Disabled);
        }

        let present = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        match (present(&params.cluster_id), present(&params.node)) {
            (Some(cluster_id), Some(node)) => Ok(Self::Enabled { cluster_id, node }),
            (None, Some(_)) => Err(Error::validation(
                "cluster_id is required when cluster_enable is true",
            )),
            (Some(_), None) => Err(Error::validation(
                "node is required when cluster_enable is true",
            )),
            (None, None) => Err(Error::validation(
                "cluster_id and node are required when cluster_enable is true",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_infer_version_from_package_name() {
        assert_eq!(
            infer_version(Path::new("foo-12.1X46-D10.2-domestic.tgz")).unwrap(),
            "12.1X46-D10.2"
        );
        assert_eq!(
            infer_version(Path::new("/images/junos-srxsme-15.1X49-D100.6-domestic.tgz")).unwrap(),
            "15.1X49-D100.6"
        );
    }

    #[test]
    fn test_infer_version_requires_domestic_marker() {
        let err = infer_version(Path::new("junos-srxsme-12.1X46-D10.2.tgz")).err().unwrap();
        assert!(matches!(err, Error::PackageName { .. }));
    }

    #[test]
    fn test_infer_version_ignores_directories() {
        let err = infer_version(Path::new("/srv/junos-12.1-domestic.d/package.tgz"))
            .err()
            .unwrap();
        assert!(matches!(err, Error::PackageName { .. }));
    }

    #[test]
    fn test_explicit_version_wins() {
        let mut params = InstallOsParams::new("srx1", "not-a-versioned-name.tgz");
        params.version = Some(" 15.1 ".to_string());
        assert_eq!(params.desired_version().unwrap(), "15.1");

        params.version = Some(String::new());
        assert!(params.desired_version().is_err());
    }

    #[test]
    fn test_install_params_defaults() {
        let params: InstallOsParams = serde_json::from_str(
            r#"{"host": "srx1", "package": "/images/junos-srxsme-15.1-domestic.tgz"}"#,
        )
        .unwrap();

        assert_eq!(params.device.host, "srx1");
        assert_eq!(params.device.port, None);
        assert!(params.reboot);
        assert_eq!(params.reboot_pause, 10);
        assert!(!params.no_copy);
        assert!(!params.check_mode);
    }

    #[test]
    fn test_cluster_params_mode() {
        let params: ClusterParams = serde_json::from_str(
            r#"{"host": "srx1", "mode": "telnet", "cluster_enable": false}"#,
        )
        .unwrap();
        assert_eq!(params.mode, TransportMode::Telnet);
        assert_eq!(params.console_spec(), None);

        let params: ClusterParams =
            serde_json::from_str(r#"{"host": "srx1", "cluster_enable": true}"#).unwrap();
        assert_eq!(params.mode, TransportMode::Ssh);
    }

    #[test]
    fn test_cluster_enable_requires_both_fields() {
        let mut params = ClusterParams::enable("srx1", "1", "0");
        assert_eq!(
            ClusterState::from_params(&params).unwrap(),
            ClusterState::Enabled {
                cluster_id: "1".to_string(),
                node: "0".to_string()
            }
        );

        params.node = Some("  ".to_string());
        let err = ClusterState::from_params(&params).err().unwrap();
        assert_eq!(err.to_string(), "node is required when cluster_enable is true");

        params.cluster_id = None;
        params.node = Some("0".to_string());
        let err = ClusterState::from_params(&params).err().unwrap();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn test_cluster_disable_ignores_pair() {
        let params = ClusterParams::disable("srx1");
        assert_eq!(ClusterState::from_params(&params).unwrap(), ClusterState::Disabled);
    }

    #[test]
    fn test_target_uses_params() {
        let mut device = DeviceParams::new(" srx1 ");
        device.user = Some("admin".to_string());
        device.passwd = Some("secret".to_string());

        let target = device.target(TransportMode::Telnet);
        assert_eq!(target.host, "srx1");
        assert_eq!(target.user, "admin");
        assert_eq!(target.effective_port(), Some(23));
        assert!(!format!("{device:?}").contains("secret"));
    }
}
