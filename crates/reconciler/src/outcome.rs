//! Results reported to the caller, one document per invocation.

use junos_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Observed and desired software versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionPair {
    pub has: String,
    pub should: String,
}

/// Result of the OS-install reconciler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallOutcome {
    /// In check mode, whether a change would have been made.
    pub changed: bool,
    pub ver: VersionPair,
    /// A reboot was requested after installing.
    pub reboot: bool,
    pub check_mode: bool,
}

impl InstallOutcome {
    /// The device already runs the desired version.
    #[must_use]
    pub const fn unchanged(has: String, should: String, check_mode: bool) -> Self {
        Self {
            changed: false,
            ver: VersionPair { has, should },
            reboot: false,
            check_mode,
        }
    }

    /// Versions differ; check mode stops here.
    #[must_use]
    pub const fn predicted(has: String, should: String) -> Self {
        Self {
            changed: true,
            ver: VersionPair { has, should },
            reboot: false,
            check_mode: true,
        }
    }

    /// The package was installed.
    #[must_use]
    pub const fn installed(has: String, should: String, reboot: bool) -> Self {
        Self {
            changed: true,
            ver: VersionPair { has, should },
            reboot,
            check_mode: false,
        }
    }
}

/// How the cluster state was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathKind {
    /// Management session with cluster RPCs.
    Session,
    /// External console-provisioning tool.
    Console,
}

impl std::fmt::Display for PathKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Session => write!(f, "session"),
            Self::Console => write!(f, "console"),
        }
    }
}

/// Result of the cluster-state reconciler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterOutcome {
    pub changed: bool,
    pub reboot: bool,
    pub path: PathKind,
}

impl ClusterOutcome {
    /// Both paths always change state and reboot.
    #[must_use]
    pub const fn applied(path: PathKind) -> Self {
        Self {
            changed: true,
            reboot: true,
            path,
        }
    }
}

/// Failure document: a message and a stable error classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReport {
    pub failed: bool,
    pub changed: bool,
    pub msg: String,
    pub error_kind: String,
}

impl From<&Error> for FailureReport {
    fn from(error: &Error) -> Self {
        Self {
            failed: true,
            changed: false,
            msg: error.to_string(),
            error_kind: error.kind().as_str().to_string(),
        }
    }
}

/// Any document an invocation can print.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModuleOutput {
    Failed(FailureReport),
    Install(InstallOutcome),
    Cluster(ClusterOutcome),
}

impl ModuleOutput {
    /// Render a reconciler result.
    pub fn from_result<T: Into<Self>>(result: Result<T>) -> Self {
        match result {
            Ok(outcome) => outcome.into(),
            Err(ref error) => Self::Failed(error.into()),
        }
    }

    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// # Errors
    ///
    /// Returns [`Error::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl From<InstallOutcome> for ModuleOutput {
    fn from(outcome: InstallOutcome) -> Self {
        Self::Install(outcome)
    }
}

impl From<ClusterOutcome> for ModuleOutput {
    fn from(outcome: ClusterOutcome) -> Self {
        Self::Cluster(outcome)
    }
}
