//! Minimum-version gates for external collaborators.
//!
//! Each gated feature is a [`Requirement`]; checking happens before the
//! feature is attempted so an old collaborator fails fast with a clear message.

use std::sync::LazyLock;

use regex::Regex;
use semver::Version;

use crate::error::Error;
use crate::result::Result;

/// A feature that needs a collaborator at or above some version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub library: &'static str,
    pub feature: &'static str,
    pub minimum: Version,
}

impl Requirement {
    /// Any use of the device-management session library.
    #[must_use]
    pub const fn session() -> Self {
        Self {
            library: "device session library",
            feature: "device sessions",
            minimum: Version::new(1, 2, 2),
        }
    }

    /// Telnet or serial transport modes.
    #[must_use]
    pub const fn alternate_transport() -> Self {
        Self {
            library: "device session library",
            feature: "telnet/serial transport modes",
            minimum: Version::new(2, 0, 0),
        }
    }

    /// Parsed (normalized) RPC output.
    #[must_use]
    pub const fn rpc_output_parsing() -> Self {
        Self {
            library: "device session library",
            feature: "RPC output parsing",
            minimum: Version::new(2, 0, 0),
        }
    }

    /// The console-provisioning tool.
    #[must_use]
    pub const fn console_tool() -> Self {
        Self {
            library: "console provisioning tool",
            feature: "console provisioning",
            minimum: Version::new(1, 0, 1),
        }
    }

    /// Fail with [`Error::LibraryTooOld`] unless `found` satisfies this requirement.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LibraryTooOld`] when `found` is below the minimum.
    pub fn check(&self, found: &Version) -> Result<()> {
        if *found >= self.minimum {
            Ok(())
        } else {
            Err(Error::library_too_old(
                self.library,
                self.feature,
                &self.minimum,
                found,
            ))
        }
    }
}

static VERSION_TOKEN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(\d+)\.(\d+)\.(\d+)").ok());

/// Pull the first `MAJOR.MINOR.PATCH` out of a `--version` banner.
///
/// Banners look like `netconify 1.0.2` or `version: 2.1.0 (build 7)`.
#[must_use]
pub fn parse_version_banner(banner: &str) -> Option<Version> {
    let caps = VERSION_TOKEN.as_ref()?.captures(banner)?;
    let part = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u64>().ok());
    Some(Version::new(part(1)?, part(2)?, part(3)?))
}
