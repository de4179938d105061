//! Core error types for Junos lifecycle operations.
//!
//! Every failure is terminal for the invocation that produced it; callers
//! render the error into a failure result instead of retrying.

use std::path::PathBuf;

use thiserror::Error;

/// Core error type for Junos lifecycle operations.
#[derive(Debug, Error)]
pub enum Error {
    // Device contact
    #[error("unable to connect to {host}: {reason}")]
    ConnectionFailed { host: String, reason: String },

    #[error("{library} {found} is too old for {feature}; version {required} or later is required")]
    LibraryTooOld {
        library: String,
        feature: String,
        required: String,
        found: String,
    },

    // Parameter problems, detected before any device contact
    #[error("{reason}")]
    Validation { reason: String },

    #[error("unable to determine a version from package '{package}'; expected <name>-<version>-domestic.<ext>")]
    PackageName { package: String },

    // Remote operations
    #[error("unable to install {package}: {reason}")]
    InstallFailed { package: PathBuf, reason: String },

    #[error("RPC '{rpc}' failed: {reason}")]
    Rpc { rpc: String, reason: String },

    #[error("transport error: {reason}")]
    Transport { reason: String },

    #[error("timed out after {seconds}s waiting for {waiting_for}")]
    Timeout { waiting_for: String, seconds: u64 },

    #[error("console tool failed: {reason}")]
    ConsoleTool { reason: String },

    // Local problems
    #[error("configuration error: {reason}")]
    Config { reason: String },

    #[error("failed to open log file '{path}': {reason}")]
    LogFile { path: PathBuf, reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Stable classification of an [`Error`], reported alongside failure messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Connection,
    VersionMismatch,
    Validation,
    Parse,
    Install,
    Rpc,
    Transport,
    Timeout,
    ConsoleTool,
    Config,
    Io,
}

impl ErrorKind {
    /// The snake_case name used in serialized results.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connection => "connection_error",
            Self::VersionMismatch => "version_mismatch_error",
            Self::Validation => "validation_error",
            Self::Parse => "parse_error",
            Self::Install => "install_failure",
            Self::Rpc => "rpc_error",
            Self::Transport => "transport_error",
            Self::Timeout => "timeout",
            Self::ConsoleTool => "console_tool_error",
            Self::Config => "config_error",
            Self::Io => "io_error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Error {
    /// Create a connection failed error.
    pub fn connection_failed(host: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            host: host.into(),
            reason: reason.into(),
        }
    }

    /// Create a library-too-old error.
    pub fn library_too_old(
        library: impl Into<String>,
        feature: impl Into<String>,
        required: impl std::fmt::Display,
        found: impl std::fmt::Display,
    ) -> Self {
        Self::LibraryTooOld {
            library: library.into(),
            feature: feature.into(),
            required: required.to_string(),
            found: found.to_string(),
        }
    }

    /// Create a validation error.
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    /// Create a package name parse error.
    pub fn package_name(package: impl Into<String>) -> Self {
        Self::PackageName {
            package: package.into(),
        }
    }

    /// Create an install failure.
    pub fn install_failed(package: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InstallFailed {
            package: package.into(),
            reason: reason.into(),
        }
    }

    /// Create an RPC error.
    pub fn rpc(rpc: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Rpc {
            rpc: rpc.into(),
            reason: reason.into(),
        }
    }

    /// Create a transport error.
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(waiting_for: impl Into<String>, seconds: u64) -> Self {
        Self::Timeout {
            waiting_for: waiting_for.into(),
            seconds,
        }
    }

    /// Create a console tool error.
    pub fn console_tool(reason: impl Into<String>) -> Self {
        Self::ConsoleTool {
            reason: reason.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Create a log file error.
    pub fn log_file(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::LogFile {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::ConnectionFailed { .. } => ErrorKind::Connection,
            Self::LibraryTooOld { .. } => ErrorKind::VersionMismatch,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::PackageName { .. } | Self::Json(_) => ErrorKind::Parse,
            Self::InstallFailed { .. } => ErrorKind::Install,
            Self::Rpc { .. } => ErrorKind::Rpc,
            Self::Transport { .. } => ErrorKind::Transport,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::ConsoleTool { .. } => ErrorKind::ConsoleTool,
            Self::Config { .. } | Self::LogFile { .. } => ErrorKind::Config,
            Self::Io(_) => ErrorKind::Io,
        }
    }
}
