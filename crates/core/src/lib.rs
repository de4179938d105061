//! Shared building blocks for the Junos lifecycle reconcilers.
//!
//! - [`Error`] / [`Result`]: the typed failure vocabulary every crate reports with
//! - [`ProgressLog`]: the per-invocation, append-only progress log
//! - [`version`]: minimum-version checks for external collaborators

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod progress;
pub mod result;
pub mod version;

pub use error::{Error, ErrorKind};
pub use progress::{
    FileProgressLog, MemoryProgressLog, NoopProgressLog, ProgressLog, open_progress_log,
};
pub use result::{Result, ResultExt};
pub use version::{Requirement, parse_version_banner};
