//! Result type definition and extension traits.

use crate::error::Error;

/// The standard Result type for Junos lifecycle operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait providing side-effecting combinators for Results.
pub trait ResultExt<T> {
    /// Inspect the error without consuming the Result.
    fn inspect_error<F: FnOnce(&Error)>(self, f: F) -> Self;

    /// Convert to an Option, logging the error at warn level with `context`.
    ///
    /// Used where a failure must not mask a more important outcome, such as
    /// closing a session after the real work already succeeded or failed.
    fn warn_and_discard(self, context: &str) -> Option<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn inspect_error<F: FnOnce(&Error)>(self, f: F) -> Self {
        if let Err(ref e) = self {
            f(e);
        }
        self
    }

    fn warn_and_discard(self, context: &str) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(error = %e, "{context}");
                None
            }
        }
    }
}
