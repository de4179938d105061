#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! # junos-lifecycle
//!
//! Command-line front end for the Junos lifecycle reconcilers.
//!
//! This library re-exports the workspace crates for convenience.

pub use junos_core;
pub use junos_device;
pub use junos_reconciler;

pub mod args;
pub mod cli;
pub mod commands;
