//! Device-facing capabilities for Junos lifecycle operations.
//!
//! Reconcilers only see the traits in [`capability`]: a [`DeviceConnector`]
//! that opens [`DeviceSession`]s, and a [`ConsoleTool`] for console-based
//! provisioning. The rest of the crate is the built-in implementation:
//!
//! - [`NetconfConnector`] speaks NETCONF 1.0 over SSH (`russh`), telnet, or
//!   a serial console
//! - [`CommandConsoleTool`] drives an external provisioning program
//!
//! # Example
//!
//! ```ignore
//! use junos_device::{ConnectionTarget, DeviceConnector, NetconfConnector, ToolingConfig};
//!
//! let connector = NetconfConnector::new(ToolingConfig::from_env());
//! let mut session = connector.open(&ConnectionTarget::ssh("srx1", "admin")).await?;
//! let facts = session.facts().await?;
//! println!("{} runs {}", facts.hostname.unwrap_or_default(), facts.version);
//! session.close().await?;
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod capability;
pub mod channel;
pub mod config;
pub mod console;
pub mod copy;
pub mod netconf;
pub mod rpc;
pub mod ssh;
pub mod telnet;
pub mod transport;
pub mod types;

pub use capability::{ConsoleTool, DeviceConnector, DeviceSession};
pub use config::{HostKeyPolicy, ToolingConfig};
pub use console::CommandConsoleTool;
pub use netconf::{NetconfConnector, NetconfSession};
pub use rpc::{Rpc, RpcReply};
pub use types::{ConnectionTarget, DeviceFacts, InstallReport, InstallRequest, TransportMode};
