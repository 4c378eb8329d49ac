//! Core of fleetback
//!
//! Everything the other crates build on:
//!
//! - [`Context`]: cooperative cancellation and deadlines
//! - [`channel`]: command channels (local shell, OpenSSH) and the channel factory
//! - [`Fleet`]: the node registry that fans operations out sequentially or in parallel
//! - [`model`]: nodes, remote backups, snapshots, metadata and fleet reports
//! - [`parser`]: parsers for `nodetool` and `aws s3 ls` output
//! - [`ports`]: the database and storage capabilities the workflows depend on

pub mod channel;
pub mod context;
mod dns;
pub mod error;
pub mod fleet;
pub mod model;
pub mod parser;
pub mod ports;
pub mod result;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use channel::{ChannelFactory, ChannelProvider, CommandChannel, LocalChannel, SshAuth, SshSettings};
pub use context::{Context, Interrupted};
pub use error::{Error, Result};
pub use fleet::{Fleet, FleetOptions, NodeFuture};
pub use model::node::{Binaries, Node, NodeInfo};
pub use ports::{DatabaseAdmin, RemoteStorage};
pub use result::{ExecutionResult, ExecutionResults, NodeFailures};
