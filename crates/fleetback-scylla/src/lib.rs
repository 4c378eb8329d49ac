//! ScyllaDB administration for fleetback
//!
//! Implements [`DatabaseAdmin`](fleetback_core::DatabaseAdmin) by running
//! `nodetool` and `cqlsh` on each node through its command channel.
//!
//! # Requirements
//!
//! - `nodetool` and `cqlsh` on every node (paths configurable per cluster)
//! - read access to the data directory for copying snapshots

pub mod client;
pub mod snapshots;

pub use client::{Credentials, ScyllaClient};
