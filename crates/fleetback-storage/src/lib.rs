//! S3 remote storage for fleetback
//!
//! Implements [`RemoteStorage`](fleetback_core::RemoteStorage) with the `aws`
//! CLI, executed on each database node so data never passes through the
//! machine running fleetback.
//!
//! # Requirements
//!
//! - `aws` CLI installed on every node and configured with credentials
//!   (or a named profile)
//! - an S3-compatible bucket; custom endpoints are supported

pub mod awscli;

pub use awscli::{AwsCli, AwsCliOptions};
