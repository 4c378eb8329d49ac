//! Backup workflow for fleetback
//!
//! [`BackupService`] drives a single node through
//! prepare → export schema → snapshot → archive → metadata → upload → cleanup,
//! and decides which remote backups have outlived their retention.

pub mod archive;
pub mod retention;
pub mod service;

pub use service::{BackupOptions, BackupService, DEFAULT_LOCAL_PATH};
