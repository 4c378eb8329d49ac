//! Data model

pub mod backup;
pub mod metadata;
pub mod node;
pub mod repair;
pub mod snapshot;
pub mod tag;

pub use backup::{BackupResult, BackupResults, CleanupResult, RemoteBackup};
pub use metadata::{ArchiveMetadata, ArchiveOptions, BackupMetadata, BuildInfo};
pub use node::{Binaries, Node, NodeInfo};
pub use repair::{RepairResult, RepairResults};
pub use snapshot::{Snapshot, SnapshotItem, Snapshots};

use serde::Serializer;
use std::time::Duration;

/// Escapes text for embedding in HTML messages.
pub fn escape_html(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&#34;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

pub(crate) fn format_duration(d: Duration) -> String {
    format!("{d:.2?}")
}

pub(crate) fn serialize_duration<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

pub(crate) fn serialize_error<S: Serializer>(
    e: &Option<crate::Error>,
    s: S,
) -> Result<S::Ok, S::Error> {
    match e {
        Some(err) => s.serialize_some(&err.to_string()),
        None => s.serialize_none(),
    }
}
