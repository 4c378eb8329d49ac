//! Remote backups and backup outcomes

use super::tag::BACKUP_DATE_FORMAT;
use super::{escape_html, format_duration, serialize_duration, serialize_error};
use crate::error::{Error, Result};
use crate::result::{ExecutionResults, NodeFailures};
use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use serde::Serialize;
use std::fmt::Write;
use std::sync::LazyLock;
use std::time::Duration;

static BACKUP_PATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<host>[^/]+)/(?P<date>\d\d-\d\d-\d\d\d\d-\d\d-\d\d)(?:/|$)")
        .expect("valid regex")
});

/// A backup directory in remote storage.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteBackup {
    pub path: String,
    pub host_prefix: String,
    pub date_created: DateTime<Utc>,
    pub removed: bool,
    #[serde(serialize_with = "serialize_error", skip_serializing_if = "Option::is_none")]
    pub remove_error: Option<Error>,
}

impl RemoteBackup {
    /// Parses a path containing `<host-prefix>/<MM-DD-YYYY-HH-mm>`.
    pub fn from_path(path: &str) -> Result<Self> {
        let not_a_backup = || Error::Parse {
            what: "remote backup path".to_string(),
            output: path.to_string(),
        };

        let captures = BACKUP_PATH_RE.captures(path).ok_or_else(not_a_backup)?;
        let date = NaiveDateTime::parse_from_str(&captures["date"], BACKUP_DATE_FORMAT)
            .map_err(|_| not_a_backup())?;

        Ok(Self {
            path: path.to_string(),
            host_prefix: captures["host"].to_string(),
            date_created: date.and_utc(),
            removed: false,
            remove_error: None,
        })
    }

    /// Retentions under one second disable expiry.
    pub fn is_expired(&self, now: DateTime<Utc>, retention: Duration) -> bool {
        if retention < Duration::from_secs(1) {
            return false;
        }
        match chrono::Duration::from_std(retention) {
            Ok(retention) => self.date_created < now - retention,
            Err(_) => false,
        }
    }
}

/// What the post-upload cleanup did on one node.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupResult {
    #[serde(serialize_with = "serialize_error", skip_serializing_if = "Option::is_none")]
    pub local_error: Option<Error>,
    #[serde(serialize_with = "serialize_error", skip_serializing_if = "Option::is_none")]
    pub remote_error: Option<Error>,
    pub removed_remote_backups: Vec<RemoteBackup>,
}

/// Outcome of the backup workflow on one node.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupResult {
    #[serde(serialize_with = "serialize_error", skip_serializing_if = "Option::is_none")]
    pub error: Option<Error>,
    pub date_started: DateTime<Utc>,
    #[serde(serialize_with = "serialize_duration")]
    pub duration: Duration,
    pub snapshot_tag: String,
    pub keyspaces: Vec<String>,
    pub uploaded: bool,
    pub cleanup: CleanupResult,
}

impl BackupResult {
    pub fn new(date_started: DateTime<Utc>) -> Self {
        Self {
            error: None,
            date_started,
            duration: Duration::ZERO,
            snapshot_tag: String::new(),
            keyspaces: Vec::new(),
            uploaded: false,
            cleanup: CleanupResult::default(),
        }
    }
}

/// Backup outcome across the fleet.
#[derive(Debug, Clone)]
pub struct BackupResults {
    pub total_nodes: usize,
    pub backed_up_nodes: usize,
    pub by_host: ExecutionResults<BackupResult>,
    pub error: Option<NodeFailures>,
}

impl BackupResults {
    /// Every node in `by_host` counts toward the total, including nodes that
    /// never connected. Only error-free nodes count as backed up.
    pub fn new(by_host: ExecutionResults<BackupResult>) -> Self {
        Self {
            total_nodes: by_host.len(),
            backed_up_nodes: by_host.succeeded(),
            error: by_host.errors(),
            by_host,
        }
    }

    /// Human-readable summary with HTML-escaped error text.
    pub fn report(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Total nodes: {}", self.total_nodes);
        let _ = writeln!(out, "Backed up nodes: {}", self.backed_up_nodes);
        let _ = writeln!(out);
        let _ = writeln!(out, "Details:");

        for entry in &self.by_host {
            let _ = writeln!(out, "{}", entry.host);
            if let Some(err) = &entry.error {
                let _ = writeln!(out, "Error:\n{}", escape_html(&err.to_string()));
            }
            if let Some(result) = &entry.value {
                let _ = writeln!(out, "Backup uploaded: {}", result.uploaded);
                let _ = writeln!(out, "Duration: {}", format_duration(result.duration));
                let _ = writeln!(out, "Snapshot tag: {}", result.snapshot_tag);
                let _ = writeln!(
                    out,
                    "Expired backups removed: {}",
                    result
                        .cleanup
                        .removed_remote_backups
                        .iter()
                        .filter(|b| b.removed)
                        .count()
                );
                if let Some(err) = &result.cleanup.remote_error {
                    let _ = writeln!(
                        out,
                        "error while removing expired backups: {}",
                        escape_html(&err.to_string())
                    );
                }
                if let Some(err) = &result.cleanup.local_error {
                    let _ = writeln!(
                        out,
                        "error while removing a snapshot on database node: {}",
                        escape_html(&err.to_string())
                    );
                }
            }
            let _ = writeln!(out);
        }

        out
    }
}
