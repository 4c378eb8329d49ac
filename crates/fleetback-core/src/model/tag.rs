//! Snapshot tags and dated backup directories

use chrono::{DateTime, Utc};

/// `MM-DD-YYYY-HH-mm`, used in both snapshot tags and remote paths.
pub const BACKUP_DATE_FORMAT: &str = "%m-%d-%Y-%H-%M";

/// `<short-domain>-<MM-DD-YYYY-HH-mm>`
pub fn new_snapshot_tag(short_domain_name: &str, started: DateTime<Utc>) -> String {
    format!("{}-{}", short_domain_name, backup_date_to_path(started))
}

pub fn backup_date_to_path(date: DateTime<Utc>) -> String {
    date.format(BACKUP_DATE_FORMAT).to_string()
}
