//! `metadata.yml`, written next to every backup

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const METADATA_FILE_NAME: &str = "metadata.yml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupMetadata {
    pub date_created: DateTime<Utc>,
    pub host: String,
    pub keyspaces: Vec<String>,
    pub snapshot_tag: String,
    pub build_info: BuildInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive: Option<ArchiveMetadata>,
}

/// Version of the tool that produced a backup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildInfo {
    pub version: String,
    pub commit: String,
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveMetadata {
    pub method: String,
    pub options: ArchiveOptions,
}

/// Compressor settings, kept as the strings passed on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveOptions {
    pub compression: String,
    pub threads: String,
}

impl BackupMetadata {
    pub fn to_yaml(&self) -> crate::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn from_yaml(yaml: &str) -> crate::Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn metadata() -> BackupMetadata {
        BackupMetadata {
            date_created: Utc.with_ymd_and_hms(2021, 10, 22, 15, 1, 0).unwrap(),
            host: "test-host".to_string(),
            keyspaces: vec!["a".into(), "b".into(), "c".into()],
            snapshot_tag: "snapshot-tag".to_string(),
            build_info: BuildInfo {
                version: "1.0.0".into(),
                commit: "abcdef".into(),
                date: "2021-10-22".into(),
            },
            archive: Some(ArchiveMetadata {
                method: "pigz".into(),
                options: ArchiveOptions {
                    compression: "1".into(),
                    threads: "2".into(),
                },
            }),
        }
    }

    #[test]
    fn test_yaml_shape() {
        let yaml = metadata().to_yaml().unwrap();
        let value: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();

        assert_eq!(value["dateCreated"].as_str(), Some("2021-10-22T15:01:00Z"));
        assert_eq!(value["host"].as_str(), Some("test-host"));
        assert_eq!(value["keyspaces"][2].as_str(), Some("c"));
        assert_eq!(value["snapshotTag"].as_str(), Some("snapshot-tag"));
        assert_eq!(value["buildInfo"]["date"].as_str(), Some("2021-10-22"));
        assert_eq!(value["archive"]["method"].as_str(), Some("pigz"));
        assert_eq!(value["archive"]["options"]["threads"].as_str(), Some("2"));

        let keys: Vec<&str> = value
            .as_mapping()
            .unwrap()
            .keys()
            .filter_map(|k| k.as_str())
            .collect();
        assert_eq!(
            keys,
            ["dateCreated", "host", "keyspaces", "snapshotTag", "buildInfo", "archive"]
        );
    }

    #[test]
    fn test_archive_omitted_when_disabled() {
        let mut metadata = metadata();
        metadata.archive = None;
        let yaml = metadata.to_yaml().unwrap();
        assert!(!yaml.contains("archive"));
        let parsed = BackupMetadata::from_yaml(&yaml).unwrap();
        assert_eq!(parsed, metadata);
    }
}
