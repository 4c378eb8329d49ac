#![allow(dead_code)]

use async_trait::async_trait;
use fleetback_core::model::{RemoteBackup, RepairResult, Snapshots};
use fleetback_core::{Context, DatabaseAdmin, Error, Node, RemoteStorage, Result};
use std::sync::Mutex;
use std::time::Duration;

/// Database double that records calls and fails snapshots on chosen hosts.
#[derive(Default)]
pub struct FakeDb {
    pub fail_snapshot_on: Vec<String>,
    pub fail_remove_snapshot: bool,
    pub calls: Mutex<Vec<String>>,
}

impl FakeDb {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl DatabaseAdmin for FakeDb {
    async fn healthcheck(&self, _ctx: &Context, _node: &mut Node) -> Result<()> {
        Ok(())
    }

    async fn export_schema(&self, _ctx: &Context, node: &Node, dir: &str) -> Result<()> {
        self.record(format!("{} export_schema {dir}", node.host()));
        Ok(())
    }

    async fn create_snapshot(
        &self,
        _ctx: &Context,
        node: &Node,
        tag: &str,
        target_dir: &str,
        _keyspaces: &[String],
    ) -> Result<()> {
        self.record(format!("{} snapshot {tag} {target_dir}", node.host()));
        if self.fail_snapshot_on.iter().any(|h| h == node.host()) {
            return Err(Error::CommandFailed {
                command: format!("nodetool snapshot -t {tag}"),
                status: Some(2),
                output: "nodetool: Failed to connect to '127.0.0.1:7199'".to_string(),
            });
        }
        Ok(())
    }

    async fn remove_snapshot(&self, _ctx: &Context, node: &Node, tag: &str) -> Result<()> {
        self.record(format!("{} remove_snapshot {tag}", node.host()));
        if self.fail_remove_snapshot {
            return Err(Error::CommandFailed {
                command: format!("nodetool clearsnapshot -t {tag}"),
                status: Some(1),
                output: "nodetool: snapshot is in use".to_string(),
            });
        }
        Ok(())
    }

    async fn list_snapshots(&self, _ctx: &Context, _node: &Node) -> Result<Snapshots> {
        Ok(Snapshots::new())
    }

    async fn repair(&self, _ctx: &Context, _node: &Node) -> Result<RepairResult> {
        Ok(RepairResult {
            output: String::new(),
            duration: Duration::ZERO,
        })
    }
}

/// Storage double holding a fixed set of backup paths.
#[derive(Default)]
pub struct FakeStorage {
    pub backups: Vec<String>,
    pub fail_remove: Vec<String>,
    pub fail_listing: bool,
    pub uploads: Mutex<Vec<(String, String)>>,
    /// Entries of the source directory at upload time, for local uploads.
    pub uploaded_entries: Mutex<Vec<String>>,
    pub removed: Mutex<Vec<String>>,
}

impl FakeStorage {
    pub fn with_backups(paths: &[&str]) -> Self {
        Self {
            backups: paths.iter().map(|p| p.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn uploads(&self) -> Vec<(String, String)> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn removed(&self) -> Vec<String> {
        self.removed.lock().unwrap().clone()
    }

    pub fn uploaded_entries(&self) -> Vec<String> {
        let mut entries = self.uploaded_entries.lock().unwrap().clone();
        entries.sort();
        entries
    }
}

#[async_trait]
impl RemoteStorage for FakeStorage {
    async fn healthcheck(&self, _ctx: &Context, _node: &Node) -> Result<()> {
        Ok(())
    }

    async fn upload(
        &self,
        _ctx: &Context,
        _node: &Node,
        source: &str,
        destination: &str,
    ) -> Result<String> {
        if let Ok(entries) = std::fs::read_dir(source) {
            self.uploaded_entries.lock().unwrap().extend(
                entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.file_name().to_string_lossy().into_owned()),
            );
        }
        self.uploads
            .lock()
            .unwrap()
            .push((source.to_string(), destination.to_string()));
        Ok(format!("s3://backups/{destination}"))
    }

    async fn list_backups(
        &self,
        _ctx: &Context,
        _node: &Node,
        base_path: &str,
    ) -> Result<Vec<RemoteBackup>> {
        if self.fail_listing {
            return Err(Error::CommandFailed {
                command: format!("aws s3 ls s3://backups/{base_path}/"),
                status: Some(255),
                output: "An error occurred (AccessDenied) when calling the ListObjectsV2 operation"
                    .to_string(),
            });
        }
        Ok(self
            .backups
            .iter()
            .filter(|p| p.starts_with(base_path))
            .filter_map(|p| RemoteBackup::from_path(p).ok())
            .collect())
    }

    async fn remove_backup(&self, _ctx: &Context, _node: &Node, path: &str) -> Result<()> {
        if self.fail_remove.iter().any(|p| p == path) {
            return Err(Error::Precondition(format!("access denied: {path}")));
        }
        self.removed.lock().unwrap().push(path.to_string());
        Ok(())
    }
}
