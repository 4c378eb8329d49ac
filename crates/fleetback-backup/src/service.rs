//! Backup workflow on a single node

use crate::archive;
use chrono::Utc;
use fleetback_core::channel::shell;
use fleetback_core::model::metadata::METADATA_FILE_NAME;
use fleetback_core::model::tag::{backup_date_to_path, new_snapshot_tag};
use fleetback_core::model::{ArchiveMetadata, BackupMetadata, BackupResult, BuildInfo, CleanupResult};
use fleetback_core::{Context, DatabaseAdmin, Node, RemoteStorage, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const DEFAULT_LOCAL_PATH: &str = "/var/lib/scylla/backup";

#[derive(Debug, Clone)]
pub struct BackupOptions {
    /// Generated from the host and start time when empty.
    pub snapshot_tag: String,
    /// Staging directory on the database node.
    pub local_path: String,
    /// Empty means every keyspace.
    pub keyspaces: Vec<String>,
    pub disable_upload: bool,
    /// Remove the snapshot and staging files after upload.
    pub cleanup_local: bool,
    /// Remove expired backups from remote storage after upload.
    pub cleanup_remote: bool,
    /// How long backups are kept in remote storage. Zero keeps them forever.
    pub retention: Duration,
    pub archive: Option<ArchiveMetadata>,
    pub build_info: BuildInfo,
}

impl Default for BackupOptions {
    fn default() -> Self {
        Self {
            snapshot_tag: String::new(),
            local_path: DEFAULT_LOCAL_PATH.to_string(),
            keyspaces: Vec::new(),
            disable_upload: false,
            cleanup_local: false,
            cleanup_remote: false,
            retention: Duration::ZERO,
            archive: None,
            build_info: BuildInfo::default(),
        }
    }
}

pub struct BackupService {
    pub(crate) options: BackupOptions,
    pub(crate) db: Arc<dyn DatabaseAdmin>,
    pub(crate) storage: Arc<dyn RemoteStorage>,
}

fn checkpoint(ctx: &Context) -> Result<()> {
    match ctx.err() {
        Some(reason) => Err(reason.into()),
        None => Ok(()),
    }
}

impl BackupService {
    pub fn new(
        mut options: BackupOptions,
        db: Arc<dyn DatabaseAdmin>,
        storage: Arc<dyn RemoteStorage>,
    ) -> Self {
        let trimmed = options.local_path.trim_end_matches('/');
        options.local_path = if trimmed.is_empty() {
            DEFAULT_LOCAL_PATH.to_string()
        } else {
            trimmed.to_string()
        };
        if options.archive.as_ref().is_some_and(|a| a.method.is_empty()) {
            options.archive = None;
        }
        Self { options, db, storage }
    }

    pub fn options(&self) -> &BackupOptions {
        &self.options
    }

    /// Makes sure the staging directory exists on the node.
    pub async fn healthcheck(&self, ctx: &Context, node: &Node) -> Result<()> {
        tracing::debug!(host = node.host(), path = %self.options.local_path, "[healthcheck] checking backup directory");
        let channel = node.channel()?;
        if !shell::directory_exists(channel, ctx, &self.options.local_path).await? {
            shell::create_directory(channel, ctx, &self.options.local_path)
                .await
                .map_err(|e| {
                    e.context(format!(
                        "directory {} does not exist and could not be created",
                        self.options.local_path
                    ))
                })?;
        }
        Ok(())
    }

    /// Backs up one node. Failures are recorded in the result, which always
    /// carries the time spent.
    pub async fn backup(&self, ctx: &Context, node: &Node) -> BackupResult {
        let clock = Instant::now();
        let mut result = BackupResult::new(Utc::now());
        result.keyspaces = self.options.keyspaces.clone();
        result.snapshot_tag = if self.options.snapshot_tag.is_empty() {
            new_snapshot_tag(node.info.short_domain_name(), result.date_started)
        } else {
            self.options.snapshot_tag.clone()
        };

        tracing::info!(host = node.host(), tag = %result.snapshot_tag, "Starting backup");
        match self.run_backup(ctx, node, &mut result).await {
            Ok(()) => tracing::info!(host = node.host(), uploaded = result.uploaded, "Backup finished"),
            Err(err) => {
                tracing::error!(host = node.host(), error = %err, "Backup failed");
                result.error = Some(err);
            }
        }

        result.duration = clock.elapsed();
        result
    }

    async fn run_backup(&self, ctx: &Context, node: &Node, result: &mut BackupResult) -> Result<()> {
        self.export_snapshot(ctx, node, &result.snapshot_tag).await?;

        let metadata = BackupMetadata {
            date_created: Utc::now(),
            host: node.host().to_string(),
            keyspaces: self.options.keyspaces.clone(),
            snapshot_tag: result.snapshot_tag.clone(),
            build_info: self.options.build_info.clone(),
            archive: self.options.archive.clone(),
        };
        self.write_metadata(ctx, node, &metadata).await?;
        checkpoint(ctx)?;

        if self.options.disable_upload {
            return Ok(());
        }

        let remote_path = format!(
            "{}/{}",
            node.info.remote_storage_path(),
            backup_date_to_path(result.date_started)
        );
        self.storage
            .upload(ctx, node, &self.options.local_path, &remote_path)
            .await?;
        checkpoint(ctx)?;

        result.uploaded = true;
        result.cleanup = self.cleanup(ctx, node, &result.snapshot_tag).await;
        Ok(())
    }

    /// Stages a fresh snapshot and the schema in the local path.
    async fn export_snapshot(&self, ctx: &Context, node: &Node, tag: &str) -> Result<()> {
        let channel = node.channel()?;
        let local_path = &self.options.local_path;
        let data_dir = format!("{local_path}/data");

        shell::ensure_directory_is_empty(channel, ctx, local_path)
            .await
            .map_err(|e| e.context(format!("directory {local_path} does not exist or not empty")))?;
        shell::create_directory(channel, ctx, &data_dir)
            .await
            .map_err(|e| e.context(format!("could not create {data_dir}")))?;
        checkpoint(ctx)?;

        self.db.export_schema(ctx, node, local_path).await?;
        checkpoint(ctx)?;

        self.db
            .create_snapshot(ctx, node, tag, &data_dir, &self.options.keyspaces)
            .await?;
        checkpoint(ctx)?;

        if let Some(archive) = &self.options.archive {
            archive::compress(ctx, channel, local_path, archive).await?;
            tracing::info!(host = node.host(), method = %archive.method, "Backup archived");
        }
        Ok(())
    }

    async fn write_metadata(&self, ctx: &Context, node: &Node, metadata: &BackupMetadata) -> Result<()> {
        let path = format!("{}/{}", self.options.local_path, METADATA_FILE_NAME);
        let yaml = metadata.to_yaml()?;
        node.channel()?
            .write_file(ctx, &path, yaml.as_bytes())
            .await
            .map_err(|e| e.context(format!("could not write metadata to {path}")))
    }

    /// Post-upload cleanup. Never fails the backup: errors are recorded.
    pub async fn cleanup(&self, ctx: &Context, node: &Node, tag: &str) -> CleanupResult {
        let mut result = CleanupResult::default();

        if self.options.cleanup_local {
            result.local_error = self.cleanup_local(ctx, node, tag).await.err();
        }

        if self.options.cleanup_remote {
            match self.cleanup_expired_backups(ctx, node, Utc::now()).await {
                Ok(removed) => result.removed_remote_backups = removed,
                Err(err) => result.remote_error = Some(err),
            }
        }

        result
    }

    async fn cleanup_local(&self, ctx: &Context, node: &Node, tag: &str) -> Result<()> {
        match self.db.remove_snapshot(ctx, node, tag).await {
            Ok(()) => tracing::info!(host = node.host(), tag, "Database snapshot removed"),
            Err(err) => tracing::warn!(host = node.host(), tag, error = %err, "Could not remove database snapshot"),
        }

        let channel = node.channel()?;
        match shell::ensure_directory_is_empty(channel, ctx, &self.options.local_path).await {
            Ok(()) => {
                tracing::info!(host = node.host(), "Local backup directory removed");
                Ok(())
            }
            Err(err) => {
                tracing::error!(host = node.host(), error = %err, "Could not remove local backup directory");
                Err(err)
            }
        }
    }
}

impl std::fmt::Debug for BackupService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackupService")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
