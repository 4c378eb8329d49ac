//! Remote backup retention

use crate::service::BackupService;
use chrono::{DateTime, Utc};
use fleetback_core::model::RemoteBackup;
use fleetback_core::{Context, Node, Result};

impl BackupService {
    /// Backups of this node in remote storage older than the retention period.
    pub async fn list_expired_backups(
        &self,
        ctx: &Context,
        node: &Node,
        now: DateTime<Utc>,
    ) -> Result<Vec<RemoteBackup>> {
        let backups = self
            .storage
            .list_backups(ctx, node, &node.info.remote_storage_path())
            .await?;

        Ok(backups
            .into_iter()
            .filter(|b| b.is_expired(now, self.options.retention))
            .collect())
    }

    /// Removes every expired backup of this node.
    ///
    /// One failed removal does not stop the others; each entry records
    /// whether it was removed and why not.
    pub async fn cleanup_expired_backups(
        &self,
        ctx: &Context,
        node: &Node,
        now: DateTime<Utc>,
    ) -> Result<Vec<RemoteBackup>> {
        let mut expired = self.list_expired_backups(ctx, node, now).await?;

        for backup in expired.iter_mut() {
            match self.storage.remove_backup(ctx, node, &backup.path).await {
                Ok(()) => backup.removed = true,
                Err(err) => {
                    tracing::warn!(host = node.host(), path = %backup.path, error = %err, "Could not remove expired backup");
                    backup.remove_error = Some(err);
                }
            }
        }

        Ok(expired)
    }
}
