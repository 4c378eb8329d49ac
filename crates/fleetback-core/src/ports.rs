//! Capabilities the backup workflow needs from the database and remote storage.

use crate::context::Context;
use crate::error::Result;
use crate::model::backup::RemoteBackup;
use crate::model::node::Node;
use crate::model::repair::RepairResult;
use crate::model::snapshot::Snapshots;
use async_trait::async_trait;

/// Administration of the database process on a node.
#[async_trait]
pub trait DatabaseAdmin: Send + Sync {
    /// Validates the node and refreshes its discovered info (cluster name,
    /// datacenter, status).
    async fn healthcheck(&self, ctx: &Context, node: &mut Node) -> Result<()>;

    /// Writes the schema to `<dir>/db_schema.cql`.
    async fn export_schema(&self, ctx: &Context, node: &Node, dir: &str) -> Result<()>;

    /// Takes snapshot `tag` (of `keyspaces`, or everything) and copies it into `target_dir`.
    async fn create_snapshot(
        &self,
        ctx: &Context,
        node: &Node,
        tag: &str,
        target_dir: &str,
        keyspaces: &[String],
    ) -> Result<()>;

    async fn remove_snapshot(&self, ctx: &Context, node: &Node, tag: &str) -> Result<()>;

    async fn list_snapshots(&self, ctx: &Context, node: &Node) -> Result<Snapshots>;

    async fn repair(&self, ctx: &Context, node: &Node) -> Result<RepairResult>;
}

/// Off-box storage for backups.
#[async_trait]
pub trait RemoteStorage: Send + Sync {
    async fn healthcheck(&self, ctx: &Context, node: &Node) -> Result<()>;

    /// Copies the local `source` directory to `destination`, returning its URL.
    async fn upload(&self, ctx: &Context, node: &Node, source: &str, destination: &str)
    -> Result<String>;

    async fn list_backups(&self, ctx: &Context, node: &Node, base_path: &str)
    -> Result<Vec<RemoteBackup>>;

    async fn remove_backup(&self, ctx: &Context, node: &Node, path: &str) -> Result<()>;
}
