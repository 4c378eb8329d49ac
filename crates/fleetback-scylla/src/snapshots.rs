//! Taking, moving and listing snapshots

use crate::client::ScyllaClient;
use fleetback_core::channel::shell::quote;
use fleetback_core::model::Snapshots;
use fleetback_core::parser::parse_snapshots;
use fleetback_core::{Context, Node, Result};

impl ScyllaClient {
    /// Takes snapshot `tag` and copies its directories from the data path into `target_dir`.
    ///
    /// A leftover snapshot with the same tag is removed first.
    pub(crate) async fn snapshot(
        &self,
        ctx: &Context,
        node: &Node,
        tag: &str,
        target_dir: &str,
        keyspaces: &[String],
    ) -> Result<()> {
        let existing = self.snapshots(ctx, node).await?;
        if existing.contains(tag) {
            tracing::info!(host = node.host(), tag, "Removing an existing snapshot with the same tag");
            fleetback_core::DatabaseAdmin::remove_snapshot(self, ctx, node, tag).await?;
        }

        let channel = node.channel()?;
        channel
            .run(ctx, &self.snapshot_command(node, tag, keyspaces))
            .await
            .map_err(|e| e.context(format!("could not create snapshot {tag}")))?;
        tracing::info!(host = node.host(), tag, "Snapshot created");

        channel
            .run(ctx, &move_snapshot_command(&node.info.data_path, tag, target_dir))
            .await
            .map_err(|e| e.context(format!("could not move snapshot {tag} to {target_dir}")))?;
        tracing::info!(host = node.host(), tag, path = %target_dir, "Snapshot moved");
        Ok(())
    }

    pub(crate) async fn snapshots(&self, ctx: &Context, node: &Node) -> Result<Snapshots> {
        let output = node
            .channel()?
            .output(ctx, &self.nodetool(node, "listsnapshots"))
            .await
            .map_err(|e| e.context("could not list snapshots"))?;
        Ok(parse_snapshots(&output))
    }

    fn snapshot_command(&self, node: &Node, tag: &str, keyspaces: &[String]) -> String {
        let mut args = format!("snapshot -t {}", quote(tag));
        for keyspace in keyspaces {
            args.push(' ');
            args.push_str(&quote(keyspace));
        }
        self.nodetool(node, &args)
    }
}

/// Copies every `snapshots/<tag>` directory below `data_dir` into `target_dir`,
/// keeping the `<keyspace>/<table>/snapshots/<tag>` layout.
fn move_snapshot_command(data_dir: &str, tag: &str, target_dir: &str) -> String {
    format!(
        "cd {} && find . -type d | grep -i {} | xargs -I{{}} cp --parents -r {{}} {}",
        quote(data_dir),
        quote(&format!("snapshots/{tag}")),
        quote(target_dir)
    )
}
