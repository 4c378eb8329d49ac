//! nodetool / cqlsh wrapper

use fleetback_core::channel::shell::{self, quote, quote_if_needed};
use fleetback_core::model::node::NODE_STATUS_OK;
use fleetback_core::model::{RepairResult, Snapshots};
use fleetback_core::parser::{parse_cluster_name, parse_node_status};
use fleetback_core::{Context, DatabaseAdmin, Error, Node, Result};
use async_trait::async_trait;
use std::time::Instant;

pub const SCHEMA_FILE_NAME: &str = "db_schema.cql";

/// Database login passed to `cqlsh`.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

/// Runs the database administration tools on a node.
#[derive(Debug, Clone, Default)]
pub struct ScyllaClient {
    credentials: Credentials,
}

impl ScyllaClient {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    /// `cqlsh <host> [-u user] [-p password]`
    pub(crate) fn cqlsh(&self, node: &Node) -> String {
        let mut command = format!("{} {}", node.info.binaries.cqlsh, node.host());
        if !self.credentials.user.is_empty() {
            command.push_str(&format!(" -u {}", quote_if_needed(&self.credentials.user)));
        }
        if !self.credentials.password.is_empty() {
            command.push_str(&format!(" -p {}", quote_if_needed(&self.credentials.password)));
        }
        command
    }

    pub(crate) fn nodetool(&self, node: &Node, args: &str) -> String {
        format!("{} {}", node.info.binaries.nodetool, args)
    }

    pub(crate) fn export_schema_command(&self, node: &Node, dir: &str) -> String {
        format!(
            "{} -e \"DESC SCHEMA\" > {}/{}",
            self.cqlsh(node),
            dir.trim_end_matches('/'),
            SCHEMA_FILE_NAME
        )
    }

    async fn validate_binaries(&self, ctx: &Context, node: &Node) -> Result<()> {
        let channel = node.channel()?;
        for binary in [&node.info.binaries.cqlsh, &node.info.binaries.nodetool] {
            tracing::debug!(host = node.host(), path = %binary, "[healthcheck] checking binary");
            shell::executable_exists(channel, ctx, binary).await?;
        }
        Ok(())
    }

    /// Refreshes cluster name, datacenter and status from `nodetool`.
    async fn update_node_info(&self, ctx: &Context, node: &mut Node) -> Result<()> {
        let channel = node.channel()?;

        if node.info.cluster_name.is_empty() {
            let output = channel
                .output(ctx, &self.nodetool(node, "describecluster"))
                .await?;
            let name = parse_cluster_name(&output)?;
            node.info.cluster_name = name;
        }

        let channel = node.channel()?;
        let output = channel.output(ctx, &self.nodetool(node, "status")).await?;
        let status = parse_node_status(&output, &node.info.addresses())?;
        node.info.status = status.status;
        node.info.datacenter = status.datacenter;
        Ok(())
    }

    async fn describe_cluster(&self, ctx: &Context, node: &Node) -> Result<()> {
        let command = format!("{} -e \"describe cluster\"", self.cqlsh(node));
        node.channel()?
            .run(ctx, &command)
            .await
            .map_err(|e| e.context(format!("cqlsh is not working on {}", node.host())))
    }
}

#[async_trait]
impl DatabaseAdmin for ScyllaClient {
    async fn healthcheck(&self, ctx: &Context, node: &mut Node) -> Result<()> {
        self.validate_binaries(ctx, node).await?;

        let data_path = node.info.data_path.clone();
        if !shell::directory_exists(node.channel()?, ctx, &data_path).await? {
            return Err(Error::Precondition(format!(
                "data directory {data_path} does not exist"
            )));
        }

        self.update_node_info(ctx, node).await?;
        if node.info.status != NODE_STATUS_OK {
            return Err(Error::Precondition(format!(
                "invalid status on node {}: {}",
                node.host(),
                node.info.status
            )));
        }

        self.describe_cluster(ctx, node).await?;
        tracing::debug!(
            host = node.host(),
            cluster = %node.info.cluster_name,
            datacenter = %node.info.datacenter,
            "[healthcheck] database node is healthy"
        );
        Ok(())
    }

    async fn export_schema(&self, ctx: &Context, node: &Node, dir: &str) -> Result<()> {
        let command = self.export_schema_command(node, dir);
        node.channel()?
            .run(ctx, &command)
            .await
            .map_err(|e| e.context(format!("could not export schema to {dir}")))?;
        tracing::info!(host = node.host(), path = %dir, "Database schema exported");
        Ok(())
    }

    async fn create_snapshot(
        &self,
        ctx: &Context,
        node: &Node,
        tag: &str,
        target_dir: &str,
        keyspaces: &[String],
    ) -> Result<()> {
        self.snapshot(ctx, node, tag, target_dir, keyspaces).await
    }

    async fn remove_snapshot(&self, ctx: &Context, node: &Node, tag: &str) -> Result<()> {
        let command = self.nodetool(node, &format!("clearsnapshot -t {}", quote(tag)));
        node.channel()?
            .run(ctx, &command)
            .await
            .map_err(|e| e.context(format!("could not remove snapshot {tag}")))
    }

    async fn list_snapshots(&self, ctx: &Context, node: &Node) -> Result<Snapshots> {
        self.snapshots(ctx, node).await
    }

    async fn repair(&self, ctx: &Context, node: &Node) -> Result<RepairResult> {
        let started = Instant::now();
        tracing::info!(host = node.host(), "Running nodetool repair");
        let output = node
            .channel()?
            .output(ctx, &self.nodetool(node, "repair --partitioner-range"))
            .await?;
        Ok(RepairResult {
            output,
            duration: started.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetback_core::NodeInfo;
    use fleetback_core::testing::ScriptedChannel;
    use std::sync::Arc;

    const STATUS: &str = "Datacenter: DC1
===============
--  Address     Load     Tokens  Owns  Host ID                               Rack
UN  172.20.0.2  1.1 MB   256     ?     1c4a9f2e-9b77-4d3f-8d9a-0f6f4a1c2b3d  RAC1
DN  172.20.0.3  1.1 MB   256     ?     2d4a9f2e-9b77-4d3f-8d9a-0f6f4a1c2b3d  RAC1
";

    fn node(host: &str, channel: Arc<ScriptedChannel>) -> Node {
        Node::with_channel(NodeInfo::new(host, "/var/lib/scylla/data"), channel)
    }

    fn client() -> ScyllaClient {
        ScyllaClient::new(Credentials {
            user: "root".into(),
            password: "pass".into(),
        })
    }

    #[test]
    fn test_export_schema_command() {
        let node = node("scylla.test", Arc::new(ScriptedChannel::new()));
        assert_eq!(
            client().export_schema_command(&node, "/var/lib/backup/"),
            "cqlsh scylla.test -u root -p pass -e \"DESC SCHEMA\" > /var/lib/backup/db_schema.cql"
        );
    }

    #[tokio::test]
    async fn test_healthcheck_updates_node_info() {
        let channel = Arc::new(
            ScriptedChannel::new()
                .on("describecluster", "Cluster Information:\n\tName: common\n")
                .on("nodetool status", STATUS),
        );
        let mut node = node("172.20.0.2", Arc::clone(&channel));

        client().healthcheck(&Context::new(), &mut node).await.unwrap();
        assert_eq!(node.info.cluster_name, "common");
        assert_eq!(node.info.datacenter, "DC1");
        assert_eq!(node.info.status, "UN");
        assert!(channel.calls().iter().any(|c| c.contains("describe cluster")));
    }

    #[tokio::test]
    async fn test_healthcheck_rejects_down_node() {
        let channel = Arc::new(
            ScriptedChannel::new()
                .on("describecluster", "Cluster Information:\n\tName: common\n")
                .on("nodetool status", STATUS),
        );
        let mut node = node("172.20.0.3", channel);
        let err = client()
            .healthcheck(&Context::new(), &mut node)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid status on node 172.20.0.3: DN");
    }

    #[tokio::test]
    async fn test_healthcheck_requires_data_directory() {
        let channel = Arc::new(ScriptedChannel::new().fail_on("test -d", ""));
        let mut node = node("172.20.0.2", channel);
        let err = client()
            .healthcheck(&Context::new(), &mut node)
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "data directory /var/lib/scylla/data does not exist"
        );
    }

    #[tokio::test]
    async fn test_repair_returns_output() {
        let channel = Arc::new(ScriptedChannel::new().on("repair", "[2021-10-22] Repair completed"));
        let node = node("db1", Arc::clone(&channel));
        let result = client().repair(&Context::new(), &node).await.unwrap();
        assert_eq!(result.output, "[2021-10-22] Repair completed");
        assert_eq!(channel.calls(), ["nodetool repair --partitioner-range"]);
    }
}
