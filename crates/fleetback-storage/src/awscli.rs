//! aws CLI wrapper
//!
//! Wraps `aws s3` subcommands for uploading, listing and removing backups.

use fleetback_core::channel::shell::quote;
use fleetback_core::model::RemoteBackup;
use fleetback_core::parser::parse_directory_listing;
use fleetback_core::{CommandChannel, Context, Error, Node, RemoteStorage, Result};
use async_trait::async_trait;
use futures_util::future::BoxFuture;

/// Backups live two levels below a base path: `<base>/<host>/<date>`.
const LISTING_DEPTH: usize = 2;

#[derive(Debug, Clone)]
pub struct AwsCliOptions {
    /// Skips the healthcheck; set when uploads are disabled.
    pub disabled: bool,
    pub binary: String,
    pub bucket: String,
    pub endpoint_url: Option<String>,
    pub profile: Option<String>,
}

impl Default for AwsCliOptions {
    fn default() -> Self {
        Self {
            disabled: false,
            binary: "aws".to_string(),
            bucket: String::new(),
            endpoint_url: None,
            profile: None,
        }
    }
}

/// aws CLI wrapper
#[derive(Debug, Clone)]
pub struct AwsCli {
    options: AwsCliOptions,
}

impl AwsCli {
    pub fn new(mut options: AwsCliOptions) -> Self {
        if options.binary.is_empty() {
            options.binary = "aws".to_string();
        }
        options.bucket = options.bucket.trim_matches('/').to_string();
        Self { options }
    }

    /// `s3://<bucket>/<path>`
    pub fn url(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            format!("s3://{}", self.options.bucket)
        } else {
            format!("s3://{}/{}", self.options.bucket, path)
        }
    }

    /// `aws s3 <args> [--endpoint-url ..] [--profile ..]`
    fn command(&self, args: &str) -> String {
        let mut command = format!("{} s3 {}", self.options.binary, args);
        if let Some(endpoint) = self.options.endpoint_url.as_deref().filter(|e| !e.is_empty()) {
            command.push_str(&format!(" --endpoint-url {}", quote(endpoint)));
        }
        if let Some(profile) = self.options.profile.as_deref().filter(|p| !p.is_empty()) {
            command.push_str(&format!(" --profile {}", quote(profile)));
        }
        command
    }

    pub(crate) fn sync_command(&self, source: &str, destination: &str) -> String {
        self.command(&format!(
            "sync {} {}",
            quote(source),
            quote(&self.url(destination))
        ))
    }

    /// Directories directly under `path`. A missing prefix lists as empty.
    async fn list_directories(
        &self,
        ctx: &Context,
        channel: &dyn CommandChannel,
        path: &str,
    ) -> Result<Vec<String>> {
        let command = self.command(&format!("ls {}", quote(&format!("{}/", self.url(path)))));
        match channel.output(ctx, &command).await {
            Ok(output) => Ok(parse_directory_listing(path, &output)),
            // `aws s3 ls` exits with 1 and no output when nothing matches the prefix
            Err(Error::CommandFailed { output, .. }) if output.trim().is_empty() => Ok(Vec::new()),
            Err(err) => Err(err.context(format!("could not list files at {path}"))),
        }
    }

    /// Walks down to `depth` levels, returning leaf directories.
    ///
    /// Descent stops early at directories that already name a backup.
    fn list_recursive<'a>(
        &'a self,
        ctx: &'a Context,
        channel: &'a dyn CommandChannel,
        path: String,
        depth: usize,
    ) -> BoxFuture<'a, Result<Vec<String>>> {
        Box::pin(async move {
            if let Some(reason) = ctx.err() {
                return Err(reason.into());
            }

            let dirs = self.list_directories(ctx, channel, &path).await?;
            if depth == 0 {
                return Ok(dirs);
            }

            let mut leaves = Vec::new();
            for dir in dirs {
                if RemoteBackup::from_path(&dir).is_ok() {
                    leaves.push(dir);
                    continue;
                }
                let children = self.list_recursive(ctx, channel, dir.clone(), depth - 1).await?;
                if children.is_empty() {
                    leaves.push(dir);
                } else {
                    leaves.extend(children);
                }
            }
            Ok(leaves)
        })
    }
}

#[async_trait]
impl RemoteStorage for AwsCli {
    async fn healthcheck(&self, ctx: &Context, node: &Node) -> Result<()> {
        if self.options.disabled {
            return Ok(());
        }
        if self.options.bucket.is_empty() {
            return Err(Error::Precondition("[healthcheck] bucket is required".to_string()));
        }

        tracing::debug!(host = node.host(), path = %self.options.binary, "[healthcheck] checking aws cli binary");
        fleetback_core::channel::shell::executable_exists(node.channel()?, ctx, &self.options.binary)
            .await
    }

    async fn upload(
        &self,
        ctx: &Context,
        node: &Node,
        source: &str,
        destination: &str,
    ) -> Result<String> {
        let url = self.url(destination);
        node.channel()?
            .run(ctx, &self.sync_command(source, destination))
            .await
            .map_err(|e| e.context(format!("could not sync files to {url}")))?;
        tracing::info!(host = node.host(), url = %url, "Backup uploaded");
        Ok(url)
    }

    async fn list_backups(
        &self,
        ctx: &Context,
        node: &Node,
        base_path: &str,
    ) -> Result<Vec<RemoteBackup>> {
        let channel = node.channel()?;
        let paths = self
            .list_recursive(ctx, channel, base_path.to_string(), LISTING_DEPTH)
            .await
            .inspect_err(|err| tracing::error!(host = node.host(), error = %err, "Could not list backups"))?;

        Ok(paths
            .iter()
            .filter_map(|path| RemoteBackup::from_path(path).ok())
            .collect())
    }

    async fn remove_backup(&self, ctx: &Context, node: &Node, path: &str) -> Result<()> {
        let command = self.command(&format!("rm {} --recursive", quote(&self.url(path))));
        node.channel()?
            .run(ctx, &command)
            .await
            .map_err(|e| e.context(format!("could not remove a backup at {path}")))?;
        tracing::info!(host = node.host(), path, "Backup removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetback_core::NodeInfo;
    use fleetback_core::model::tag::backup_date_to_path;
    use fleetback_core::testing::ScriptedChannel;
    use std::sync::Arc;

    fn node(channel: Arc<ScriptedChannel>) -> Node {
        Node::with_channel(NodeInfo::new("db1", ""), channel)
    }

    fn aws(options: AwsCliOptions) -> AwsCli {
        AwsCli::new(AwsCliOptions {
            bucket: "/backups/".into(),
            ..options
        })
    }

    #[test]
    fn test_sync_command_with_flags() {
        let cli = aws(AwsCliOptions {
            endpoint_url: Some("https://s3.example.com".into()),
            profile: Some("backup".into()),
            ..Default::default()
        });
        assert_eq!(
            cli.sync_command("/var/lib/scylla/backup", "common/db1/10-22-2021-15-01"),
            "aws s3 sync '/var/lib/scylla/backup' 's3://backups/common/db1/10-22-2021-15-01' \
             --endpoint-url 'https://s3.example.com' --profile 'backup'"
        );
        assert_eq!(cli.url(""), "s3://backups");
    }

    #[tokio::test]
    async fn test_list_backups_walks_two_levels() {
        let channel = Arc::new(ScriptedChannel::new().on_sequence(
            "s3 ls",
            &[
                "PRE dir-1/\nPRE dir 2 with spaces/",
                "",
                "PRE common-scylla1-dc1/",
                "PRE 09-07-2021-10-29/",
            ],
        ));
        let node = node(Arc::clone(&channel));

        let backups = aws(AwsCliOptions::default())
            .list_backups(&Context::new(), &node, "")
            .await
            .unwrap();

        assert_eq!(backups.len(), 1);
        assert_eq!(
            backups[0].path,
            "/dir 2 with spaces/common-scylla1-dc1/09-07-2021-10-29"
        );
        assert_eq!(backups[0].host_prefix, "common-scylla1-dc1");
        assert_eq!(
            backup_date_to_path(backups[0].date_created),
            "09-07-2021-10-29"
        );
        assert_eq!(channel.calls().len(), 4);
        assert_eq!(channel.calls()[0], "aws s3 ls 's3://backups/'");
    }

    #[tokio::test]
    async fn test_list_backups_stops_at_backup_directories() {
        let channel = Arc::new(ScriptedChannel::new().on(
            "s3 ls",
            "PRE 09-07-2021-10-29/\nPRE 09-08-2021-10-29/\n",
        ));
        let node = node(Arc::clone(&channel));

        let backups = aws(AwsCliOptions::default())
            .list_backups(&Context::new(), &node, "common/db1")
            .await
            .unwrap();

        assert_eq!(backups.len(), 2);
        assert_eq!(backups[1].path, "common/db1/09-08-2021-10-29");
        assert_eq!(channel.calls(), ["aws s3 ls 's3://backups/common/db1/'"]);
    }

    #[tokio::test]
    async fn test_missing_prefix_lists_nothing() {
        let channel = Arc::new(ScriptedChannel::new().fail_on("s3 ls", ""));
        let backups = aws(AwsCliOptions::default())
            .list_backups(&Context::new(), &node(channel), "common/db1")
            .await
            .unwrap();
        assert!(backups.is_empty());
    }

    #[tokio::test]
    async fn test_healthcheck_requires_bucket() {
        let cli = AwsCli::new(AwsCliOptions::default());
        let node = node(Arc::new(ScriptedChannel::new()));
        let err = cli.healthcheck(&Context::new(), &node).await.unwrap_err();
        assert_eq!(err.to_string(), "[healthcheck] bucket is required");

        let disabled = AwsCli::new(AwsCliOptions {
            disabled: true,
            ..Default::default()
        });
        disabled.healthcheck(&Context::new(), &node).await.unwrap();
    }

    #[tokio::test]
    async fn test_remove_backup() {
        let channel = Arc::new(ScriptedChannel::new());
        aws(AwsCliOptions::default())
            .remove_backup(&Context::new(), &node(Arc::clone(&channel)), "common/db1/09-07-2021-10-29")
            .await
            .unwrap();
        assert_eq!(
            channel.calls(),
            ["aws s3 rm 's3://backups/common/db1/09-07-2021-10-29' --recursive"]
        );
    }
}
