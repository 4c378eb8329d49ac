//! Fleet registry
//!
//! Owns the nodes of a cluster, binds a command channel to each of them and
//! fans caller-supplied operations out to every node.

use crate::channel::ChannelProvider;
use crate::context::Context;
use crate::dns;
use crate::model::node::{Binaries, DEFAULT_DATA_PATH, Node, NodeInfo};
use crate::result::{ExecutionResult, ExecutionResults};
use futures_util::StreamExt;
use futures_util::future::BoxFuture;
use futures_util::stream::FuturesUnordered;
use std::collections::HashSet;
use std::sync::Arc;

/// Future returned by a per-node operation.
pub type NodeFuture<'a, T> = BoxFuture<'a, ExecutionResult<T>>;

#[derive(Debug, Clone)]
pub struct FleetOptions {
    pub hosts: Vec<String>,
    pub data_path: String,
    pub cluster_name: String,
    pub binaries: Binaries,
    /// Look up missing addresses and domain names while connecting.
    pub resolve_dns: bool,
}

impl Default for FleetOptions {
    fn default() -> Self {
        Self {
            hosts: Vec::new(),
            data_path: DEFAULT_DATA_PATH.to_string(),
            cluster_name: String::new(),
            binaries: Binaries::default(),
            resolve_dns: true,
        }
    }
}

pub struct Fleet {
    provider: Arc<dyn ChannelProvider>,
    nodes: Vec<Node>,
    resolve_dns: bool,
}

impl Fleet {
    /// Builds one node per distinct host, keeping the configured order.
    pub fn new(options: FleetOptions, provider: Arc<dyn ChannelProvider>) -> Self {
        let mut seen = HashSet::new();
        let mut nodes = Vec::with_capacity(options.hosts.len());

        for host in options.hosts {
            if !seen.insert(host.clone()) {
                tracing::warn!(host = %host, "Duplicate host in cluster configuration, ignoring");
                continue;
            }
            let mut info = NodeInfo::new(host, options.data_path.clone());
            info.cluster_name = options.cluster_name.clone();
            info.binaries = options.binaries.clone();
            nodes.push(Node::new(info));
        }

        Self {
            provider,
            nodes,
            resolve_dns: options.resolve_dns,
        }
    }

    pub fn size(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Resolves every node and binds its channel, in parallel.
    ///
    /// A node that fails to connect keeps the error and is skipped by every
    /// later `run` and `run_parallel`, which report that error for it.
    pub async fn connect(&mut self, ctx: &Context) -> ExecutionResults<()> {
        let provider = &*self.provider;
        let resolve_dns = self.resolve_dns;
        let count = self.nodes.len();

        let mut pending: FuturesUnordered<_> = self
            .nodes
            .iter_mut()
            .enumerate()
            .map(|(index, node)| async move {
                if resolve_dns {
                    dns::resolve(ctx, &mut node.info).await;
                }

                let host = node.host().to_string();
                let result = match provider.channel_for(ctx, &host).await {
                    Ok(channel) => {
                        node.attach(channel);
                        ExecutionResult::ok(())
                    }
                    Err(err) => {
                        tracing::warn!(host = %host, error = %err, "Could not connect to node");
                        node.fail_connection(err.clone());
                        ExecutionResult::err(err)
                    }
                };
                (index, result.tagged(host))
            })
            .collect();

        let mut finished = Vec::with_capacity(count);
        while let Some(done) = pending.next().await {
            finished.push(done);
        }
        in_order(finished)
    }

    /// Runs `op` on one node after another in configured order.
    ///
    /// Stops after the first node whose result carries an error, or once `ctx`
    /// is done. Nodes that failed to connect are skipped with their connection
    /// error recorded.
    pub async fn run<T, F>(&mut self, ctx: &Context, op: F) -> ExecutionResults<T>
    where
        F: for<'a> Fn(&'a Context, &'a mut Node) -> NodeFuture<'a, T>,
    {
        let mut results = Vec::with_capacity(self.nodes.len());

        for node in self.nodes.iter_mut() {
            let host = node.host().to_string();
            if let Some(err) = node.connection_error() {
                results.push(ExecutionResult::err(err.clone()).tagged(host));
                continue;
            }

            let result = op(ctx, node).await.tagged(host);
            let failed = !result.is_ok();
            results.push(result);
            if failed || ctx.err().is_some() {
                break;
            }
        }

        ExecutionResults::from_ordered(results)
    }

    /// Runs `op` on every node concurrently and waits for all of them.
    ///
    /// Never stops early: each node's result, failed or not, is collected.
    pub async fn run_parallel<T, F>(&mut self, ctx: &Context, op: F) -> ExecutionResults<T>
    where
        F: for<'a> Fn(&'a Context, &'a mut Node) -> NodeFuture<'a, T>,
    {
        let op = &op;
        let mut finished = Vec::with_capacity(self.nodes.len());
        let mut pending = FuturesUnordered::new();

        for (index, node) in self.nodes.iter_mut().enumerate() {
            if let Some(err) = node.connection_error() {
                finished.push((index, ExecutionResult::err(err.clone()).tagged(node.host())));
                continue;
            }
            pending.push(async move {
                let host = node.host().to_string();
                (index, op(ctx, node).await.tagged(host))
            });
        }

        while let Some(done) = pending.next().await {
            finished.push(done);
        }
        in_order(finished)
    }

    /// Releases every session opened by the channel provider.
    pub async fn close(&self, ctx: &Context) {
        self.provider.close(ctx).await;
    }
}

fn in_order<T>(mut finished: Vec<(usize, ExecutionResult<T>)>) -> ExecutionResults<T> {
    finished.sort_by_key(|(index, _)| *index);
    ExecutionResults::from_ordered(finished.into_iter().map(|(_, r)| r).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{CommandChannel, LocalChannel};
    use crate::error::Error;
    use crate::testing::{ScriptedChannel, StaticProvider};
    use std::time::{Duration, Instant};

    fn fleet(hosts: &[&str], provider: StaticProvider) -> Fleet {
        Fleet::new(
            FleetOptions {
                hosts: hosts.iter().map(|h| h.to_string()).collect(),
                cluster_name: "common".to_string(),
                resolve_dns: false,
                ..Default::default()
            },
            Arc::new(provider),
        )
    }

    fn scripted(hosts: &[&str]) -> StaticProvider {
        hosts.iter().fold(StaticProvider::new(), |p, h| {
            p.with_channel(h, Arc::new(ScriptedChannel::new()))
        })
    }

    fn fail_on(bad: &'static str) -> impl for<'b> Fn(&'b Context, &'b mut Node) -> NodeFuture<'b, String> {
        move |_ctx, node| {
            Box::pin(async move {
                if node.host() == bad {
                    ExecutionResult::err(Error::Precondition(format!("{bad} is broken")))
                } else {
                    ExecutionResult::ok(node.info.remote_storage_path())
                }
            })
        }
    }

    #[tokio::test]
    async fn test_duplicate_hosts_are_ignored() {
        let fleet = fleet(&["db1", "db2", "db1"], scripted(&["db1", "db2"]));
        assert_eq!(fleet.size(), 2);
        assert_eq!(fleet.nodes()[0].info.cluster_name, "common");
    }

    #[tokio::test]
    async fn test_run_stops_at_first_failure() {
        let hosts = ["db1", "db2", "db3", "db4"];
        let mut fleet = fleet(&hosts, scripted(&hosts));
        let ctx = Context::new();
        fleet.connect(&ctx).await;

        let results = fleet.run(&ctx, fail_on("db3")).await;
        assert_eq!(results.len(), 3);
        assert_eq!(
            results.get("db1").and_then(|r| r.value.clone()).as_deref(),
            Some("common/db1")
        );
        assert!(results.get("db3").unwrap().error.is_some());
        assert!(results.get("db4").is_none());
    }

    #[tokio::test]
    async fn test_run_stops_once_context_is_done() {
        let hosts = ["db1", "db2", "db3"];
        let mut fleet = fleet(&hosts, scripted(&hosts));
        let ctx = Context::new();
        fleet.connect(&ctx).await;

        let visited = std::sync::Mutex::new(Vec::new());
        let results = fleet
            .run(&ctx, |ctx, node| {
                visited.lock().unwrap().push(node.host().to_string());
                Box::pin(async move {
                    ctx.cancel();
                    ExecutionResult::ok(node.host().to_string())
                })
            })
            .await;

        assert_eq!(results.len(), 1);
        assert!(results.get("db1").unwrap().is_ok());
        assert!(results.get("db2").is_none());
        assert_eq!(*visited.lock().unwrap(), vec!["db1"]);
    }

    #[tokio::test]
    async fn test_run_parallel_never_stops_early() {
        let hosts = ["db1", "db2", "db3", "db4"];
        let mut fleet = fleet(&hosts, scripted(&hosts));
        let ctx = Context::new();
        fleet.connect(&ctx).await;

        let results = fleet.run_parallel(&ctx, fail_on("db1")).await;
        assert_eq!(results.len(), 4);
        assert_eq!(results.succeeded(), 3);
        let hosts_in_order: Vec<&str> = results.iter().map(|r| r.host.as_str()).collect();
        assert_eq!(hosts_in_order, hosts);
    }

    #[tokio::test]
    async fn test_connection_errors_are_reported_per_node() {
        let provider = scripted(&["db1"]).with_failure(
            "db2",
            Error::Connection {
                host: "db2".into(),
                user: "root".into(),
                reason: "no route to host".into(),
            },
        );
        let mut fleet = fleet(&["db1", "db2"], provider);
        let ctx = Context::new();

        let connected = fleet.connect(&ctx).await;
        assert_eq!(connected.succeeded(), 1);
        assert!(!fleet.nodes()[1].is_connected());

        let results = fleet.run(&ctx, fail_on("none")).await;
        assert_eq!(results.len(), 2);
        assert!(matches!(
            results.get("db2").unwrap().error,
            Some(Error::Connection { .. })
        ));

        let results = fleet.run_parallel(&ctx, fail_on("none")).await;
        let failures = results.errors().unwrap();
        assert_eq!(failures.len(), 1);
        assert!(failures.to_string().contains("db2: could not create SSH connection"));
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_every_node() {
        let hosts = ["db1", "db2", "db3"];
        let provider = hosts.iter().fold(StaticProvider::new(), |p, h| {
            p.with_channel(h, Arc::new(LocalChannel::default()))
        });
        let mut fleet = fleet(&hosts, provider);
        let ctx = Context::new();
        fleet.connect(&ctx).await;

        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            canceller.cancel();
        });

        let started = Instant::now();
        let results = fleet
            .run_parallel(&ctx, |ctx, node| {
                Box::pin(async move {
                    let result = match node.channel() {
                        Ok(channel) => channel.run(ctx, "sleep 10").await,
                        Err(err) => Err(err),
                    };
                    ExecutionResult::from(result)
                })
            })
            .await;

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.error.as_ref().is_some_and(Error::is_interrupted)));
        assert_eq!(results.errors().unwrap().len(), 3);
    }
}
