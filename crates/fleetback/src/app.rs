//! Cluster-wide operations built on the fleet registry

use crate::notifier::Notifier;
use chrono::Utc;
use fleetback_backup::BackupService;
use fleetback_core::model::{BackupResults, RemoteBackup, RepairResult, RepairResults, Snapshots};
use fleetback_core::{
    Context, DatabaseAdmin, Error, ExecutionResult, ExecutionResults, Fleet, NodeFailures,
    RemoteStorage,
};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Values that succeeded, keyed by host, plus the aggregated failures.
pub type ByHost<T> = (BTreeMap<String, T>, Option<NodeFailures>);

pub struct App {
    fleet: Fleet,
    db: Arc<dyn DatabaseAdmin>,
    storage: Arc<dyn RemoteStorage>,
    backup: Arc<BackupService>,
    notifier: Arc<dyn Notifier>,
}

fn by_host<T>(results: ExecutionResults<T>) -> ByHost<T> {
    let failures = results.errors();
    let values = results
        .into_iter()
        .filter(|r| r.error.is_none())
        .filter_map(|r| r.value.map(|v| (r.host, v)))
        .collect();
    (values, failures)
}

impl App {
    pub fn new(
        fleet: Fleet,
        db: Arc<dyn DatabaseAdmin>,
        storage: Arc<dyn RemoteStorage>,
        backup: Arc<BackupService>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            fleet,
            db,
            storage,
            backup,
            notifier,
        }
    }

    pub fn notifier(&self) -> &dyn Notifier {
        &*self.notifier
    }

    /// Connects to every node and checks the database, the aws CLI and the
    /// backup directories on each. Maps hosts to `"OK"` or an error message.
    pub async fn healthcheck(&mut self, ctx: &Context) -> ByHost<String> {
        let connected = self.fleet.connect(ctx).await;

        let results = if connected.errors().is_some() {
            connected.map(|()| String::new())
        } else {
            let db = Arc::clone(&self.db);
            let storage = Arc::clone(&self.storage);
            let backup = Arc::clone(&self.backup);
            self.fleet
                .run_parallel(ctx, move |ctx, node| {
                    let db = Arc::clone(&db);
                    let storage = Arc::clone(&storage);
                    let backup = Arc::clone(&backup);
                    Box::pin(async move {
                        let checks = async {
                            db.healthcheck(ctx, node).await?;
                            storage.healthcheck(ctx, node).await?;
                            backup.healthcheck(ctx, node).await?;
                            Ok::<_, Error>(String::new())
                        };
                        ExecutionResult::from(checks.await)
                    })
                })
                .await
        };

        let failures = results.errors();
        let report = results
            .into_iter()
            .map(|r| match r.error {
                Some(err) => (r.host, err.to_string()),
                None => (r.host, "OK".to_string()),
            })
            .collect();
        (report, failures)
    }

    /// Backs up every node in parallel and notifies about the outcome.
    pub async fn backup(&mut self, ctx: &Context) -> BackupResults {
        let backup = Arc::clone(&self.backup);
        let results = self
            .fleet
            .run_parallel(ctx, move |ctx, node| {
                let backup = Arc::clone(&backup);
                Box::pin(async move {
                    let result = backup.backup(ctx, node).await;
                    match result.error.clone() {
                        Some(err) => ExecutionResult::partial(result, err),
                        None => ExecutionResult::ok(result),
                    }
                })
            })
            .await;

        let results = BackupResults::new(results);
        match &results.error {
            Some(err) => {
                self.notifier
                    .error("Could not back up cluster nodes", &results.report(), err, None)
                    .await
            }
            None => {
                self.notifier
                    .info("Backup completed successfully", &results.report(), None)
                    .await
            }
        }
        results
    }

    /// Runs `nodetool repair` on one node after another and notifies about
    /// the outcome.
    pub async fn repair(&mut self, ctx: &Context) -> RepairResults {
        let db = Arc::clone(&self.db);
        let results: ExecutionResults<RepairResult> = self
            .fleet
            .run(ctx, move |ctx, node| {
                let db = Arc::clone(&db);
                Box::pin(async move { db.repair(ctx, node).await.into() })
            })
            .await;

        let results = RepairResults::new(results, self.fleet.size());
        match &results.error {
            Some(err) => {
                self.notifier
                    .error("Could not execute nodetool repair", &results.report(), err, None)
                    .await
            }
            None => {
                self.notifier
                    .info("nodetool repair executed successfully", &results.report(), None)
                    .await
            }
        }
        results
    }

    pub async fn list_snapshots(&mut self, ctx: &Context) -> ByHost<Snapshots> {
        let db = Arc::clone(&self.db);
        let results = self
            .fleet
            .run_parallel(ctx, move |ctx, node| {
                let db = Arc::clone(&db);
                Box::pin(async move { db.list_snapshots(ctx, node).await.into() })
            })
            .await;
        by_host(results)
    }

    /// Every backup of every node in remote storage.
    pub async fn list_backups(&mut self, ctx: &Context) -> ByHost<Vec<RemoteBackup>> {
        let storage = Arc::clone(&self.storage);
        let results = self
            .fleet
            .run_parallel(ctx, move |ctx, node| {
                let storage = Arc::clone(&storage);
                Box::pin(async move {
                    let base_path = node.info.remote_storage_path();
                    storage.list_backups(ctx, node, &base_path).await.into()
                })
            })
            .await;
        by_host(results)
    }

    pub async fn list_expired_backups(&mut self, ctx: &Context) -> ByHost<Vec<RemoteBackup>> {
        let now = Utc::now();
        let backup = Arc::clone(&self.backup);
        let results = self
            .fleet
            .run_parallel(ctx, move |ctx, node| {
                let backup = Arc::clone(&backup);
                Box::pin(async move { backup.list_expired_backups(ctx, node, now).await.into() })
            })
            .await;
        by_host(results)
    }

    pub async fn cleanup_expired_backups(&mut self, ctx: &Context) -> ByHost<Vec<RemoteBackup>> {
        let now = Utc::now();
        let backup = Arc::clone(&self.backup);
        let results = self
            .fleet
            .run_parallel(ctx, move |ctx, node| {
                let backup = Arc::clone(&backup);
                Box::pin(async move { backup.cleanup_expired_backups(ctx, node, now).await.into() })
            })
            .await;
        by_host(results)
    }

    pub async fn close(&self, ctx: &Context) {
        self.fleet.close(ctx).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::Extra;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use fleetback_backup::BackupOptions;
    use fleetback_core::model::SnapshotItem;
    use fleetback_core::testing::{ScriptedChannel, StaticProvider};
    use fleetback_core::{FleetOptions, Node, Result};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct FakeDb {
        fail_on: Vec<String>,
    }

    impl FakeDb {
        fn check(&self, node: &Node) -> Result<()> {
            if self.fail_on.iter().any(|h| h == node.host()) {
                return Err(Error::Precondition(format!("{} is down", node.host())));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl DatabaseAdmin for FakeDb {
        async fn healthcheck(&self, _ctx: &Context, node: &mut Node) -> Result<()> {
            self.check(node)
        }

        async fn export_schema(&self, _ctx: &Context, node: &Node, _dir: &str) -> Result<()> {
            self.check(node)
        }

        async fn create_snapshot(
            &self,
            _ctx: &Context,
            node: &Node,
            _tag: &str,
            _target_dir: &str,
            _keyspaces: &[String],
        ) -> Result<()> {
            self.check(node)
        }

        async fn remove_snapshot(&self, _ctx: &Context, _node: &Node, _tag: &str) -> Result<()> {
            Ok(())
        }

        async fn list_snapshots(&self, _ctx: &Context, node: &Node) -> Result<Snapshots> {
            self.check(node)?;
            let mut snapshots = Snapshots::new();
            snapshots.add(
                "weekly",
                SnapshotItem {
                    keyspace: "users".into(),
                    column_family: "profiles".into(),
                },
            );
            Ok(snapshots)
        }

        async fn repair(&self, _ctx: &Context, node: &Node) -> Result<RepairResult> {
            self.check(node)?;
            Ok(RepairResult {
                output: "[repair] done".into(),
                duration: Duration::from_secs(3),
            })
        }
    }

    #[derive(Default)]
    struct FakeStorage;

    #[async_trait]
    impl RemoteStorage for FakeStorage {
        async fn healthcheck(&self, _ctx: &Context, _node: &Node) -> Result<()> {
            Ok(())
        }

        async fn upload(
            &self,
            _ctx: &Context,
            _node: &Node,
            _source: &str,
            destination: &str,
        ) -> Result<String> {
            Ok(format!("s3://bucket/{destination}"))
        }

        async fn list_backups(
            &self,
            _ctx: &Context,
            _node: &Node,
            base_path: &str,
        ) -> Result<Vec<RemoteBackup>> {
            Ok(vec![
                RemoteBackup::from_path(&format!("{base_path}/01-02-2020-03-04"))?,
                RemoteBackup::from_path(&format!("{base_path}/10-19-2099-00-00"))?,
            ])
        }

        async fn remove_backup(&self, _ctx: &Context, _node: &Node, _path: &str) -> Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<(String, bool)>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn info(&self, header: &str, _body: &str, _extra: Option<&Extra>) {
            self.sent.lock().unwrap().push((header.to_string(), false));
        }

        async fn error(
            &self,
            header: &str,
            _body: &str,
            _err: &(dyn std::error::Error + Send + Sync),
            _extra: Option<&Extra>,
        ) {
            self.sent.lock().unwrap().push((header.to_string(), true));
        }
    }

    fn app(db: FakeDb, provider: StaticProvider, notifier: Arc<RecordingNotifier>) -> App {
        let fleet = Fleet::new(
            FleetOptions {
                hosts: vec!["db1".into(), "db2".into()],
                cluster_name: "main".into(),
                resolve_dns: false,
                ..Default::default()
            },
            Arc::new(provider),
        );
        let db: Arc<dyn DatabaseAdmin> = Arc::new(db);
        let storage: Arc<dyn RemoteStorage> = Arc::new(FakeStorage);
        let backup = Arc::new(BackupService::new(
            BackupOptions {
                retention: Duration::from_secs(7 * 24 * 3600),
                ..Default::default()
            },
            Arc::clone(&db),
            Arc::clone(&storage),
        ));
        App::new(fleet, db, storage, backup, notifier)
    }

    fn both_nodes() -> StaticProvider {
        StaticProvider::new()
            .with_channel("db1", Arc::new(ScriptedChannel::new()))
            .with_channel("db2", Arc::new(ScriptedChannel::new()))
    }

    #[tokio::test]
    async fn test_healthcheck_reports_connection_failures() {
        let provider = StaticProvider::new().with_channel("db1", Arc::new(ScriptedChannel::new()));
        let mut app = app(FakeDb::default(), provider, Arc::default());

        let (report, failures) = app.healthcheck(&Context::new()).await;

        assert_eq!(report["db1"], "OK");
        assert!(report["db2"].contains("db2"));
        assert_eq!(failures.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_healthcheck_runs_database_checks() {
        let db = FakeDb {
            fail_on: vec!["db2".into()],
        };
        let mut app = app(db, both_nodes(), Arc::default());

        let (report, failures) = app.healthcheck(&Context::new()).await;

        assert_eq!(report["db1"], "OK");
        assert_eq!(report["db2"], "db2 is down");
        assert!(failures.is_some());
    }

    #[tokio::test]
    async fn test_repair_stops_at_first_failure_and_notifies() {
        let notifier = Arc::new(RecordingNotifier::default());
        let db = FakeDb {
            fail_on: vec!["db1".into()],
        };
        let mut app = app(db, both_nodes(), Arc::clone(&notifier));
        let ctx = Context::new();
        app.healthcheck(&ctx).await;

        let results = app.repair(&ctx).await;

        assert_eq!(results.total_nodes, 2);
        assert_eq!(results.repaired_nodes, 0);
        assert_eq!(results.by_host.len(), 1);
        assert_eq!(
            *notifier.sent.lock().unwrap(),
            vec![("Could not execute nodetool repair".to_string(), true)]
        );
    }

    #[tokio::test]
    async fn test_successful_repair_sends_info() {
        let notifier = Arc::new(RecordingNotifier::default());
        let mut app = app(FakeDb::default(), both_nodes(), Arc::clone(&notifier));
        let ctx = Context::new();
        app.healthcheck(&ctx).await;

        let results = app.repair(&ctx).await;

        assert_eq!(results.repaired_nodes, 2);
        assert!(results.report().starts_with("Total nodes: 2\nRepaired nodes: 2\n"));
        assert!(!notifier.sent.lock().unwrap()[0].1);
    }

    #[tokio::test]
    async fn test_list_snapshots_keeps_successful_hosts() {
        let db = FakeDb {
            fail_on: vec!["db2".into()],
        };
        let mut app = app(db, both_nodes(), Arc::default());
        let ctx = Context::new();
        app.healthcheck(&ctx).await;

        let (snapshots, failures) = app.list_snapshots(&ctx).await;

        assert_eq!(snapshots.len(), 1);
        assert!(snapshots["db1"].contains("weekly"));
        assert_eq!(failures.unwrap().iter().next().unwrap().0, "db2");
    }

    #[tokio::test]
    async fn test_list_expired_backups() {
        let mut app = app(FakeDb::default(), both_nodes(), Arc::default());
        let ctx = Context::new();
        app.healthcheck(&ctx).await;

        let (all, _) = app.list_backups(&ctx).await;
        let (expired, failures) = app.list_expired_backups(&ctx).await;

        assert!(failures.is_none());
        assert_eq!(all["db1"].len(), 2);
        assert_eq!(expired["db1"].len(), 1);
        assert_eq!(
            expired["db1"][0].date_created,
            Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn test_cleanup_expired_backups_marks_removed() {
        let mut app = app(FakeDb::default(), both_nodes(), Arc::default());
        let ctx = Context::new();
        app.healthcheck(&ctx).await;

        let (removed, failures) = app.cleanup_expired_backups(&ctx).await;

        assert!(failures.is_none());
        assert!(removed.values().flatten().all(|b| b.removed));
        assert_eq!(removed["db2"].len(), 1);
    }
}
