mod common;

use common::{FakeDb, FakeStorage};
use fleetback_backup::{BackupOptions, BackupService};
use fleetback_core::model::BackupResults;
use fleetback_core::testing::{ScriptedChannel, StaticProvider};
use fleetback_core::{Context, ExecutionResult, Fleet, FleetOptions};
use std::sync::Arc;

#[tokio::test]
async fn test_two_node_backup_with_one_failure() {
    let provider = StaticProvider::new()
        .with_channel("db1", Arc::new(ScriptedChannel::new()))
        .with_channel("db2", Arc::new(ScriptedChannel::new()));
    let mut fleet = Fleet::new(
        FleetOptions {
            hosts: vec!["db1".to_string(), "db2".to_string()],
            cluster_name: "common".to_string(),
            resolve_dns: false,
            ..Default::default()
        },
        Arc::new(provider),
    );

    let service = Arc::new(BackupService::new(
        BackupOptions::default(),
        Arc::new(FakeDb {
            fail_snapshot_on: vec!["db2".to_string()],
            ..Default::default()
        }),
        Arc::new(FakeStorage::default()),
    ));

    let ctx = Context::new();
    fleet.connect(&ctx).await;
    let results = fleet
        .run_parallel(&ctx, move |ctx, node| {
            let service = Arc::clone(&service);
            Box::pin(async move {
                let result = service.backup(ctx, node).await;
                match result.error.clone() {
                    Some(err) => ExecutionResult::partial(result, err),
                    None => ExecutionResult::ok(result),
                }
            })
        })
        .await;

    let results = BackupResults::new(results);
    assert!(results.error.is_some());
    let report = results.report();
    assert!(report.starts_with("Total nodes: 2\nBacked up nodes: 1\n"), "{report}");
    assert!(report.contains("db1\nBackup uploaded: true\n"));
    assert!(report.contains("db2\nError:\n"));
    assert!(report.contains("Failed to connect to &#39;127.0.0.1:7199&#39;"), "{report}");
}
