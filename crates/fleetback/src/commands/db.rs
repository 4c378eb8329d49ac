use super::healthcheck::ensure_healthy;
use super::{check, print_json};
use crate::DbCommands;
use crate::app::App;
use colored::Colorize;
use fleetback_core::Context;

pub async fn handle(command: DbCommands, app: &mut App, ctx: &Context) -> anyhow::Result<()> {
    match command {
        DbCommands::ListSnapshots => {
            ensure_healthy(app, ctx, None).await?;
            let (snapshots, failures) = app.list_snapshots(ctx).await;
            print_json(&snapshots)?;
            check(failures)
        }
        DbCommands::Repair => {
            ensure_healthy(
                app,
                ctx,
                Some("Could not perform a healthcheck before running repair."),
            )
            .await?;

            eprintln!("{}", "Running nodetool repair node by node...".blue());
            let results = app.repair(ctx).await;
            println!("{}", results.report());
            check(results.error)
        }
    }
}
