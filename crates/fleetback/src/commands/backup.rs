use super::healthcheck::ensure_healthy;
use super::{check, print_json};
use crate::BackupCommands;
use crate::app::App;
use colored::Colorize;
use fleetback_core::Context;

pub async fn handle(command: BackupCommands, app: &mut App, ctx: &Context) -> anyhow::Result<()> {
    match command {
        BackupCommands::Run => {
            ensure_healthy(
                app,
                ctx,
                Some("Could not perform a healthcheck before creating backups."),
            )
            .await?;

            eprintln!("{}", "Backing up cluster nodes...".blue());
            let results = app.backup(ctx).await;
            println!("{}", results.report());
            check(results.error)
        }
        BackupCommands::List => {
            ensure_healthy(app, ctx, None).await?;
            let (backups, failures) = app.list_backups(ctx).await;
            print_json(&backups)?;
            check(failures)
        }
        BackupCommands::ListExpired => {
            ensure_healthy(app, ctx, None).await?;
            let (expired, failures) = app.list_expired_backups(ctx).await;
            print_json(&expired)?;
            check(failures)
        }
        BackupCommands::CleanupExpired => {
            ensure_healthy(app, ctx, None).await?;
            let (removed, failures) = app.cleanup_expired_backups(ctx).await;
            print_json(&removed)?;
            check(failures)
        }
    }
}
