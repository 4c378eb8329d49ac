mod app;
mod commands;
mod environment;
mod notifier;

use clap::{Parser, Subcommand};
use fleetback_core::Context;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "fleetback")]
#[command(about = "Snapshots, uploads and prunes ScyllaDB backups across a cluster", long_about = None)]
struct Cli {
    /// Configuration file (default: config/remote.yml)
    #[arg(long, global = true, env = "FLEETBACK_CONFIG")]
    config: Option<PathBuf>,
    /// Debug logging with every executed command
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check connectivity, database tools, aws CLI and backup directories on every node
    Healthcheck,
    /// Backup commands
    #[command(subcommand)]
    Backup(BackupCommands),
    /// Database commands
    #[command(subcommand)]
    Db(DbCommands),
    /// Print the program version
    Version,
}

#[derive(Subcommand)]
pub(crate) enum BackupCommands {
    /// Export schema and snapshot, upload to remote storage and clean up
    Run,
    /// List backups in remote storage
    List,
    /// List expired backups in remote storage that can be removed
    ListExpired,
    /// Remove expired backups from remote storage
    CleanupExpired,
}

#[derive(Subcommand)]
pub(crate) enum DbCommands {
    /// List snapshots on every node
    ListSnapshots,
    /// Run `nodetool repair -pr` on one node after another
    Repair,
}

fn init_tracing(level: &str, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if matches!(cli.command, Commands::Version) {
        let info = environment::build_info();
        println!("fleetback {}", info.version);
        println!("Commit: {}", info.commit);
        println!("Build date: {}", info.date);
        return Ok(());
    }

    let config_path = fleetback_config::find_config_file(cli.config.as_deref())?;
    let config = fleetback_config::load(&config_path, cli.verbose)?;
    init_tracing(&config.log.level, cli.verbose);

    let notify = environment::notifier(&config)?;
    let mut app = match environment::build_app(&config, notify.clone()) {
        Ok(app) => app,
        Err(err) => {
            let mut extra = notifier::Extra::new();
            extra.insert(
                "configPath".into(),
                config_path.display().to_string().into(),
            );
            notify
                .error(
                    "could not initialize project environment",
                    "",
                    err.as_ref(),
                    Some(&extra),
                )
                .await;
            return Err(err);
        }
    };

    let ctx = Context::new();
    let signal_ctx = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling running commands");
            signal_ctx.cancel();
        }
    });

    let result = match cli.command {
        Commands::Healthcheck => commands::healthcheck::handle(&mut app, &ctx).await,
        Commands::Backup(command) => commands::backup::handle(command, &mut app, &ctx).await,
        Commands::Db(command) => commands::db::handle(command, &mut app, &ctx).await,
        Commands::Version => Ok(()),
    };

    app.close(&Context::new().with_timeout(CLOSE_TIMEOUT)).await;
    result
}
