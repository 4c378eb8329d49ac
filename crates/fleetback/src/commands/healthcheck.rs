use super::{check, print_json};
use crate::app::App;
use colored::Colorize;
use fleetback_core::Context;

pub async fn handle(app: &mut App, ctx: &Context) -> anyhow::Result<()> {
    let (report, failures) = app.healthcheck(ctx).await;
    print_json(&report)?;
    check(failures)
}

/// Healthcheck run before every fleet command.
///
/// With `notify_header` set, a failure is also reported through the notifier.
pub async fn ensure_healthy(
    app: &mut App,
    ctx: &Context,
    notify_header: Option<&str>,
) -> anyhow::Result<()> {
    let (_, failures) = app.healthcheck(ctx).await;
    let Some(failures) = failures else {
        return Ok(());
    };

    eprintln!("{}", "Healthcheck failed".red().bold());
    if let Some(header) = notify_header {
        app.notifier().error(header, "", &failures, None).await;
    }
    Err(failures.into())
}
