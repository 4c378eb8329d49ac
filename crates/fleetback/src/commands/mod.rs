pub mod backup;
pub mod db;
pub mod healthcheck;

use fleetback_core::NodeFailures;
use serde::Serialize;

/// Pretty-printed JSON on stdout.
pub fn print_json<T: Serialize>(data: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(data)?);
    Ok(())
}

/// Turns the aggregated per-node failures into the command's exit status.
pub fn check(failures: Option<NodeFailures>) -> anyhow::Result<()> {
    match failures {
        Some(failures) => Err(failures.into()),
        None => Ok(()),
    }
}
