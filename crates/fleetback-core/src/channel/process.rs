use crate::context::Context;
use crate::error::{Error, Result};
use std::process::{Output, Stdio};
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Spawns `cmd`, feeds `input` on stdin and waits for it under `ctx`.
///
/// The child is killed if `ctx` is done first.
pub(crate) async fn wait_for(
    ctx: &Context,
    mut cmd: Command,
    input: Option<&[u8]>,
) -> Result<Output> {
    if let Some(reason) = ctx.err() {
        return Err(reason.into());
    }

    cmd.stdin(if input.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    });
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.kill_on_drop(true);

    let mut child = cmd.spawn()?;
    let io = async move {
        if let (Some(bytes), Some(mut stdin)) = (input, child.stdin.take()) {
            stdin.write_all(bytes).await?;
            stdin.shutdown().await?;
        }
        child.wait_with_output().await
    };

    Ok(ctx.run(io).await??)
}

/// Stdout followed by stderr.
pub(crate) fn combined(output: &Output) -> Vec<u8> {
    let mut bytes = output.stdout.clone();
    bytes.extend_from_slice(&output.stderr);
    bytes
}

/// Turns a finished process into the channel contract: combined output on
/// success, [`Error::CommandFailed`] otherwise.
pub(crate) fn into_result(command: &str, output: &Output) -> Result<Vec<u8>> {
    let bytes = combined(output);
    if output.status.success() {
        Ok(bytes)
    } else {
        Err(Error::CommandFailed {
            command: command.to_string(),
            status: output.status.code(),
            output: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }
}

/// Emits an execution trace when tracing of commands is enabled.
pub(crate) fn trace(enabled: bool, host: &str, command: &str, started: Instant, output: &Result<Vec<u8>>) {
    if !enabled {
        return;
    }
    let elapsed: Duration = started.elapsed();
    match output {
        Ok(bytes) => tracing::debug!(
            host,
            command,
            elapsed = ?elapsed,
            output = %String::from_utf8_lossy(bytes),
            "command executed"
        ),
        Err(err) => tracing::debug!(host, command, elapsed = ?elapsed, error = %err, "command failed"),
    }
}
