//! Shell quoting and file system helpers that work over any [`CommandChannel`].

use super::CommandChannel;
use crate::context::Context;
use crate::error::{Error, Result};

/// Single-quotes `s` for a POSIX shell.
pub fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

/// Leaves plain words as they are and quotes anything else.
pub fn quote_if_needed(s: &str) -> String {
    let plain = !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-.,/:@=+%".contains(c));
    if plain { s.to_string() } else { quote(s) }
}

/// Succeeds if `file` is an executable path or a program `whereis` can find.
pub async fn executable_exists(
    channel: &dyn CommandChannel,
    ctx: &Context,
    file: &str,
) -> Result<()> {
    match channel.run(ctx, &format!("test -x {}", quote(file))).await {
        Ok(()) => return Ok(()),
        Err(err) if err.is_interrupted() => return Err(err),
        Err(_) => {}
    }

    let output = channel
        .output(ctx, &format!("whereis {}", quote(file)))
        .await
        .map_err(|e| e.context(format!("an executable {file} is unavailable")))?;

    if whereis_found(&output) {
        Ok(())
    } else {
        Err(Error::Precondition(format!(
            "an executable {file} is unavailable"
        )))
    }
}

/// `whereis` prints `name: path...`, or a bare `name:` when nothing is found.
fn whereis_found(output: &str) -> bool {
    output
        .lines()
        .filter_map(|line| line.split_once(':'))
        .any(|(_, paths)| !paths.trim().is_empty())
}

pub async fn directory_exists(
    channel: &dyn CommandChannel,
    ctx: &Context,
    path: &str,
) -> Result<bool> {
    match channel.run(ctx, &format!("test -d {}", quote(path))).await {
        Ok(()) => Ok(true),
        Err(Error::CommandFailed { .. }) => Ok(false),
        Err(err) => Err(err),
    }
}

pub async fn create_directory(channel: &dyn CommandChannel, ctx: &Context, path: &str) -> Result<()> {
    channel.run(ctx, &format!("mkdir -p {}", quote(path))).await
}

/// Removes everything inside `path`, keeping the directory.
pub async fn clear_directory(channel: &dyn CommandChannel, ctx: &Context, path: &str) -> Result<()> {
    let dir = path.trim_end_matches('/');
    channel
        .run(ctx, &format!("rm -rf {}/* {}/.[!.]*", quote(dir), quote(dir)))
        .await
}

/// Clears `path` if it exists, creates it otherwise.
pub async fn ensure_directory_is_empty(
    channel: &dyn CommandChannel,
    ctx: &Context,
    path: &str,
) -> Result<()> {
    if directory_exists(channel, ctx, path).await? {
        clear_directory(channel, ctx, path).await
    } else {
        create_directory(channel, ctx, path).await
    }
}

pub async fn remove_directory(channel: &dyn CommandChannel, ctx: &Context, path: &str) -> Result<()> {
    channel.run(ctx, &format!("rm -r {}", quote(path))).await
}
