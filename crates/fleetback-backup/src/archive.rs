//! Compressing the staging directory before upload

use fleetback_core::channel::shell::quote;
use fleetback_core::model::ArchiveMetadata;
use fleetback_core::{CommandChannel, Context, Result};

/// `backup.tar.<method>`
pub fn archive_name(method: &str) -> String {
    format!("backup.tar.{method}")
}

fn compressor(archive: &ArchiveMetadata) -> String {
    let mut command = archive.method.clone();
    if !archive.options.compression.is_empty() {
        command.push_str(&format!(" -{}", archive.options.compression));
    }
    if !archive.options.threads.is_empty() {
        command.push_str(&format!(" -p{}", archive.options.threads));
    }
    command
}

pub(crate) fn compress_command(local_path: &str, archive: &ArchiveMetadata) -> String {
    let name = quote(&archive_name(&archive.method));
    // the archive is created up front so tar never sees the directory change
    format!(
        "cd {} && : > {name} && tar --exclude={name} -cf - . | {} > {name}",
        quote(local_path),
        compressor(archive),
    )
}

pub(crate) fn prune_command(local_path: &str, archive: &ArchiveMetadata) -> String {
    format!(
        "cd {} && find . -mindepth 1 -maxdepth 1 ! -name {} -exec rm -rf {{}} +",
        quote(local_path),
        quote(&archive_name(&archive.method)),
    )
}

/// Packs `local_path` into a single archive and removes everything else in it.
pub async fn compress(
    ctx: &Context,
    channel: &dyn CommandChannel,
    local_path: &str,
    archive: &ArchiveMetadata,
) -> Result<()> {
    channel
        .run(ctx, &compress_command(local_path, archive))
        .await
        .map_err(|e| {
            e.context(format!(
                "failed to compress backup with {}",
                compressor(archive)
            ))
        })?;

    channel
        .run(ctx, &prune_command(local_path, archive))
        .await
        .map_err(|e| e.context(format!("failed to clear directory {local_path}")))
}
