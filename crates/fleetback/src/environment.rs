//! Builds the application from a loaded configuration.

use crate::app::App;
use crate::notifier::{Disabled, Notifier, Webhook};
use fleetback_backup::{BackupOptions, BackupService};
use fleetback_config::{Config, ExecutionMode};
use fleetback_core::model::{ArchiveMetadata, ArchiveOptions, BuildInfo};
use fleetback_core::model::node::DEFAULT_DATA_PATH;
use fleetback_core::{
    Binaries, ChannelFactory, ChannelProvider, DatabaseAdmin, Fleet, FleetOptions, RemoteStorage,
    SshAuth, SshSettings,
};
use fleetback_scylla::{Credentials, ScyllaClient};
use fleetback_storage::{AwsCli, AwsCliOptions};
use std::sync::Arc;

pub fn build_info() -> BuildInfo {
    BuildInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        commit: option_env!("FLEETBACK_COMMIT").unwrap_or("dev").to_string(),
        date: option_env!("FLEETBACK_BUILD_DATE").unwrap_or_default().to_string(),
    }
}

pub fn notifier(config: &Config) -> anyhow::Result<Arc<dyn Notifier>> {
    match &config.notifier.webhook {
        Some(webhook) if !webhook.url.is_empty() => Ok(Arc::new(Webhook::new(
            webhook.url.clone(),
            webhook.message_field.clone(),
        )?)),
        _ => Ok(Arc::new(Disabled)),
    }
}

pub fn fleet_options(config: &Config) -> FleetOptions {
    let cluster = &config.cluster;
    let defaults = Binaries::default();
    FleetOptions {
        hosts: cluster.hosts.clone(),
        data_path: cluster
            .data_path
            .clone()
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| DEFAULT_DATA_PATH.to_string()),
        cluster_name: cluster.cluster_name.clone().unwrap_or_default(),
        binaries: Binaries {
            cqlsh: cluster.binaries.cqlsh.clone().unwrap_or(defaults.cqlsh),
            nodetool: cluster.binaries.nodetool.clone().unwrap_or(defaults.nodetool),
        },
        resolve_dns: !cluster.skip_dns_resolve,
    }
}

pub fn ssh_settings(config: &Config) -> SshSettings {
    let ssh = &config.commands.ssh;
    let auth = match (&ssh.key_file, &ssh.password) {
        (Some(key_file), _) => SshAuth::KeyFile(key_file.clone()),
        (None, Some(password)) if !password.is_empty() => SshAuth::Password(password.clone()),
        _ => SshAuth::Agent,
    };
    SshSettings {
        port: ssh.port,
        user: ssh.username.clone(),
        auth,
        connect_timeout: ssh.connect_timeout,
        trace: config.commands.debug,
    }
}

pub fn channel_factory(config: &Config) -> anyhow::Result<ChannelFactory> {
    Ok(match config.mode {
        ExecutionMode::Local => ChannelFactory::local(config.commands.debug),
        ExecutionMode::Ssh => ChannelFactory::remote(ssh_settings(config))?,
    })
}

pub fn aws_cli_options(config: &Config) -> AwsCliOptions {
    match &config.awscli {
        Some(awscli) => AwsCliOptions {
            disabled: config.backup.disable_upload,
            binary: awscli.binary.clone().unwrap_or_default(),
            bucket: awscli.bucket.clone(),
            endpoint_url: awscli.endpoint_url.clone().filter(|u| !u.is_empty()),
            profile: awscli.profile.clone().filter(|p| !p.is_empty()),
        },
        None => AwsCliOptions {
            disabled: true,
            ..Default::default()
        },
    }
}

pub fn backup_options(config: &Config) -> BackupOptions {
    let backup = &config.backup;
    BackupOptions {
        snapshot_tag: backup.snapshot_tag.clone().unwrap_or_default(),
        local_path: backup.local_path.clone().unwrap_or_default(),
        keyspaces: backup.keyspaces.clone(),
        disable_upload: backup.disable_upload,
        cleanup_local: backup.cleanup_local,
        cleanup_remote: backup.cleanup_remote,
        retention: backup.retention,
        archive: backup.archive.as_ref().map(|archive| ArchiveMetadata {
            method: archive.method.clone(),
            options: ArchiveOptions {
                compression: archive.options.compression.clone(),
                threads: archive.options.threads.clone(),
            },
        }),
        build_info: build_info(),
    }
}

/// Wires the fleet, the database and storage clients and the backup service.
pub fn build_app(config: &Config, notifier: Arc<dyn Notifier>) -> anyhow::Result<App> {
    let provider: Arc<dyn ChannelProvider> = Arc::new(channel_factory(config)?);
    let fleet = Fleet::new(fleet_options(config), provider);

    let db: Arc<dyn DatabaseAdmin> = Arc::new(ScyllaClient::new(Credentials {
        user: config.credentials.user.clone(),
        password: config.credentials.password.clone(),
    }));
    let storage: Arc<dyn RemoteStorage> = Arc::new(AwsCli::new(aws_cli_options(config)));
    let backup = Arc::new(BackupService::new(
        backup_options(config),
        Arc::clone(&db),
        Arc::clone(&storage),
    ));

    tracing::debug!(
        hosts = ?config.cluster.hosts,
        mode = ?config.mode,
        "environment initialized"
    );
    Ok(App::new(fleet, db, storage, backup, notifier))
}
