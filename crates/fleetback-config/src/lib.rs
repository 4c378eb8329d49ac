pub mod duration;
pub mod error;
pub mod model;

pub use duration::parse_duration;
pub use error::*;
pub use model::*;

use std::net::{Ipv4Addr, UdpSocket};
use std::path::{Path, PathBuf};

pub const CONFIG_ENV_VAR: &str = "FLEETBACK_CONFIG";

const CANDIDATES: [&str; 3] = ["config/remote.yml", "fleetback.yml", ".fleetback.yml"];

/// Locate the configuration file.
///
/// Search order:
/// 1. the explicit path, which must exist
/// 2. the `FLEETBACK_CONFIG` environment variable
/// 3. the current directory: `config/remote.yml`, `fleetback.yml`, `.fleetback.yml`
/// 4. `~/.config/fleetback/config.yml`
pub fn find_config_file(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return Err(ConfigError::MissingFile(path.to_path_buf()));
    }

    if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
        tracing::warn!(path = %path.display(), "{CONFIG_ENV_VAR} points to a missing file");
    }

    let current_dir = std::env::current_dir()?;
    for filename in &CANDIDATES {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(path);
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global_config = config_dir.join("fleetback").join("config.yml");
        if global_config.exists() {
            return Ok(global_config);
        }
    }

    Err(ConfigError::ConfigFileNotFound)
}

/// Read, validate and finalize a configuration file.
///
/// `verbose` forces debug logging and command tracing. Without hosts the
/// tool runs locally against this machine's primary IPv4 address.
pub fn load(path: &Path, verbose: bool) -> Result<Config> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut config = parse(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    config.validate()?;

    if verbose {
        config.log.level = "debug".to_string();
        config.commands.debug = true;
    }

    if config.cluster.hosts.is_empty() {
        config.mode = ExecutionMode::Local;
        config.cluster.hosts = vec![local_ipv4()?.to_string()];
    } else {
        config.mode = ExecutionMode::Ssh;
    }

    tracing::debug!(path = %path.display(), mode = ?config.mode, "configuration loaded");
    Ok(config)
}

pub fn parse(text: &str) -> std::result::Result<Config, serde_yaml::Error> {
    serde_yaml::from_str(text)
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.awscli.is_none() && !self.backup.disable_upload {
            return Err(ConfigError::Invalid(
                "awscli configuration is required if backup.disableUpload=false".into(),
            ));
        }

        if self.backup.disable_upload {
            if self.backup.cleanup_local {
                return Err(ConfigError::Invalid(
                    "backup.cleanupLocal cannot be true if remote upload is disabled".into(),
                ));
            }
            if self.backup.cleanup_remote {
                return Err(ConfigError::Invalid(
                    "backup.cleanupRemote cannot be true if remote upload is disabled".into(),
                ));
            }
        }

        if self.commands.ssh.key_password.is_some() {
            return Err(ConfigError::Invalid(
                "commands.ssh.keyPassword is not supported, add the key to ssh-agent instead"
                    .into(),
            ));
        }

        Ok(())
    }
}

/// The address this machine uses for outbound traffic.
///
/// Connecting a UDP socket sends nothing; it only asks the kernel to pick a
/// route and a source address.
pub fn local_ipv4() -> Result<Ipv4Addr> {
    let socket =
        UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).map_err(ConfigError::LocalAddress)?;
    if let Err(err) = socket.connect((Ipv4Addr::new(192, 0, 2, 1), 9)) {
        tracing::warn!(error = %err, "no route to the network, falling back to loopback");
        return Ok(Ipv4Addr::LOCALHOST);
    }
    match socket.local_addr().map_err(ConfigError::LocalAddress)?.ip() {
        std::net::IpAddr::V4(ip) if !ip.is_unspecified() => Ok(ip),
        _ => Ok(Ipv4Addr::LOCALHOST),
    }
}
