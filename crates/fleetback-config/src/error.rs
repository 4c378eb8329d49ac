use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "configuration file not found. Looked in:\n\
        - the FLEETBACK_CONFIG environment variable\n\
        - current directory: config/remote.yml, fleetback.yml, .fleetback.yml\n\
        - ~/.config/fleetback/config.yml\n\
        A path can also be given with --config"
    )]
    ConfigFileNotFound,

    #[error("configuration file {0} does not exist")]
    MissingFile(PathBuf),

    #[error("could not read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse configuration file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid duration {0:?}")]
    InvalidDuration(String),

    #[error("{0}")]
    Invalid(String),

    #[error("could not determine a local IPv4 address: {0}")]
    LocalAddress(#[source] std::io::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
