//! Error types shared across fleetback crates

use crate::context::Interrupted;
use std::sync::Arc;
use thiserror::Error;

/// Error produced by channels, fleet operations and node workflows.
///
/// Cloneable so that a node's connection error can be reported on every
/// operation fanned out to that node.
#[derive(Error, Debug, Clone)]
pub enum Error {
    #[error("could not create SSH connection to {host} as {user}: {reason}")]
    Connection {
        host: String,
        user: String,
        reason: String,
    },

    #[error(transparent)]
    Interrupted(#[from] Interrupted),

    #[error("command `{command}` failed ({}): {}", exit_status(.status), .output.trim())]
    CommandFailed {
        command: String,
        status: Option<i32>,
        output: String,
    },

    #[error("{0}")]
    Precondition(String),

    #[error("could not parse {what}. output:\n{output}")]
    Parse { what: String, output: String },

    #[error("IO error: {0}")]
    Io(Arc<std::io::Error>),

    #[error("YAML error: {0}")]
    Yaml(Arc<serde_yaml::Error>),

    #[error("{message}: {source}")]
    Wrapped {
        message: String,
        source: Box<Error>,
    },
}

fn exit_status(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("exit status {code}"),
        None => "terminated by signal".to_string(),
    }
}

impl Error {
    /// Prefixes the error with what was being attempted.
    pub fn context(self, message: impl Into<String>) -> Self {
        Error::Wrapped {
            message: message.into(),
            source: Box::new(self),
        }
    }

    /// Whether the error, or any error it wraps, is a cancellation or timeout.
    pub fn is_interrupted(&self) -> bool {
        match self {
            Error::Interrupted(_) => true,
            Error::Wrapped { source, .. } => source.is_interrupted(),
            _ => false,
        }
    }

    /// Output captured from a failed command, looking through wrapped errors.
    pub fn command_output(&self) -> Option<&str> {
        match self {
            Error::CommandFailed { output, .. } => Some(output),
            Error::Wrapped { source, .. } => source.command_output(),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(Arc::new(err))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Yaml(Arc::new(err))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
