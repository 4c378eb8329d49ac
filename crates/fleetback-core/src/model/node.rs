//! Database nodes as the fleet sees them

use crate::channel::CommandChannel;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::Arc;

/// Status code of a node that is up and in normal state.
pub const NODE_STATUS_OK: &str = "UN";

pub const DEFAULT_DATA_PATH: &str = "/var/lib/scylla/data";

/// Paths of the administration tools on a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Binaries {
    pub cqlsh: String,
    pub nodetool: String,
}

impl Default for Binaries {
    fn default() -> Self {
        Self {
            cqlsh: "cqlsh".to_string(),
            nodetool: "nodetool".to_string(),
        }
    }
}

/// Static and discovered facts about a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    /// Host identifier as configured.
    pub host: String,
    pub ip_address: String,
    pub domain_name: String,
    pub data_path: String,
    pub cluster_name: String,
    pub datacenter: String,
    /// Last observed status code, e.g. `UN`.
    pub status: String,
    pub binaries: Binaries,
}

impl NodeInfo {
    /// An IP host fills the address, anything else is taken as the domain name.
    pub fn new(host: impl Into<String>, data_path: impl Into<String>) -> Self {
        let host = host.into();
        let mut data_path = data_path.into();
        if data_path.is_empty() {
            data_path = DEFAULT_DATA_PATH.to_string();
        }

        let (ip_address, domain_name) = if host.parse::<IpAddr>().is_ok() {
            (host.clone(), String::new())
        } else {
            (String::new(), host.clone())
        };

        Self {
            host,
            ip_address,
            domain_name,
            data_path,
            ..Default::default()
        }
    }

    /// First label of the domain name, or the host when no domain is known.
    pub fn short_domain_name(&self) -> &str {
        if self.domain_name.is_empty() {
            return &self.host;
        }
        self.domain_name
            .split('.')
            .next()
            .unwrap_or(&self.domain_name)
    }

    /// `<cluster>/<short domain>`: where this node's backups live in remote storage.
    pub fn remote_storage_path(&self) -> String {
        format!("{}/{}", self.cluster_name, self.short_domain_name())
    }

    /// Every name the node may appear under in tool output.
    pub fn addresses(&self) -> Vec<&str> {
        let mut addresses: Vec<&str> = Vec::new();
        for candidate in [&self.ip_address, &self.domain_name, &self.host] {
            if !candidate.is_empty() && !addresses.contains(&candidate.as_str()) {
                addresses.push(candidate);
            }
        }
        addresses
    }
}

/// A fleet member: its info plus the channel bound during `connect`.
#[derive(Debug)]
pub struct Node {
    pub info: NodeInfo,
    channel: Option<Arc<dyn CommandChannel>>,
    connection_error: Option<Error>,
}

impl Node {
    pub fn new(info: NodeInfo) -> Self {
        Self {
            info,
            channel: None,
            connection_error: None,
        }
    }

    /// A node with a channel already bound, as used by single-node tooling and tests.
    pub fn with_channel(info: NodeInfo, channel: Arc<dyn CommandChannel>) -> Self {
        Self {
            info,
            channel: Some(channel),
            connection_error: None,
        }
    }

    pub fn host(&self) -> &str {
        &self.info.host
    }

    pub fn channel(&self) -> Result<&dyn CommandChannel> {
        if let Some(err) = &self.connection_error {
            return Err(err.clone());
        }
        self.channel
            .as_deref()
            .ok_or_else(|| Error::Precondition(format!("node {} is not connected", self.info.host)))
    }

    pub fn connection_error(&self) -> Option<&Error> {
        self.connection_error.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.channel.is_some() && self.connection_error.is_none()
    }

    pub(crate) fn attach(&mut self, channel: Arc<dyn CommandChannel>) {
        self.channel = Some(channel);
        self.connection_error = None;
    }

    pub(crate) fn fail_connection(&mut self, err: Error) {
        self.channel = None;
        self.connection_error = Some(err);
    }
}
