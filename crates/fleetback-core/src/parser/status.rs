//! `nodetool status` and `nodetool describecluster`

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeStatus {
    /// Two-letter state such as `UN` or `DN`.
    pub status: String,
    pub datacenter: String,
}

/// Finds the row for one of `addresses` and returns its status and datacenter.
///
/// ```text
/// Datacenter: DC1
/// ===============
/// Status=Up/Down
/// |/ State=Normal/Leaving/Joining/Moving
/// --  Address     Load       Tokens  Owns  Host ID    Rack
/// UN  172.20.0.2  1.1 MB     256     ?     5fd6...    RAC1
/// ```
pub fn parse_node_status(output: &str, addresses: &[&str]) -> Result<NodeStatus> {
    let mut datacenter = "";

    for line in output.lines() {
        let line = line.trim();
        if let Some(name) = line.strip_prefix("Datacenter:") {
            datacenter = name.trim();
            continue;
        }

        let mut fields = line.split_whitespace();
        let Some(status) = fields.next() else {
            continue;
        };
        if fields.any(|field| addresses.contains(&field)) {
            return Ok(NodeStatus {
                status: status.to_string(),
                datacenter: datacenter.to_string(),
            });
        }
    }

    Err(Error::Parse {
        what: format!("node status for {}", addresses.join(", ")),
        output: output.to_string(),
    })
}

/// Extracts `Name: <cluster>` from `nodetool describecluster`.
pub fn parse_cluster_name(output: &str) -> Result<String> {
    output
        .lines()
        .filter_map(|line| line.trim().strip_prefix("Name:"))
        .map(str::trim)
        .find(|name| !name.is_empty())
        .map(str::to_string)
        .ok_or_else(|| Error::Parse {
            what: "cluster name".to_string(),
            output: output.to_string(),
        })
}
