//! Parsers for the text output of administration tools

mod listing;
mod snapshot;
mod status;

pub use listing::parse_directory_listing;
pub use snapshot::parse_snapshots;
pub use status::{NodeStatus, parse_cluster_name, parse_node_status};
