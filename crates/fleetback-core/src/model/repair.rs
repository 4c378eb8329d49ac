//! `nodetool repair` outcomes

use super::{escape_html, format_duration, serialize_duration};
use crate::result::{ExecutionResults, NodeFailures};
use serde::Serialize;
use std::fmt::Write;
use std::time::Duration;

#[derive(Debug, Clone, Serialize)]
pub struct RepairResult {
    pub output: String,
    #[serde(serialize_with = "serialize_duration")]
    pub duration: Duration,
}

#[derive(Debug, Clone)]
pub struct RepairResults {
    pub total_nodes: usize,
    pub repaired_nodes: usize,
    pub by_host: ExecutionResults<RepairResult>,
    pub error: Option<NodeFailures>,
}

impl RepairResults {
    pub fn new(by_host: ExecutionResults<RepairResult>, total_nodes: usize) -> Self {
        Self {
            total_nodes,
            repaired_nodes: by_host.succeeded(),
            error: by_host.errors(),
            by_host,
        }
    }

    pub fn report(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Total nodes: {}", self.total_nodes);
        let _ = writeln!(out, "Repaired nodes: {}", self.repaired_nodes);
        let _ = writeln!(out);
        if let Some(err) = &self.error {
            let _ = writeln!(out, "Error:\n{}", escape_html(&err.to_string()));
        }
        let _ = writeln!(out, "Duration:");
        for entry in &self.by_host {
            if let Some(result) = &entry.value {
                let _ = writeln!(out, "{}: {}", entry.host, format_duration(result.duration));
            }
        }
        out
    }
}
