//! Forward and reverse lookups used while connecting the fleet.

use crate::context::Context;
use crate::model::node::NodeInfo;
use std::net::IpAddr;
use tokio::process::Command;

/// Fills whichever of address and domain name is still unknown.
/// Lookup failures are logged and leave the field empty.
pub(crate) async fn resolve(ctx: &Context, info: &mut NodeInfo) {
    if info.ip_address.is_empty() {
        match ctx.run(tokio::net::lookup_host((info.host.as_str(), 0))).await {
            Ok(Ok(addrs)) => {
                let addrs: Vec<IpAddr> = addrs.map(|a| a.ip()).collect();
                if let Some(ip) = addrs.iter().find(|ip| ip.is_ipv4()).or(addrs.first()) {
                    info.ip_address = ip.to_string();
                }
            }
            Ok(Err(err)) => tracing::warn!(host = %info.host, error = %err, "Could not resolve host"),
            Err(_) => {}
        }
    }

    if info.domain_name.is_empty() && !info.ip_address.is_empty() {
        match ctx.run(reverse_lookup(&info.ip_address)).await {
            Ok(Some(name)) => info.domain_name = name,
            Ok(None) => tracing::debug!(ip = %info.ip_address, "No reverse DNS entry"),
            Err(_) => {}
        }
    }
}

async fn reverse_lookup(ip: &str) -> Option<String> {
    let output = Command::new("getent")
        .arg("hosts")
        .arg(ip)
        .kill_on_drop(true)
        .output()
        .await
        .ok()?;

    if !output.status.success() {
        return None;
    }
    parse_getent_hosts(&String::from_utf8_lossy(&output.stdout))
}

/// `getent hosts` prints `<ip> <canonical name> [aliases...]`.
fn parse_getent_hosts(output: &str) -> Option<String> {
    output
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .map(|name| name.trim_end_matches('.').to_string())
}
