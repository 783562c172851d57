//! Host scanning module using nmap.
//!
//! This module probes a network range for hosts exposing the SMB service
//! port and parses nmap's grepable output into a deduplicated host list.

use std::net::Ipv4Addr;
use std::process::Command;

use crate::error::{Error, IoResultExt, Result};
use crate::range::NetworkRange;

/// Well-known SMB service port.
pub const SMB_PORT: u16 = 445;

/// An IPv4 host confirmed to expose the SMB service port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiscoveredHost {
    pub address: Ipv4Addr,
}

impl std::fmt::Display for DiscoveredHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.address.fmt(f)
    }
}

/// Scans a network range for hosts with the SMB port open.
///
/// Runs a single `nmap -Pn` pass so that firewalled hosts dropping ICMP are
/// still probed on the service port. An empty result is a valid outcome,
/// not an error.
pub fn scan_for_hosts(range: &NetworkRange) -> Result<Vec<DiscoveredHost>> {
    let port = SMB_PORT.to_string();
    let target = range.to_string();

    let output = Command::new("nmap")
        .args(["-Pn", "-n", "-p", &port, "-oG", "-", &target])
        .output()
        .command_context("nmap")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        return Err(Error::CommandExit {
            command: format!("nmap -Pn -n -p {} {}", port, target),
            code: output.status.code().unwrap_or(-1),
            stderr,
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(parse_grepable_output(&stdout))
}

/// Parses nmap grepable (`-oG`) output into a deduplicated host list.
///
/// Only lines that report a host address together with an open SMB port
/// contribute; status lines, closed/filtered ports, and anything else are
/// ignored. First-seen order is preserved.
pub fn parse_grepable_output(output: &str) -> Vec<DiscoveredHost> {
    let open_marker = format!("{}/open", SMB_PORT);
    let mut hosts = Vec::new();

    for line in output.lines() {
        let line = line.trim();
        if !line.starts_with("Host:") || !line.contains(&open_marker) {
            continue;
        }

        let Some(addr_token) = line.split_whitespace().nth(1) else {
            continue;
        };
        let Ok(address) = addr_token.parse::<Ipv4Addr>() else {
            continue;
        };

        let host = DiscoveredHost { address };
        if !hosts.contains(&host) {
            hosts.push(host);
        }
    }

    hosts
}
