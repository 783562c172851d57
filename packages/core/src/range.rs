//! Network range detection module using `ip -json`.
//!
//! This module determines the local network's CIDR range to scan: first from
//! the interface carrying the default route, then from any globally-scoped
//! address, and finally leaves the decision to the operator when neither is
//! available.

use std::fmt;
use std::net::Ipv4Addr;
use std::process::Command;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::{Error, IoResultExt, Result};

/// A validated IPv4 CIDR block, normalized to its network address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkRange {
    address: Ipv4Addr,
    prefix_len: u8,
}

impl NetworkRange {
    /// Creates a range from an address and prefix length.
    ///
    /// Host bits are masked off, so `192.168.1.42/24` becomes `192.168.1.0/24`.
    pub fn new(address: Ipv4Addr, prefix_len: u8) -> Result<Self> {
        if prefix_len > 32 {
            return Err(Error::InvalidCidr {
                value: format!("{}/{}", address, prefix_len),
            });
        }
        let mask = if prefix_len == 0 {
            0
        } else {
            u32::MAX << (32 - u32::from(prefix_len))
        };
        Ok(Self {
            address: Ipv4Addr::from(u32::from(address) & mask),
            prefix_len,
        })
    }

    /// Returns the network address of the range.
    pub fn address(&self) -> Ipv4Addr {
        self.address
    }

    /// Returns the prefix length of the range.
    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }
}

impl fmt::Display for NetworkRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_len)
    }
}

impl FromStr for NetworkRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidCidr {
            value: s.to_string(),
        };
        let (addr, prefix) = s.trim().split_once('/').ok_or_else(invalid)?;
        let address: Ipv4Addr = addr.parse().map_err(|_| invalid())?;
        let prefix_len: u8 = prefix.parse().map_err(|_| invalid())?;
        Self::new(address, prefix_len)
    }
}

/// Raw JSON structure from `ip -json route show default`.
#[derive(Debug, Deserialize)]
struct RouteEntry {
    #[serde(default)]
    dev: Option<String>,
}

/// Raw JSON structure from `ip -json addr show`.
#[derive(Debug, Deserialize)]
struct InterfaceEntry {
    #[serde(default)]
    addr_info: Vec<AddrInfo>,
}

#[derive(Debug, Deserialize)]
struct AddrInfo {
    #[serde(default)]
    family: Option<String>,
    #[serde(default)]
    local: Option<String>,
    #[serde(default)]
    prefixlen: Option<u8>,
    #[serde(default)]
    scope: Option<String>,
}

/// Attempts to detect the local network range.
///
/// Tries the interface behind the default route first, then falls back to the
/// first globally-scoped IPv4 address on any interface. Returns `None` when
/// no range can be determined; the caller is expected to ask the operator.
pub fn detect_network_range() -> Option<NetworkRange> {
    if let Ok(route_json) = run_ip(&["-json", "route", "show", "default"])
        && let Ok(Some(dev)) = default_route_device(&route_json)
        && let Ok(addr_json) = run_ip(&["-json", "addr", "show", "dev", &dev])
        && let Ok(Some(range)) = first_global_inet(&addr_json)
    {
        return Some(range);
    }

    let addr_json = run_ip(&["-json", "addr", "show"]).ok()?;
    first_global_inet(&addr_json).ok().flatten()
}

/// Runs `ip` with the given arguments and returns captured stdout.
fn run_ip(args: &[&str]) -> Result<String> {
    let output = Command::new("ip").args(args).output().command_context("ip")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        return Err(Error::CommandExit {
            command: format!("ip {}", args.join(" ")),
            code: output.status.code().unwrap_or(-1),
            stderr,
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Extracts the outgoing device of the first default route.
fn default_route_device(json: &str) -> Result<Option<String>> {
    let routes: Vec<RouteEntry> = serde_json::from_str(json).map_err(|e| Error::IpOutputParse {
        message: e.to_string(),
    })?;

    Ok(routes.into_iter().find_map(|r| r.dev))
}

/// Extracts the first globally-scoped IPv4 address/prefix from addr output.
fn first_global_inet(json: &str) -> Result<Option<NetworkRange>> {
    let interfaces: Vec<InterfaceEntry> =
        serde_json::from_str(json).map_err(|e| Error::IpOutputParse {
            message: e.to_string(),
        })?;

    for iface in &interfaces {
        for info in &iface.addr_info {
            if info.family.as_deref() != Some("inet") || info.scope.as_deref() != Some("global") {
                continue;
            }
            let (Some(local), Some(prefixlen)) = (info.local.as_deref(), info.prefixlen) else {
                continue;
            };
            if let Ok(address) = local.parse::<Ipv4Addr>() {
                return NetworkRange::new(address, prefixlen).map(Some);
            }
        }
    }

    Ok(None)
}
