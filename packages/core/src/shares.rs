//! Share enumeration module using smbclient.
//!
//! Queries a host's share listing with a stored credential file and parses
//! the tabular response into ordinary disk shares, filtering administrative
//! and printer shares out of the candidate set.

use std::net::Ipv4Addr;
use std::path::Path;
use std::process::Command;

use crate::error::{IoResultExt, Result};

/// A share exposed by a host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareDescriptor {
    pub host: Ipv4Addr,
    pub name: String,
}

/// Result of a share-listing query.
///
/// `raw_output` carries the server's verbatim response so callers can show
/// it when the parsed list is empty (authentication failure, no shares).
#[derive(Debug, Clone)]
pub struct ShareListing {
    pub shares: Vec<ShareDescriptor>,
    pub raw_output: String,
}

/// Queries a host for its share list using the stored credential file.
///
/// Authentication failures and empty listings are not errors: they come
/// back as an empty share list with the raw query output attached, and the
/// caller decides whether to retry, skip, or abort. The credential is
/// passed via `-A <file>` so the secret never appears in argv.
pub fn list_shares(host: Ipv4Addr, credential_file: &Path) -> Result<ShareListing> {
    let service = format!("//{}", host);

    let output = Command::new("smbclient")
        .args(["-L", &service, "-A"])
        .arg(credential_file)
        .output()
        .command_context("smbclient")?;

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    let shares = parse_share_listing(host, &stdout);
    let raw_output = if stderr.is_empty() {
        stdout
    } else {
        format!("{}{}", stdout, stderr)
    };

    Ok(ShareListing { shares, raw_output })
}

/// Parses the tabular share listing printed by `smbclient -L`.
///
/// Only rows inside the block introduced by the `Sharename` header are
/// considered. Header and separator rows, `$`-suffixed administrative
/// shares, and print queues are skipped; the first whitespace-delimited
/// token of each remaining row is the share name. Duplicates are dropped
/// preserving first-seen order.
pub fn parse_share_listing(host: Ipv4Addr, output: &str) -> Vec<ShareDescriptor> {
    let mut shares: Vec<ShareDescriptor> = Vec::new();
    let mut in_share_block = false;

    for line in output.lines() {
        if !in_share_block {
            if line.trim_start().starts_with("Sharename") {
                in_share_block = true;
            }
            continue;
        }

        // Table rows are indented; the block ends at the first blank or
        // flush-left line (smbclient prints diagnostics at column zero).
        if line.is_empty() || !line.starts_with([' ', '\t']) {
            break;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            break;
        }

        let mut tokens = trimmed.split_whitespace();
        let Some(name) = tokens.next() else {
            continue;
        };
        let share_type = tokens.next();

        if name.starts_with('-') {
            continue; // separator row
        }
        if name.ends_with('$') {
            continue; // administrative share (IPC$, print$, C$, ...)
        }
        if share_type == Some("Printer") {
            continue;
        }

        if !shares.iter().any(|s| s.name == name) {
            shares.push(ShareDescriptor {
                host,
                name: name.to_string(),
            });
        }
    }

    shares
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_LISTING: &str = "
	Sharename       Type      Comment
	---------       ----      -------
	data            Disk      Shared data
	backups         Disk
	print$          Disk      Printer Drivers
	OfficeJet       Printer   HP OfficeJet Pro
	IPC$            IPC       IPC Service (samba server)
SMB1 disabled -- no workgroup available
";

    const AUTH_FAILURE: &str = "session setup failed: NT_STATUS_LOGON_FAILURE\n";

    fn host() -> Ipv4Addr {
        Ipv4Addr::new(192, 168, 1, 10)
    }

    #[test]
    fn test_parse_filters_admin_and_printer_shares() {
        let shares = parse_share_listing(host(), SAMPLE_LISTING);

        let names: Vec<&str> = shares.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["data", "backups"]);
        assert!(shares.iter().all(|s| s.host == host()));
    }

    #[test]
    fn test_parse_ignores_trailing_diagnostics() {
        // No blank line between the table and the diagnostics.
        let listing = "
	Sharename       Type      Comment
	---------       ----      -------
	data            Disk
	backups         Disk
SMB1 disabled -- no workgroup available
Reconnecting with SMB1 for workgroup listing.
";
        let shares = parse_share_listing(host(), listing);
        let names: Vec<&str> = shares.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["data", "backups"]);
    }

    #[test]
    fn test_parse_stops_at_end_of_block() {
        let listing = "
	Sharename       Type      Comment
	---------       ----      -------
	media           Disk

	Server               Comment
	---------            -------
	FILESERVER           Samba 4.17
";
        let shares = parse_share_listing(host(), listing);
        let names: Vec<&str> = shares.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["media"]);
    }

    #[test]
    fn test_parse_deduplicates_preserving_order() {
        let listing = "
	Sharename       Type      Comment
	---------       ----      -------
	media           Disk
	data            Disk
	media           Disk
";
        let shares = parse_share_listing(host(), listing);
        let names: Vec<&str> = shares.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["media", "data"]);
    }

    #[test]
    fn test_parse_auth_failure_is_empty() {
        assert!(parse_share_listing(host(), AUTH_FAILURE).is_empty());
    }

    #[test]
    fn test_parse_empty_output() {
        assert!(parse_share_listing(host(), "").is_empty());
    }
}
