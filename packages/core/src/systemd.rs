//! Systemd control module.
//!
//! Reloads unit definitions after the mount table changes and triggers the
//! on-demand mount unit for a planned entry. Trigger failures are reported
//! as deferred rather than fatal: the automount materializes the mount on
//! first access or at next boot.

use std::fs;
use std::path::Path;
use std::process::Command;

use serde::Serialize;

use crate::error::{Error, IoResultExt, Result};
use crate::fstab::{MountEntry, unescape_fstab_field};

/// Result of attempting to activate a planned mount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "reason")]
pub enum ActivationResult {
    /// The mount is active (or already was).
    Started,
    /// The trigger failed; the mount is expected to materialize lazily.
    Deferred(String),
}

/// Reloads the systemd daemon to pick up mount table changes.
///
/// This is equivalent to running `systemctl daemon-reload`.
pub fn daemon_reload() -> Result<()> {
    run_systemctl(&["daemon-reload"])
}

/// Attempts to activate the mount unit for a planned entry.
///
/// If the local path is already an active mount, reports `Started` without
/// action. A failed start is non-fatal and reported as `Deferred`; existing
/// mounts are never stopped or disabled here.
pub fn activate(entry: &MountEntry) -> Result<ActivationResult> {
    if is_path_mounted(&entry.local_path)? {
        return Ok(ActivationResult::Started);
    }

    let unit_name = path_to_unit_name(&entry.local_path);
    let output = Command::new("systemctl")
        .args(["start", &unit_name])
        .output()
        .command_context(format!("systemctl start {}", unit_name))?;

    if output.status.success() {
        Ok(ActivationResult::Started)
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        Ok(ActivationResult::Deferred(stderr))
    }
}

/// Checks whether a path is currently an active mount point.
pub fn is_path_mounted(path: &Path) -> Result<bool> {
    let content = fs::read_to_string("/proc/mounts").mounts_context()?;
    Ok(mounts_contain(&content, path))
}

/// Scans mount table content for a mount point matching the given path.
fn mounts_contain(content: &str, path: &Path) -> bool {
    let wanted = path.to_string_lossy();
    content.lines().any(|line| {
        line.split_whitespace()
            .nth(1)
            .is_some_and(|mount_point| unescape_fstab_field(mount_point) == wanted)
    })
}

/// Converts a mount point path to a systemd mount unit name.
///
/// Applies systemd's path escaping (`systemd-escape --path`): `/`
/// separators become `-`, while `-`, space and other special bytes
/// within a component are escaped as `\xXX`, so the name matches the
/// unit the fstab generator produces even for hyphenated share names.
///
/// Example: "/mnt/192.168.1.10/data" -> "mnt-192.168.1.10-data.mount"
pub fn path_to_unit_name(mount_point: &Path) -> String {
    let path_str = mount_point.to_string_lossy();
    let trimmed = path_str.trim_matches('/');
    if trimmed.is_empty() {
        return "-.mount".to_string();
    }

    let mut escaped = String::with_capacity(trimmed.len());
    for (i, &byte) in trimmed.as_bytes().iter().enumerate() {
        match byte {
            b'/' => escaped.push('-'),
            b'.' if i == 0 => escaped.push_str(r"\x2e"),
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'_' | b'.' => escaped.push(byte as char),
            _ => {
                escaped.push_str(&format!(r"\x{:02x}", byte));
            }
        }
    }

    format!("{}.mount", escaped)
}

/// Helper function to run systemctl commands.
fn run_systemctl(args: &[&str]) -> Result<()> {
    let output = Command::new("systemctl")
        .args(args)
        .output()
        .command_context(format!("systemctl {}", args.join(" ")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        return Err(Error::Systemd { message: stderr });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_to_unit_name() {
        assert_eq!(
            path_to_unit_name(Path::new("/mnt/192.168.1.10/data")),
            "mnt-192.168.1.10-data.mount"
        );
        assert_eq!(path_to_unit_name(Path::new("/mnt/test")), "mnt-test.mount");
    }

    #[test]
    fn test_path_to_unit_name_escapes_hyphens() {
        // A hyphen inside a component must not read as a path separator.
        assert_eq!(
            path_to_unit_name(Path::new("/mnt/192.168.1.10/media-library")),
            r"mnt-192.168.1.10-media\x2dlibrary.mount"
        );
    }

    #[test]
    fn test_path_to_unit_name_escapes_spaces() {
        assert_eq!(
            path_to_unit_name(Path::new("/mnt/192.168.1.10/my media")),
            r"mnt-192.168.1.10-my\x20media.mount"
        );
    }

    #[test]
    fn test_mounts_contain() {
        let content = "\
proc /proc proc rw,nosuid,nodev,noexec 0 0
//192.168.1.10/data /mnt/192.168.1.10/data cifs rw,relatime 0 0
";
        assert!(mounts_contain(content, Path::new("/mnt/192.168.1.10/data")));
        assert!(!mounts_contain(
            content,
            Path::new("/mnt/192.168.1.10/backups")
        ));
    }

    #[test]
    fn test_mounts_contain_unescapes_spaces() {
        let content = "//srv/s /mnt/192.168.1.10/my\\040media cifs rw 0 0\n";
        assert!(mounts_contain(
            content,
            Path::new("/mnt/192.168.1.10/my media")
        ));
    }
}
