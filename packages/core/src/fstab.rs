//! Fstab planning and merging module.
//!
//! This module computes the canonical mount path and fstab record for a
//! selected (host, share, credential) triple, and merges it idempotently
//! into the persisted mount table: re-running provisioning for the same
//! pair never duplicates the record.

use std::fs;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{Error, IoResultExt, Result};

/// Default fstab path.
pub const FSTAB_PATH: &str = "/etc/fstab";

/// Default root under which per-host mount directories are created.
pub const DEFAULT_MOUNT_ROOT: &str = "/mnt";

/// Filesystem type written to fstab for SMB shares.
pub const CIFS_VFS_TYPE: &str = "cifs";

/// Owner to assign to the mounted tree via `uid=`/`gid=` options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MountOwner {
    pub uid: u32,
    pub gid: u32,
}

impl MountOwner {
    /// Owner matching the invoking user (before any privilege escalation,
    /// callers should capture this from `SUDO_UID`/`SUDO_GID` or similar).
    pub fn current() -> Self {
        Self {
            uid: nix::unistd::getuid().as_raw(),
            gid: nix::unistd::getgid().as_raw(),
        }
    }
}

/// Replaces path-unsafe characters in a share name with `_`.
///
/// The mapping is stable, so a given (host, share) pair always produces the
/// same local path.
pub fn sanitize_share_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | ':' => '_',
            _ => c,
        })
        .collect()
}

/// A planned fstab record for one (host, share) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    pub host: Ipv4Addr,
    pub share: String,
    /// Local mount path, `<mount_root>/<host>/<sanitized share>`.
    pub local_path: PathBuf,
    /// Credential file consumed by mount.cifs via `credentials=`.
    pub credential_file: PathBuf,
    /// Mount options, in fstab order.
    pub options: Vec<String>,
}

impl MountEntry {
    /// Plans a mount entry for a share.
    ///
    /// Options always include the credential-file reference, on-demand
    /// mounting (`noauto` + systemd automount), network-online ordering and
    /// the character encoding; `uid=`/`gid=` are appended only when an
    /// owner other than root was requested.
    pub fn plan(
        host: Ipv4Addr,
        share: &str,
        credential_file: impl Into<PathBuf>,
        owner: Option<MountOwner>,
        mount_root: &Path,
    ) -> Self {
        let credential_file = credential_file.into();
        let local_path = mount_root
            .join(host.to_string())
            .join(sanitize_share_name(share));

        let mut options = vec![
            format!("credentials={}", credential_file.display()),
            "noauto".to_string(),
            "x-systemd.automount".to_string(),
            "x-systemd.requires=network-online.target".to_string(),
            "x-systemd.after=network-online.target".to_string(),
            "iocharset=utf8".to_string(),
        ];
        if let Some(owner) = owner {
            options.push(format!("uid={},gid={}", owner.uid, owner.gid));
        }

        Self {
            host,
            share: share.to_string(),
            local_path,
            credential_file,
            options,
        }
    }

    /// Returns the unescaped remote path, `//host/share`.
    pub fn remote_spec(&self) -> String {
        format!("//{}/{}", self.host, self.share)
    }

    /// Formats the entry as an fstab line, escaping both path fields.
    pub fn to_fstab_line(&self) -> String {
        format!(
            "{}  {}  {}  {}  0  0",
            escape_fstab_field(&self.remote_spec()),
            escape_fstab_field(&self.local_path.to_string_lossy()),
            CIFS_VFS_TYPE,
            self.options.join(",")
        )
    }
}

/// Outcome of merging a planned entry into the mount table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanOutcome {
    /// A new line was appended.
    Added,
    /// The table already held a record for this remote path; nothing written.
    AlreadyPresent,
}

/// Merges a planned entry into the fstab file idempotently.
///
/// The escaped remote path is compared against the first field of every
/// non-comment line; on a match nothing is written and `AlreadyPresent` is
/// returned. If another remote already claims the same mount point the
/// entry is rejected rather than overridden. Otherwise exactly one line is
/// appended.
///
/// The check-then-append sequence is not guarded against concurrent edits
/// to the table; provisioning runs are assumed serialized by the operator.
pub fn ensure_entry(fstab_path: &Path, entry: &MountEntry) -> Result<PlanOutcome> {
    let content = fs::read_to_string(fstab_path).fstab_read_context(fstab_path)?;

    let remote = escape_fstab_field(&entry.remote_spec());
    let local = escape_fstab_field(&entry.local_path.to_string_lossy());

    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let mut fields = trimmed.split_whitespace();
        let (Some(spec), Some(mount_point)) = (fields.next(), fields.next()) else {
            continue;
        };

        if spec == remote {
            return Ok(PlanOutcome::AlreadyPresent);
        }
        if mount_point == local {
            return Err(Error::MountPointConflict {
                path: entry.local_path.clone(),
                existing_spec: spec.to_string(),
            });
        }
    }

    let mut updated = content;
    if !updated.is_empty() && !updated.ends_with('\n') {
        updated.push('\n');
    }
    updated.push_str(&entry.to_fstab_line());
    updated.push('\n');

    fs::write(fstab_path, updated).fstab_write_context(fstab_path)?;

    Ok(PlanOutcome::Added)
}

/// Creates a mount point directory if it doesn't exist.
pub fn create_mount_point(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path).mount_point_context(path)?;
    }
    Ok(())
}

/// Escapes special characters in fstab fields using octal sequences.
///
/// Handles space (\040), tab (\011), newline (\012), and backslash (\134).
pub fn escape_fstab_field(field: &str) -> String {
    let mut encoded = String::with_capacity(field.len());
    for c in field.chars() {
        match c {
            ' ' => encoded.push_str(r"\040"),
            '\t' => encoded.push_str(r"\011"),
            '\n' => encoded.push_str(r"\012"),
            '\\' => encoded.push_str(r"\134"),
            _ => encoded.push(c),
        }
    }
    encoded
}

/// Unescapes octal sequences in fstab fields.
pub fn unescape_fstab_field(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\\' {
            let mut octal_digits = String::new();
            let mut clone_iter = chars.clone();
            for _ in 0..3 {
                if let Some(digit) = clone_iter.next() {
                    if digit.is_ascii_digit() {
                        octal_digits.push(digit);
                    } else {
                        break;
                    }
                } else {
                    break;
                }
            }

            if octal_digits.len() == 3
                && let Ok(byte) = u8::from_str_radix(&octal_digits, 8)
            {
                result.push(byte as char);
                for _ in 0..3 {
                    chars.next();
                }
                continue;
            }
        }
        result.push(c);
    }
    result
}
