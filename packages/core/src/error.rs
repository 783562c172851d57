//! Unified error types for the lanmount-core library.
//!
//! Uses SNAFU for context-rich error handling, especially useful when the same
//! underlying error type (like `std::io::Error`) appears in different contexts.

use snafu::{ResultExt, Snafu};
use std::path::PathBuf;

/// Result type alias using the library's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for all core library operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Failed to execute a system command.
    #[snafu(display("failed to execute command '{command}'"))]
    CommandExecution {
        command: String,
        source: std::io::Error,
    },

    /// Command executed but returned non-zero exit code.
    #[snafu(display("command '{command}' exited with code {code}: {stderr}"))]
    CommandExit {
        command: String,
        code: i32,
        stderr: String,
    },

    /// Failed to parse `ip -json` output.
    #[snafu(display("failed to parse ip output: {message}"))]
    IpOutputParse { message: String },

    /// Malformed CIDR network range.
    #[snafu(display("invalid CIDR network range: {value}"))]
    InvalidCidr { value: String },

    /// No network range could be determined or supplied.
    #[snafu(display("no network range to scan; detection failed and none was supplied"))]
    NoNetworkRange,

    /// Fstab file not found or cannot be read.
    #[snafu(display("failed to read fstab at {}", path.display()))]
    FstabRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to write fstab file.
    #[snafu(display("failed to write fstab at {}", path.display()))]
    FstabWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    /// An existing fstab line claims the same mount point for a different remote.
    #[snafu(display(
        "mount point {} is already claimed by '{existing_spec}' in fstab", path.display()
    ))]
    MountPointConflict { path: PathBuf, existing_spec: String },

    /// Mount point creation failed.
    #[snafu(display("failed to create mount point at {}", path.display()))]
    MountPointCreation {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to create the credential directory.
    #[snafu(display("failed to create credential directory at {}", path.display()))]
    CredentialDirCreation {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to write a credential file.
    #[snafu(display("failed to write credential file at {}", path.display()))]
    CredentialWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to set ownership on a credential file.
    #[snafu(display("failed to set ownership on {}: {message}", path.display()))]
    CredentialOwnership { path: PathBuf, message: String },

    /// Failed to read the kernel mount table.
    #[snafu(display("failed to read /proc/mounts"))]
    MountsRead { source: std::io::Error },

    /// Systemd operation failed.
    #[snafu(display("systemd operation failed: {message}"))]
    Systemd { message: String },

    /// The pipeline was started without root privileges.
    #[snafu(display("this operation requires root privileges (run with sudo)"))]
    NotRoot,

    /// A required external tool is not installed.
    #[snafu(display("required tool '{tool}' not found in PATH"))]
    MissingTool { tool: String },

    /// The interactive prompt backend failed.
    #[snafu(display("prompt error: {message}"))]
    Prompt { message: String },
}

/// Extension trait for adding context to io::Error results.
pub trait IoResultExt<T> {
    /// Add context for command execution errors.
    fn command_context(self, command: impl Into<String>) -> Result<T>;

    /// Add context for fstab read errors.
    fn fstab_read_context(self, path: impl Into<PathBuf>) -> Result<T>;

    /// Add context for fstab write errors.
    fn fstab_write_context(self, path: impl Into<PathBuf>) -> Result<T>;

    /// Add context for mount point creation errors.
    fn mount_point_context(self, path: impl Into<PathBuf>) -> Result<T>;

    /// Add context for credential directory creation errors.
    fn credential_dir_context(self, path: impl Into<PathBuf>) -> Result<T>;

    /// Add context for credential file write errors.
    fn credential_write_context(self, path: impl Into<PathBuf>) -> Result<T>;

    /// Add context for /proc/mounts read errors.
    fn mounts_context(self) -> Result<T>;
}

impl<T> IoResultExt<T> for std::result::Result<T, std::io::Error> {
    fn command_context(self, command: impl Into<String>) -> Result<T> {
        self.context(CommandExecutionSnafu {
            command: command.into(),
        })
    }

    fn fstab_read_context(self, path: impl Into<PathBuf>) -> Result<T> {
        self.context(FstabReadSnafu { path: path.into() })
    }

    fn fstab_write_context(self, path: impl Into<PathBuf>) -> Result<T> {
        self.context(FstabWriteSnafu { path: path.into() })
    }

    fn mount_point_context(self, path: impl Into<PathBuf>) -> Result<T> {
        self.context(MountPointCreationSnafu { path: path.into() })
    }

    fn credential_dir_context(self, path: impl Into<PathBuf>) -> Result<T> {
        self.context(CredentialDirCreationSnafu { path: path.into() })
    }

    fn credential_write_context(self, path: impl Into<PathBuf>) -> Result<T> {
        self.context(CredentialWriteSnafu { path: path.into() })
    }

    fn mounts_context(self) -> Result<T> {
        self.context(MountsReadSnafu)
    }
}
