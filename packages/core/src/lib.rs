//! lanmount-core: Core library for SMB share discovery and mount provisioning.
//!
//! This library discovers SMB servers on the local network and provisions
//! persistent, on-demand cifs mounts for selected shares: credential files
//! under a restricted directory, one idempotent fstab record per
//! (host, share) pair, and systemd automount activation.
//!
//! # Modules
//!
//! - [`range`]: Network range detection via `ip -json`
//! - [`scan`]: Host scanning on the SMB port using `nmap`
//! - [`shares`]: Share enumeration and listing parsing via `smbclient`
//! - [`credentials`]: Restricted per-host credential files
//! - [`fstab`]: Mount entry planning and idempotent fstab merging
//! - [`systemd`]: Daemon reload and on-demand mount activation
//! - [`prompt`]: Interactive selection abstraction implemented by frontends
//! - [`pipeline`]: The sequential discovery-to-provisioning orchestration
//! - [`error`]: Error types
//!
//! # Example
//!
//! ```no_run
//! use lanmount_core::pipeline::{self, PipelineConfig, SystemToolchain};
//! # use lanmount_core::prompt::Prompt;
//! # fn demo(prompt: &dyn Prompt) -> lanmount_core::Result<()> {
//! pipeline::check_preconditions()?;
//!
//! let config = PipelineConfig::default();
//! let report = pipeline::run(prompt, &SystemToolchain, &config)?;
//!
//! for host in &report.hosts {
//!     for share in &host.shares {
//!         println!("{} -> {}", share.remote_spec, share.local_path.display());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod credentials;
pub mod error;
pub mod fstab;
pub mod pipeline;
pub mod prompt;
pub mod range;
pub mod scan;
pub mod shares;
pub mod systemd;

// Re-export commonly used types
pub use credentials::{Credential, CredentialStore};
pub use error::{Error, Result};
pub use fstab::{MountEntry, MountOwner, PlanOutcome};
pub use pipeline::{PipelineConfig, RunReport, SystemToolchain};
pub use prompt::Prompt;
pub use range::NetworkRange;
pub use scan::DiscoveredHost;
pub use shares::ShareDescriptor;
pub use systemd::ActivationResult;
