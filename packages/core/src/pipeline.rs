//! Provisioning pipeline.
//!
//! Threads the discovery-to-provisioning flow together: resolve the network
//! range, scan it, and for each selected host materialize a credential,
//! enumerate shares, and plan + activate a mount per selected share. Each
//! host is processed to completion before the next begins, and everything
//! the run created or skipped comes back in an explicit [`RunReport`]
//! rather than ambient state.

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::credentials::{Credential, CredentialStore, DEFAULT_CREDENTIAL_DIR};
use crate::error::{Error, Result};
use crate::fstab::{self, DEFAULT_MOUNT_ROOT, FSTAB_PATH, MountEntry, MountOwner, PlanOutcome};
use crate::prompt::Prompt;
use crate::range::{self, NetworkRange};
use crate::scan::{self, DiscoveredHost};
use crate::shares::{self, ShareListing};
use crate::systemd::{self, ActivationResult};

/// External tools the pipeline shells out to.
pub const REQUIRED_TOOLS: &[&str] = &["ip", "nmap", "smbclient", "mount.cifs", "systemctl"];

/// Paths and defaults for one provisioning run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Persisted mount table, normally `/etc/fstab`.
    pub fstab_path: PathBuf,
    /// Directory for per-host credential files.
    pub credential_dir: PathBuf,
    /// Root under which mount points are created.
    pub mount_root: PathBuf,
    /// Owner for the mounted trees; `None` leaves ownership with root.
    pub owner: Option<MountOwner>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fstab_path: PathBuf::from(FSTAB_PATH),
            credential_dir: PathBuf::from(DEFAULT_CREDENTIAL_DIR),
            mount_root: PathBuf::from(DEFAULT_MOUNT_ROOT),
            owner: None,
        }
    }
}

/// The external operations the pipeline depends on.
///
/// [`SystemToolchain`] delegates to the real tools; tests substitute a
/// scripted implementation so the pipeline logic runs without a network.
pub trait Toolchain {
    /// Best-effort detection of the local network range.
    fn detect_range(&self) -> Option<NetworkRange>;

    /// Probes the range for hosts exposing the SMB port.
    fn scan(&self, range: &NetworkRange) -> Result<Vec<DiscoveredHost>>;

    /// Queries a host's share listing using a stored credential file.
    fn list_shares(&self, host: Ipv4Addr, credential_file: &Path) -> Result<ShareListing>;

    /// Reloads systemd unit definitions.
    fn daemon_reload(&self) -> Result<()>;

    /// Triggers the mount unit for a planned entry.
    fn activate(&self, entry: &MountEntry) -> Result<ActivationResult>;
}

/// Toolchain backed by the real system tools.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemToolchain;

impl Toolchain for SystemToolchain {
    fn detect_range(&self) -> Option<NetworkRange> {
        range::detect_network_range()
    }

    fn scan(&self, range: &NetworkRange) -> Result<Vec<DiscoveredHost>> {
        scan::scan_for_hosts(range)
    }

    fn list_shares(&self, host: Ipv4Addr, credential_file: &Path) -> Result<ShareListing> {
        shares::list_shares(host, credential_file)
    }

    fn daemon_reload(&self) -> Result<()> {
        systemd::daemon_reload()
    }

    fn activate(&self, entry: &MountEntry) -> Result<ActivationResult> {
        systemd::activate(entry)
    }
}

/// Outcome for one provisioned share.
#[derive(Debug, Clone, Serialize)]
pub struct ShareReport {
    pub remote_spec: String,
    pub local_path: PathBuf,
    pub outcome: PlanOutcome,
    pub activation: ActivationResult,
}

/// Everything that happened while processing one host.
#[derive(Debug, Clone, Serialize)]
pub struct HostReport {
    pub host: String,
    pub credential_file: Option<PathBuf>,
    pub shares: Vec<ShareReport>,
    /// Soft failures and skips, surfaced in the end-of-run summary.
    pub notes: Vec<String>,
}

impl HostReport {
    fn new(host: Ipv4Addr) -> Self {
        Self {
            host: host.to_string(),
            credential_file: None,
            shares: Vec::new(),
            notes: Vec::new(),
        }
    }
}

/// Summary of a whole provisioning run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub range: Option<String>,
    pub hosts_found: usize,
    pub hosts: Vec<HostReport>,
}

/// Verifies privilege and tool preconditions before the pipeline runs.
///
/// Fails fast with a clear diagnostic: everything after this point assumes
/// root and the scanning/query tools are present.
pub fn check_preconditions() -> Result<()> {
    if !nix::unistd::geteuid().is_root() {
        return Err(Error::NotRoot);
    }

    for tool in REQUIRED_TOOLS {
        if !tool_on_path(tool) {
            return Err(Error::MissingTool {
                tool: tool.to_string(),
            });
        }
    }

    Ok(())
}

fn tool_on_path(tool: &str) -> bool {
    let Some(path) = std::env::var_os("PATH") else {
        return false;
    };
    std::env::split_paths(&path).any(|dir| dir.join(tool).is_file())
}

/// Runs the whole discovery-to-provisioning pipeline.
///
/// Cancellation at any selection point finishes that branch early and is
/// not an error; per-share soft failures are recorded in the report and
/// the run continues.
pub fn run(
    prompt: &dyn Prompt,
    tools: &dyn Toolchain,
    config: &PipelineConfig,
) -> Result<RunReport> {
    let mut report = RunReport::default();

    let range = resolve_range(prompt, tools.detect_range())?;
    report.range = Some(range.to_string());

    let hosts = tools.scan(&range)?;
    report.hosts_found = hosts.len();
    if hosts.is_empty() {
        // Valid terminal outcome; nothing was touched.
        return Ok(report);
    }

    let labels: Vec<String> = hosts.iter().map(|h| h.to_string()).collect();
    let selected = prompt.choose("Hosts exposing SMB shares", &labels)?;

    let store = CredentialStore::new(&config.credential_dir);
    for index in selected {
        let Some(host) = hosts.get(index).map(|h| h.address) else {
            continue;
        };
        report
            .hosts
            .push(provision_host(prompt, tools, config, &store, host)?);
    }

    Ok(report)
}

/// Resolves the range to scan, always giving the operator the last word.
fn resolve_range(prompt: &dyn Prompt, detected: Option<NetworkRange>) -> Result<NetworkRange> {
    if let Some(range) = detected
        && prompt.confirm(&format!("Scan detected network range {}?", range))?
    {
        return Ok(range);
    }

    let mut default = detected.map(|r| r.to_string()).unwrap_or_default();
    let mut retried = false;
    loop {
        let answer = prompt.input("Network range to scan (CIDR)", &default)?;
        let answer = answer.trim().to_string();
        if answer.is_empty() {
            return Err(Error::NoNetworkRange);
        }

        match answer.parse() {
            Ok(range) => return Ok(range),
            Err(e) if retried => return Err(e),
            Err(_) => {
                // Offer the rejected value back for editing, once.
                retried = true;
                default = answer;
            }
        }
    }
}

/// Processes a single host to completion: credential, enumeration,
/// selection, planning, activation.
fn provision_host(
    prompt: &dyn Prompt,
    tools: &dyn Toolchain,
    config: &PipelineConfig,
    store: &CredentialStore,
    host: Ipv4Addr,
) -> Result<HostReport> {
    let mut report = HostReport::new(host);

    let username = prompt.input(&format!("Username for {}", host), "")?;
    let username = username.trim();
    if username.is_empty() {
        report.notes.push("skipped: no username given".to_string());
        return Ok(report);
    }
    let secret = prompt.secret(&format!("Password for {}@{}", username, host))?;

    let credential_file = store.materialize(&Credential::new(host, username, secret))?;
    report.credential_file = Some(credential_file.clone());

    let listing = tools.list_shares(host, &credential_file)?;
    if listing.shares.is_empty() {
        report.notes.push(format!(
            "no shares listed; server said:\n{}",
            listing.raw_output.trim()
        ));
        return Ok(report);
    }

    let names: Vec<String> = listing.shares.iter().map(|s| s.name.clone()).collect();
    let selected = prompt.choose(&format!("Shares on {}", host), &names)?;

    for index in selected {
        let Some(share) = listing.shares.get(index) else {
            continue;
        };

        let entry = MountEntry::plan(
            host,
            &share.name,
            &credential_file,
            config.owner,
            &config.mount_root,
        );

        let outcome = match fstab::ensure_entry(&config.fstab_path, &entry) {
            Ok(outcome) => outcome,
            Err(e @ Error::MountPointConflict { .. }) => {
                report.notes.push(e.to_string());
                continue;
            }
            Err(e) => return Err(e),
        };

        fstab::create_mount_point(&entry.local_path)?;

        if let Err(e) = tools.daemon_reload() {
            report.notes.push(format!("daemon-reload failed: {}", e));
        }

        let activation = match tools.activate(&entry) {
            Ok(result) => result,
            Err(e) => ActivationResult::Deferred(e.to_string()),
        };

        report.shares.push(ShareReport {
            remote_spec: entry.remote_spec(),
            local_path: entry.local_path.clone(),
            outcome,
            activation,
        });
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shares::ShareDescriptor;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::fs;
    use tempfile::TempDir;

    /// Prompt fake replaying scripted responses; empty scripts mean
    /// "cancel everything".
    #[derive(Default)]
    struct FakePrompt {
        confirms: RefCell<VecDeque<bool>>,
        inputs: RefCell<VecDeque<String>>,
        secrets: RefCell<VecDeque<String>>,
        choices: RefCell<VecDeque<Vec<usize>>>,
    }

    impl FakePrompt {
        fn confirm_next(self, answer: bool) -> Self {
            self.confirms.borrow_mut().push_back(answer);
            self
        }

        fn input_next(self, answer: &str) -> Self {
            self.inputs.borrow_mut().push_back(answer.to_string());
            self
        }

        fn secret_next(self, answer: &str) -> Self {
            self.secrets.borrow_mut().push_back(answer.to_string());
            self
        }

        fn choose_next(self, answer: Vec<usize>) -> Self {
            self.choices.borrow_mut().push_back(answer);
            self
        }
    }

    impl Prompt for FakePrompt {
        fn choose(&self, _title: &str, _options: &[String]) -> Result<Vec<usize>> {
            Ok(self.choices.borrow_mut().pop_front().unwrap_or_default())
        }

        fn input(&self, _title: &str, default: &str) -> Result<String> {
            Ok(self
                .inputs
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| default.to_string()))
        }

        fn secret(&self, _title: &str) -> Result<String> {
            Ok(self.secrets.borrow_mut().pop_front().unwrap_or_default())
        }

        fn confirm(&self, _question: &str) -> Result<bool> {
            Ok(self.confirms.borrow_mut().pop_front().unwrap_or(true))
        }
    }

    /// Toolchain fake serving canned scan and listing results.
    struct FakeToolchain {
        range: Option<NetworkRange>,
        hosts: Vec<DiscoveredHost>,
        shares: Vec<String>,
    }

    impl FakeToolchain {
        fn new(hosts: &[&str], shares: &[&str]) -> Self {
            Self {
                range: Some("192.168.1.0/24".parse().unwrap()),
                hosts: hosts
                    .iter()
                    .map(|h| DiscoveredHost {
                        address: h.parse().unwrap(),
                    })
                    .collect(),
                shares: shares.iter().map(|s| s.to_string()).collect(),
            }
        }
    }

    impl Toolchain for FakeToolchain {
        fn detect_range(&self) -> Option<NetworkRange> {
            self.range
        }

        fn scan(&self, _range: &NetworkRange) -> Result<Vec<DiscoveredHost>> {
            Ok(self.hosts.clone())
        }

        fn list_shares(&self, host: Ipv4Addr, _credential_file: &Path) -> Result<ShareListing> {
            Ok(ShareListing {
                shares: self
                    .shares
                    .iter()
                    .map(|name| ShareDescriptor {
                        host,
                        name: name.clone(),
                    })
                    .collect(),
                raw_output: "scripted".to_string(),
            })
        }

        fn daemon_reload(&self) -> Result<()> {
            Ok(())
        }

        fn activate(&self, _entry: &MountEntry) -> Result<ActivationResult> {
            Ok(ActivationResult::Started)
        }
    }

    fn test_config(dir: &TempDir) -> PipelineConfig {
        let fstab_path = dir.path().join("fstab");
        fs::write(&fstab_path, "UUID=abc-123  /  ext4  defaults  0  1\n").unwrap();
        PipelineConfig {
            fstab_path,
            credential_dir: dir.path().join("credentials"),
            mount_root: dir.path().join("mnt"),
            owner: Some(MountOwner {
                uid: 1000,
                gid: 1000,
            }),
        }
    }

    #[test]
    fn test_zero_hosts_touches_nothing() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let prompt = FakePrompt::default(); // confirm detected range
        let tools = FakeToolchain::new(&[], &[]);

        let report = run(&prompt, &tools, &config).unwrap();

        assert_eq!(report.hosts_found, 0);
        assert!(report.hosts.is_empty());
        assert!(!config.credential_dir.exists());
        assert_eq!(
            fs::read_to_string(&config.fstab_path).unwrap(),
            "UUID=abc-123  /  ext4  defaults  0  1\n"
        );
    }

    #[test]
    fn test_cancelled_host_selection_exits_cleanly() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let prompt = FakePrompt::default().choose_next(vec![]);
        let tools = FakeToolchain::new(&["192.168.1.10"], &["data"]);

        let report = run(&prompt, &tools, &config).unwrap();

        assert_eq!(report.hosts_found, 1);
        assert!(report.hosts.is_empty());
        assert!(!config.credential_dir.exists());
    }

    #[test]
    fn test_full_provisioning_scenario() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let prompt = FakePrompt::default()
            .choose_next(vec![0]) // pick 192.168.1.10
            .input_next("alice")
            .secret_next("s3cret")
            .choose_next(vec![0]); // pick "data"
        let tools = FakeToolchain::new(&["192.168.1.10", "192.168.1.20"], &["data", "backups"]);

        let report = run(&prompt, &tools, &config).unwrap();

        assert_eq!(report.range.as_deref(), Some("192.168.1.0/24"));
        assert_eq!(report.hosts_found, 2);
        assert_eq!(report.hosts.len(), 1);

        let host_report = &report.hosts[0];
        let cred_path = config.credential_dir.join("192.168.1.10.cred");
        assert_eq!(host_report.credential_file.as_deref(), Some(&*cred_path));
        assert_eq!(
            fs::read_to_string(&cred_path).unwrap(),
            "username=alice\npassword=s3cret\n"
        );

        assert_eq!(host_report.shares.len(), 1);
        let share = &host_report.shares[0];
        assert_eq!(share.remote_spec, "//192.168.1.10/data");
        assert_eq!(
            share.local_path,
            config.mount_root.join("192.168.1.10").join("data")
        );
        assert_eq!(share.outcome, PlanOutcome::Added);
        assert_eq!(share.activation, ActivationResult::Started);
        assert!(share.local_path.is_dir());

        let fstab = fs::read_to_string(&config.fstab_path).unwrap();
        let line = fstab
            .lines()
            .find(|l| l.starts_with("//192.168.1.10/data"))
            .unwrap();
        assert!(line.contains("cifs"));
        assert!(line.contains("uid=1000,gid=1000"));
        assert!(line.contains("x-systemd.automount"));
    }

    #[test]
    fn test_rerun_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let tools = FakeToolchain::new(&["192.168.1.10"], &["data"]);

        for expected in [PlanOutcome::Added, PlanOutcome::AlreadyPresent] {
            let prompt = FakePrompt::default()
                .choose_next(vec![0])
                .input_next("alice")
                .secret_next("s3cret")
                .choose_next(vec![0]);
            let report = run(&prompt, &tools, &config).unwrap();
            assert_eq!(report.hosts[0].shares[0].outcome, expected);
        }

        let fstab = fs::read_to_string(&config.fstab_path).unwrap();
        let matching = fstab
            .lines()
            .filter(|l| l.starts_with("//192.168.1.10/data"))
            .count();
        assert_eq!(matching, 1);
    }

    #[test]
    fn test_empty_username_skips_host() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let prompt = FakePrompt::default()
            .choose_next(vec![0])
            .input_next(""); // cancel at the username prompt
        let tools = FakeToolchain::new(&["192.168.1.10"], &["data"]);

        let report = run(&prompt, &tools, &config).unwrap();

        let host_report = &report.hosts[0];
        assert!(host_report.credential_file.is_none());
        assert!(host_report.shares.is_empty());
        assert_eq!(host_report.notes, vec!["skipped: no username given"]);
        assert!(!config.credential_dir.exists());
    }

    #[test]
    fn test_empty_share_listing_is_soft() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let prompt = FakePrompt::default()
            .choose_next(vec![0])
            .input_next("alice")
            .secret_next("bad-password");
        let tools = FakeToolchain::new(&["192.168.1.10"], &[]);

        let report = run(&prompt, &tools, &config).unwrap();

        let host_report = &report.hosts[0];
        assert!(host_report.credential_file.is_some());
        assert!(host_report.shares.is_empty());
        assert!(host_report.notes[0].contains("no shares listed"));
        // Mount table untouched.
        assert_eq!(
            fs::read_to_string(&config.fstab_path).unwrap(),
            "UUID=abc-123  /  ext4  defaults  0  1\n"
        );
    }

    #[test]
    fn test_resolve_range_confirms_detected() {
        let prompt = FakePrompt::default().confirm_next(true);
        let range = resolve_range(&prompt, Some("192.168.1.0/24".parse().unwrap())).unwrap();
        assert_eq!(range.to_string(), "192.168.1.0/24");
    }

    #[test]
    fn test_resolve_range_override() {
        let prompt = FakePrompt::default()
            .confirm_next(false)
            .input_next("10.0.0.0/16");
        let range = resolve_range(&prompt, Some("192.168.1.0/24".parse().unwrap())).unwrap();
        assert_eq!(range.to_string(), "10.0.0.0/16");
    }

    #[test]
    fn test_resolve_range_nothing_obtained_is_fatal() {
        let prompt = FakePrompt::default().input_next("");
        let err = resolve_range(&prompt, None).unwrap_err();
        assert!(matches!(err, Error::NoNetworkRange));
    }

    #[test]
    fn test_resolve_range_reprompts_on_malformed_cidr() {
        let prompt = FakePrompt::default()
            .input_next("192.168.1.0")
            .input_next("192.168.1.0/24");
        let range = resolve_range(&prompt, None).unwrap();
        assert_eq!(range.to_string(), "192.168.1.0/24");
    }

    #[test]
    fn test_resolve_range_gives_up_after_second_malformed_cidr() {
        let prompt = FakePrompt::default()
            .input_next("garbage")
            .input_next("still-garbage");
        let err = resolve_range(&prompt, None).unwrap_err();
        assert!(matches!(err, Error::InvalidCidr { .. }));
    }

    #[test]
    fn test_mount_point_conflict_is_soft_per_share() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);

        // Seed the table with a foreign entry claiming the local path.
        let local = config.mount_root.join("192.168.1.10").join("data");
        fs::write(
            &config.fstab_path,
            format!("//10.0.0.1/other  {}  cifs  defaults  0  0\n", local.display()),
        )
        .unwrap();

        let prompt = FakePrompt::default()
            .choose_next(vec![0])
            .input_next("alice")
            .secret_next("s3cret")
            .choose_next(vec![0]);
        let tools = FakeToolchain::new(&["192.168.1.10"], &["data"]);

        let report = run(&prompt, &tools, &config).unwrap();

        let host_report = &report.hosts[0];
        assert!(host_report.shares.is_empty());
        assert!(host_report.notes[0].contains("already claimed"));
        // The foreign entry is still the only line.
        let fstab = fs::read_to_string(&config.fstab_path).unwrap();
        assert_eq!(fstab.lines().count(), 1);
    }
}
