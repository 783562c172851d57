//! Credential storage module.
//!
//! Persists a username/password pair per host under a restricted directory,
//! in the two-line `username=`/`password=` format consumed by smbclient and
//! mount.cifs via their credential-file options. The secret never appears
//! in argv or the environment.

use std::fmt;
use std::fs;
use std::io::Write;
use std::net::Ipv4Addr;
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

use nix::unistd::{Gid, Uid, chown, geteuid};

use crate::error::{Error, IoResultExt, Result};

/// Default directory for per-host credential files.
pub const DEFAULT_CREDENTIAL_DIR: &str = "/etc/samba/credentials";

/// Mode for the credential directory: owner only.
const CREDENTIAL_DIR_MODE: u32 = 0o700;

/// Mode for credential files: owner read/write only.
const CREDENTIAL_FILE_MODE: u32 = 0o600;

/// A username/secret pair for one host.
///
/// The secret is private to this module and redacted from `Debug` output so
/// it cannot leak through logging or error formatting.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub host: Ipv4Addr,
    pub username: String,
    secret: String,
}

impl Credential {
    /// Creates a credential for a host.
    pub fn new(host: Ipv4Addr, username: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            host,
            username: username.into(),
            secret: secret.into(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Writes credential files into a restricted directory, one per host.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    dir: PathBuf,
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new(DEFAULT_CREDENTIAL_DIR)
    }
}

impl CredentialStore {
    /// Creates a store rooted at the given directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the credential file path for a host.
    pub fn path_for(&self, host: Ipv4Addr) -> PathBuf {
        self.dir.join(format!("{}.cred", host))
    }

    /// Persists a credential to its per-host file and returns the path.
    ///
    /// The file is created with mode 0600 from the start and renamed into
    /// place once fully written, so there is no window where a complete
    /// credential file is readable by anyone but the owner. A prior file
    /// for the same host is overwritten; last write wins.
    pub fn materialize(&self, credential: &Credential) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir).credential_dir_context(&self.dir)?;
        fs::set_permissions(&self.dir, fs::Permissions::from_mode(CREDENTIAL_DIR_MODE))
            .credential_dir_context(&self.dir)?;

        let final_path = self.path_for(credential.host);
        let tmp_path = self.dir.join(format!("{}.cred.tmp", credential.host));

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(CREDENTIAL_FILE_MODE)
            .open(&tmp_path)
            .credential_write_context(&tmp_path)?;
        file.write_all(
            format!(
                "username={}\npassword={}\n",
                credential.username, credential.secret
            )
            .as_bytes(),
        )
        .credential_write_context(&tmp_path)?;
        file.sync_all().credential_write_context(&tmp_path)?;
        drop(file);

        // Mode is set at open time, but tighten again in case the file
        // pre-existed with looser permissions.
        fs::set_permissions(&tmp_path, fs::Permissions::from_mode(CREDENTIAL_FILE_MODE))
            .credential_write_context(&tmp_path)?;
        chown_root(&tmp_path)?;

        fs::rename(&tmp_path, &final_path).credential_write_context(&final_path)?;

        Ok(final_path)
    }
}

/// Assigns the file to root:root when running privileged.
///
/// Skipped for unprivileged processes (test environments); production runs
/// are gated on euid 0 before the store is touched.
fn chown_root(path: &Path) -> Result<()> {
    if !geteuid().is_root() {
        return Ok(());
    }

    chown(path, Some(Uid::from_raw(0)), Some(Gid::from_raw(0))).map_err(|e| {
        Error::CredentialOwnership {
            path: path.to_path_buf(),
            message: e.to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn host() -> Ipv4Addr {
        Ipv4Addr::new(192, 168, 1, 10)
    }

    #[test]
    fn test_materialize_writes_two_line_format() {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::new(dir.path().join("creds"));

        let path = store
            .materialize(&Credential::new(host(), "alice", "s3cret"))
            .unwrap();

        assert_eq!(path, dir.path().join("creds").join("192.168.1.10.cred"));
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "username=alice\npassword=s3cret\n");
    }

    #[test]
    fn test_materialize_restricts_permissions() {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::new(dir.path().join("creds"));

        let path = store
            .materialize(&Credential::new(host(), "alice", "s3cret"))
            .unwrap();

        let file_mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o600);

        let dir_mode = fs::metadata(dir.path().join("creds"))
            .unwrap()
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(dir_mode, 0o700);
    }

    #[test]
    fn test_materialize_last_write_wins() {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::new(dir.path());

        store
            .materialize(&Credential::new(host(), "alice", "old"))
            .unwrap();
        let path = store
            .materialize(&Credential::new(host(), "bob", "new"))
            .unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "username=bob\npassword=new\n");

        // No stray temp file left behind.
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("192.168.1.10.cred")]);
    }

    #[test]
    fn test_debug_redacts_secret() {
        let debug = format!("{:?}", Credential::new(host(), "alice", "hunter2"));
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }
}
