//! Filesystem collaborators for onboarding: the backup file and the
//! connected-session record.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use opm_wallet_onboard::{BackupSink, HandoffError, SessionConnector};
use serde::{Deserialize, Serialize};

/// Writes backups into a directory, readable only by the owner.
pub struct FileBackupSink {
    dir: PathBuf,
    written: Option<PathBuf>,
}

impl FileBackupSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            written: None,
        }
    }

    /// Path of the last backup written.
    pub fn written(&self) -> Option<&Path> {
        self.written.as_deref()
    }
}

/// Write through a temporary file renamed into place, so a failed write
/// never leaves a truncated file at `path`.
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut tmp_name = path.as_os_str().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let written = options.open(&tmp_path).and_then(|mut file| {
        file.write_all(contents)?;
        file.sync_all()
    });
    if let Err(e) = written.and_then(|()| fs::rename(&tmp_path, path)) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }
    Ok(())
}

/// `dir/file_name`, or `name-1.ext`, `name-2.ext`, ... when it is taken.
fn unused_path(dir: &Path, file_name: &str) -> std::io::Result<PathBuf> {
    let first = dir.join(file_name);
    if !first.exists() {
        return Ok(first);
    }

    let name = Path::new(file_name);
    let stem = name
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = name
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    (1..=MAX_NAME_SUFFIX)
        .map(|n| dir.join(format!("{}-{}{}", stem, n, extension)))
        .find(|candidate| !candidate.exists())
        .ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("no free backup name for {} in {}", file_name, dir.display()),
            )
        })
}

const MAX_NAME_SUFFIX: u32 = 999;

impl BackupSink for FileBackupSink {
    fn save(&mut self, file_name: &str, document: &[u8]) -> Result<(), HandoffError> {
        fs::create_dir_all(&self.dir)?;
        let path = unused_path(&self.dir, file_name)?;
        write_private(&path, document)?;
        log::info!("backup written to {}", path.display());
        self.written = Some(path);
        Ok(())
    }
}

/// The wallet the host application treats as logged in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub address: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub chain_id: u64,
}

pub const SESSION_KIND: &str = "opm-wallet";
pub const MAINNET_CHAIN_ID: u64 = 1;

/// Stores the connected address as JSON in the data directory.
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The current session, if one was ever connected.
    pub fn load(&self) -> Result<Option<SessionRecord>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = fs::read(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let record = serde_json::from_slice(&contents)
            .with_context(|| format!("Failed to parse {}", self.path.display()))?;
        Ok(Some(record))
    }
}

impl SessionConnector for SessionFile {
    fn connect(&mut self, address: &str) -> Result<(), HandoffError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let record = SessionRecord {
            address: address.to_string(),
            kind: SESSION_KIND.to_string(),
            chain_id: MAINNET_CHAIN_ID,
        };
        let json = serde_json::to_vec_pretty(&record)?;
        write_private(&self.path, &json)?;
        log::debug!("session connected for {}", address);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    #[test]
    fn test_backup_written_with_owner_only_permissions() {
        let dir = TempDir::new().unwrap();
        let mut sink = FileBackupSink::new(dir.path().join("nested"));
        sink.save("opm-wallet-0xf39Fd6-backup.json", b"{}").unwrap();

        let path = sink.written().unwrap().to_path_buf();
        assert_eq!(fs::read(&path).unwrap(), b"{}");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn test_existing_backup_is_never_replaced() {
        let dir = TempDir::new().unwrap();
        let name = "opm-wallet-0xf39Fd6-backup.json";
        let first = br#"{"address":"0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"}"#;
        let second = br#"{"address":"0xf39Fd60000000000000000000000000000000000"}"#;

        let mut sink = FileBackupSink::new(dir.path());
        sink.save(name, first).unwrap();
        sink.save(name, second).unwrap();

        assert_eq!(fs::read(dir.path().join(name)).unwrap(), first);
        let renamed = dir.path().join("opm-wallet-0xf39Fd6-backup-1.json");
        assert_eq!(sink.written(), Some(renamed.as_path()));
        assert_eq!(fs::read(&renamed).unwrap(), second);

        sink.save(name, b"third").unwrap();
        assert_eq!(
            sink.written(),
            Some(dir.path().join("opm-wallet-0xf39Fd6-backup-2.json").as_path())
        );
    }

    #[test]
    fn test_no_temporary_file_left_behind() {
        let dir = TempDir::new().unwrap();
        let mut sink = FileBackupSink::new(dir.path());
        sink.save("backup.json", b"{}").unwrap();

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("backup.json")]);
    }

    #[test]
    fn test_failed_write_keeps_existing_file() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("session.json");
        fs::write(&target, b"previous").unwrap();
        // A directory squatting on the temporary name makes the write fail
        fs::create_dir(dir.path().join("session.json.tmp")).unwrap();

        assert!(write_private(&target, b"replacement").is_err());
        assert_eq!(fs::read(&target).unwrap(), b"previous");
    }

    #[test]
    fn test_session_file_roundtrip() {
        let dir = TempDir::new().unwrap();
        let mut session = SessionFile::new(dir.path().join("data").join("session.json"));
        assert_eq!(session.load().unwrap(), None);

        session.connect(ADDRESS).unwrap();
        let record = session.load().unwrap().unwrap();
        assert_eq!(record.address, ADDRESS);
        assert_eq!(record.kind, "opm-wallet");
        assert_eq!(record.chain_id, 1);

        let raw: serde_json::Value =
            serde_json::from_slice(&fs::read(dir.path().join("data/session.json")).unwrap())
                .unwrap();
        assert_eq!(raw["type"], "opm-wallet");
        assert_eq!(raw["chainId"], 1);

        let other = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";
        session.connect(other).unwrap();
        assert_eq!(session.load().unwrap().unwrap().address, other);
    }
}
