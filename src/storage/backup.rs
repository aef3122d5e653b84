//! Dataset backups with checksum verification.
//!
//! Before a sync touches the dataset, the current file is copied into
//! `backups/` under a timestamped name with a SHA-256 sidecar. Backups
//! older than the retention window are removed together with their
//! sidecars.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{Duration as ChronoDuration, Local, NaiveDateTime};
use sha2::{Digest, Sha256};

use crate::error::{RegistryError, Result};

const BACKUP_PREFIX: &str = "rx_backup_";
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Creates, verifies and expires dataset backups
#[derive(Debug, Clone)]
pub struct BackupManager {
    backup_dir: PathBuf,
}

impl BackupManager {
    /// Manager rooted at `<data_dir>/backups`.
    ///
    /// # Errors
    /// Returns an error when the backup directory cannot be created.
    pub fn new(data_dir: &Path) -> Result<Self> {
        let backup_dir = data_dir.join("backups");
        fs::create_dir_all(&backup_dir)?;
        Ok(Self { backup_dir })
    }

    /// Directory the backups live in.
    #[must_use]
    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Copy `source` into the backup directory and write its checksum
    /// sidecar. Returns the backup path.
    ///
    /// # Errors
    /// Returns an error when the copy or sidecar write fails.
    pub fn create(&self, source: &Path) -> Result<PathBuf> {
        let timestamp = Local::now().format(TIMESTAMP_FORMAT);
        let file_name = format!("{BACKUP_PREFIX}{timestamp}.json");
        let backup_path = self.backup_dir.join(&file_name);

        fs::copy(source, &backup_path)?;

        let checksum = file_checksum(&backup_path)?;
        fs::write(
            sidecar_path(&backup_path),
            format!("{checksum}  {file_name}\n"),
        )?;

        log::info!(
            "backup created: {} (checksum {}...)",
            backup_path.display(),
            &checksum[..16]
        );
        Ok(backup_path)
    }

    /// Verify a backup against its checksum sidecar.
    ///
    /// # Errors
    /// Returns [`RegistryError::BackupIntegrity`] when the sidecar is
    /// missing, unreadable, or does not match the file contents.
    pub fn verify(&self, backup: &Path) -> Result<()> {
        let sidecar = sidecar_path(backup);
        let recorded = fs::read_to_string(&sidecar)
            .map_err(|_| RegistryError::BackupIntegrity(backup.to_path_buf()))?;
        let recorded = recorded.split_whitespace().next().unwrap_or_default();

        if recorded == file_checksum(backup)? {
            Ok(())
        } else {
            Err(RegistryError::BackupIntegrity(backup.to_path_buf()))
        }
    }

    /// Remove backups (and sidecars) older than `keep_days`. Returns the
    /// number of backups removed.
    ///
    /// # Errors
    /// Returns an error when the backup directory cannot be listed.
    pub fn cleanup(&self, keep_days: i64) -> Result<usize> {
        let cutoff = Local::now().naive_local() - ChronoDuration::days(keep_days);
        let mut removed = 0;

        for entry in fs::read_dir(&self.backup_dir)? {
            let path = entry?.path();
            let Some(stamp) = backup_timestamp(&path) else {
                continue;
            };
            if stamp < cutoff {
                if let Err(err) = fs::remove_file(&path) {
                    log::warn!("could not remove old backup {}: {err}", path.display());
                    continue;
                }
                let _ = fs::remove_file(sidecar_path(&path));
                removed += 1;
                log::info!("removed old backup {}", path.display());
            }
        }

        Ok(removed)
    }
}

/// Timestamp encoded in a backup file name, when it is one of ours.
fn backup_timestamp(path: &Path) -> Option<NaiveDateTime> {
    let name = path.file_name()?.to_str()?;
    let stamp = name.strip_prefix(BACKUP_PREFIX)?.strip_suffix(".json")?;
    NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok()
}

fn sidecar_path(backup: &Path) -> PathBuf {
    let mut os = backup.as_os_str().to_owned();
    os.push(".sha256");
    PathBuf::from(os)
}

/// Streaming SHA-256 of a file, hex-encoded.
fn file_checksum(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 4096];
    loop {
        let read = file.read(&mut buf)?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}
