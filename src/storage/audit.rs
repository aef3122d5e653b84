//! Sync audit log and dataset snapshot archive.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::PharmacistRecord;

/// Sample registration numbers kept per audit bucket
pub const AUDIT_SAMPLE_LIMIT: usize = 5;

/// One line of the audit log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// When the sync ran, local time, second precision
    pub timestamp: String,
    /// Dataset file the sync targeted
    pub dataset: String,
    /// Records added by the sync
    pub new_count: usize,
    /// Records updated by the sync
    pub changed_count: usize,
    /// Up to [`AUDIT_SAMPLE_LIMIT`] new registration numbers
    pub new_registrations: Vec<String>,
    /// Up to [`AUDIT_SAMPLE_LIMIT`] changed registration numbers
    pub changed_registrations: Vec<String>,
}

impl AuditEntry {
    /// Build an entry, truncating the sample lists.
    #[must_use]
    pub fn new(
        dataset: &Path,
        new_registrations: &[String],
        changed_registrations: &[String],
    ) -> Self {
        Self {
            timestamp: Local::now().format("%Y-%m-%dT%H:%M:%S").to_string(),
            dataset: dataset.display().to_string(),
            new_count: new_registrations.len(),
            changed_count: changed_registrations.len(),
            new_registrations: sample(new_registrations),
            changed_registrations: sample(changed_registrations),
        }
    }
}

fn sample(registrations: &[String]) -> Vec<String> {
    registrations
        .iter()
        .take(AUDIT_SAMPLE_LIMIT)
        .cloned()
        .collect()
}

/// Append-only JSON-lines audit log
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    /// Log writing to the given file.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Append one entry as a single JSON line.
    ///
    /// # Errors
    /// Returns an error when the log cannot be opened or written.
    pub fn append(&self, entry: &AuditEntry) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// Path of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Post-sync dataset snapshots
#[derive(Debug, Clone)]
pub struct ArchiveWriter {
    archive_dir: PathBuf,
}

impl ArchiveWriter {
    /// Writer rooted at `<data_dir>/archives`.
    #[must_use]
    pub fn new(data_dir: &Path) -> Self {
        Self {
            archive_dir: data_dir.join("archives"),
        }
    }

    /// Write a compact snapshot of the full dataset. Returns its path.
    ///
    /// # Errors
    /// Returns an error when the archive directory or file cannot be
    /// written.
    pub fn write_snapshot(&self, records: &[PharmacistRecord]) -> Result<PathBuf> {
        fs::create_dir_all(&self.archive_dir)?;
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let path = self.archive_dir.join(format!("rx_snapshot_{timestamp}.json"));
        let mut body = serde_json::to_string(records)?;
        body.push('\n');
        fs::write(&path, body)?;
        log::info!("snapshot archived at {}", path.display());
        Ok(path)
    }
}
