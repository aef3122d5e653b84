//! Resumable progress tracking for long batch extractions.
//!
//! Detail fetches run for hours against a rate-limited site; the checkpoint
//! file records which registration numbers were already handled so an
//! interrupted batch picks up where it stopped.

use std::fs;
use std::path::PathBuf;

use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Progress state of a batch extraction
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Checkpoint {
    /// File the checkpoint persists to
    #[serde(skip)]
    path: PathBuf,
    /// Registration numbers fetched successfully
    pub completed: Vec<String>,
    /// Registration numbers that yielded no profile or kept failing
    pub failed: Vec<String>,
    /// Index of the last processed entry in the input batch
    pub last_index: usize,
    /// When the checkpoint was last saved
    pub timestamp: Option<String>,
}

impl Checkpoint {
    /// Load the checkpoint, or start a fresh one when the file is absent.
    ///
    /// # Errors
    /// Returns an error when an existing file cannot be read or parsed.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            return Ok(Self {
                path,
                ..Self::default()
            });
        }
        let text = fs::read_to_string(&path)?;
        let mut checkpoint: Self = serde_json::from_str(&text)?;
        checkpoint.path = path;
        Ok(checkpoint)
    }

    /// Persist the current state, stamping the save time.
    ///
    /// # Errors
    /// Returns an error when the file cannot be written.
    pub fn save(&mut self) -> Result<()> {
        self.timestamp = Some(Local::now().format("%Y-%m-%dT%H:%M:%S").to_string());
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut body = serde_json::to_string_pretty(self)?;
        body.push('\n');
        fs::write(&self.path, body)?;
        Ok(())
    }

    /// Whether a registration number was already processed (either way).
    #[must_use]
    pub fn seen(&self, registration_number: &str) -> bool {
        self.completed.iter().any(|r| r == registration_number)
            || self.failed.iter().any(|r| r == registration_number)
    }

    /// Record a successful fetch.
    pub fn record_completed(&mut self, registration_number: &str) {
        self.completed.push(registration_number.to_string());
    }

    /// Record a fetch that found nothing or failed permanently.
    pub fn record_failed(&mut self, registration_number: &str) {
        self.failed.push(registration_number.to_string());
    }
}
