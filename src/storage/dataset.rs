//! JSON dataset persistence.
//!
//! The dataset is a single JSON array of roster records, pretty-printed
//! with a trailing newline to match the historical files. Loading is
//! tolerant: entries that fail to deserialize or normalize are skipped with
//! a warning instead of poisoning the whole dataset.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::Result;
use crate::models::PharmacistRecord;

/// Load/save access to the dataset file
#[derive(Debug, Clone)]
pub struct DatasetStore {
    data_dir: PathBuf,
    dataset_file: String,
}

impl DatasetStore {
    /// Store rooted at the configured data directory.
    ///
    /// # Errors
    /// Returns an error when the data directory cannot be created.
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_dir(&config.data_dir, &config.dataset_file)
    }

    /// Store rooted at an explicit directory and file name.
    ///
    /// # Errors
    /// Returns an error when the directory cannot be created.
    pub fn with_dir(data_dir: &Path, dataset_file: &str) -> Result<Self> {
        fs::create_dir_all(data_dir)?;
        Ok(Self {
            data_dir: data_dir.to_path_buf(),
            dataset_file: dataset_file.to_string(),
        })
    }

    /// Full path of the dataset file.
    #[must_use]
    pub fn dataset_path(&self) -> PathBuf {
        self.data_dir.join(&self.dataset_file)
    }

    /// Whether a dataset file exists yet.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.dataset_path().exists()
    }

    /// Load every valid record from the dataset file.
    ///
    /// # Errors
    /// Returns an error when the file is missing or is not a JSON array.
    pub fn load(&self) -> Result<Vec<PharmacistRecord>> {
        let path = self.dataset_path();
        let text = fs::read_to_string(&path)?;
        let raw: Vec<serde_json::Value> = serde_json::from_str(&text)?;

        let mut records = Vec::with_capacity(raw.len());
        for value in raw {
            match serde_json::from_value::<PharmacistRecord>(value)
                .map_err(crate::error::RegistryError::from)
                .and_then(PharmacistRecord::normalized)
            {
                Ok(record) => records.push(record),
                Err(err) => log::warn!("skipping invalid dataset entry: {err}"),
            }
        }

        log::info!("loaded {} records from {}", records.len(), path.display());
        Ok(records)
    }

    /// Load the dataset, treating a missing file as empty.
    ///
    /// # Errors
    /// Returns an error for any failure other than the file not existing.
    pub fn load_or_empty(&self) -> Result<Vec<PharmacistRecord>> {
        if self.exists() {
            self.load()
        } else {
            log::warn!("no dataset at {}, starting fresh", self.dataset_path().display());
            Ok(Vec::new())
        }
    }

    /// Write the records, replacing the dataset file.
    ///
    /// # Errors
    /// Returns an error when serialization or the write fails.
    pub fn save(&self, records: &[PharmacistRecord]) -> Result<PathBuf> {
        let path = self.dataset_path();
        let mut body = serde_json::to_string_pretty(records)?;
        body.push('\n');
        fs::write(&path, body)?;
        log::info!("saved {} records to {}", records.len(), path.display());
        Ok(path)
    }
}
