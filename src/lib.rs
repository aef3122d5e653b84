//! A Rust library for extracting public pharmacist registry records with
//! rate limiting, validation, deduplication and incremental dataset sync.

pub mod client;
pub mod config;
pub mod error;
pub mod extract;
pub mod models;
pub mod storage;
pub mod sync;
pub mod utils;

// Re-export the most common types for easier use
// Core types
pub use config::Config;
pub use error::{RegistryError, Result};
pub use models::{PharmacistProfile, PharmacistRecord, SerialNumber};

// Extraction
pub use client::{RegistryClient, RequestStats};
pub use extract::{Extractor, ListingSource, listing_count, parse_listing, parse_profile};

// Persistence
pub use storage::{BackupManager, Checkpoint, DatasetStore};

// Sync pipeline
pub use sync::{
    ChangeSet, IntegrityReport, RecordValidator, SyncEngine, SyncOptions, SyncOutcome,
    SyncStatus, consistency_report, merge_records,
};
