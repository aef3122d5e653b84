//! Error handling for the registry pipeline.

use std::path::PathBuf;

/// Specialized error type for registry extraction and sync operations
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Error reading or writing local files
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Transport-level HTTP failure (connect, timeout, TLS)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status that was not worth retrying
    #[error("HTTP {status} for {url}")]
    Status {
        /// Status code returned by the server
        status: u16,
        /// Requested URL
        url: String,
    },

    /// Request kept failing after the configured retry budget
    #[error("request to {url} exhausted {attempts} attempts")]
    RetriesExhausted {
        /// Requested URL
        url: String,
        /// Number of attempts made
        attempts: usize,
    },

    /// The rate limiter refused a permit because the circuit breaker is open
    #[error("circuit breaker open after {consecutive_failures} consecutive failures")]
    CircuitOpen {
        /// Failure streak that tripped the breaker
        consecutive_failures: u32,
    },

    /// The page structure did not match what the parser expects
    #[error("parse error: {0}")]
    Parse(String),

    /// A record failed format or consistency validation
    #[error("invalid record: {0}")]
    Validation(String),

    /// Error encoding or decoding JSON data
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The fetched listing contained no records at all
    #[error("listing returned no records")]
    EmptyListing,

    /// One or more sync safety thresholds were violated; nothing was written
    #[error("sync safety checks failed: {}", .reasons.join("; "))]
    SafetyCheckFailed {
        /// Every violated threshold, in check order
        reasons: Vec<String>,
    },

    /// The dataset written to disk does not match what was merged in memory
    #[error("dataset verification failed: {0}")]
    Verification(String),

    /// A backup file does not match its recorded checksum
    #[error("backup integrity check failed for {}", .0.display())]
    BackupIntegrity(PathBuf),
}

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;
