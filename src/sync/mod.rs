//! Incremental dataset synchronization with safety thresholds.
//!
//! A sync fetches the current roster listing, validates and deduplicates
//! it, refuses to continue when the result looks wrong (too few records,
//! too low an integrity score, too large a swing against the stored
//! dataset), merges the survivors into the dataset, verifies the write,
//! and leaves an audit trail, a backup and an archive snapshot behind.

pub mod merge;
pub mod validate;

pub use merge::{ChangeSet, merge_records};
pub use validate::{ConsistencyReport, IntegrityReport, RecordValidator, consistency_report};

use std::path::PathBuf;

use crate::config::Config;
use crate::error::{RegistryError, Result};
use crate::extract::ListingSource;
use crate::storage::{ArchiveWriter, AuditEntry, AuditLog, BackupManager, DatasetStore};

/// File name of the audit log inside the data directory
const AUDIT_LOG_FILE: &str = "sync_audit.log";

/// Knobs for a single sync run
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Fetch and compare without writing anything
    pub dry_run: bool,
    /// Back up the dataset file before writing
    pub backup: bool,
    /// Archive a snapshot after a successful write
    pub archive: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            backup: true,
            archive: true,
        }
    }
}

/// How a sync run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// The listing matched the dataset; nothing was written
    UpToDate,
    /// The dataset was updated and verified
    Updated,
    /// Changes were found but not written (dry run)
    DryRun,
}

/// Result of a completed sync run
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    /// How the run ended
    pub status: SyncStatus,
    /// Records in the dataset after the run
    pub total_records: usize,
    /// Records added
    pub new_records: usize,
    /// Records replaced
    pub changed_records: usize,
    /// Records present locally but absent from the listing
    pub missing_records: usize,
    /// Duplicates dropped from the fetched listing
    pub duplicates_removed: usize,
    /// Invalid records dropped from the fetched listing
    pub invalid_records: usize,
    /// Integrity score of the fetched listing
    pub integrity_score: f64,
    /// Backup created before the write, when one was taken
    pub backup: Option<PathBuf>,
    /// Archive snapshot written after the update, when enabled
    pub archive: Option<PathBuf>,
    /// Non-fatal findings (duplicates, high invalid rate)
    pub warnings: Vec<String>,
}

impl SyncOutcome {
    /// Human-readable one-paragraph summary, suitable as a notification
    /// payload.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut lines = vec![match self.status {
            SyncStatus::UpToDate => format!(
                "dataset already up to date ({} records)",
                self.total_records
            ),
            SyncStatus::Updated => format!(
                "dataset updated: {} records ({} new, {} changed, {} missing from listing)",
                self.total_records, self.new_records, self.changed_records, self.missing_records
            ),
            SyncStatus::DryRun => format!(
                "dry run: {} new, {} changed, {} missing from listing; nothing written",
                self.new_records, self.changed_records, self.missing_records
            ),
        }];
        lines.push(format!("integrity score: {:.3}", self.integrity_score));
        for warning in &self.warnings {
            lines.push(format!("warning: {warning}"));
        }
        lines.join("\n")
    }
}

/// Drives the fetch-validate-merge-commit pipeline
pub struct SyncEngine<S: ListingSource> {
    source: S,
    store: DatasetStore,
    backups: BackupManager,
    archives: ArchiveWriter,
    audit: AuditLog,
    validator: RecordValidator,
    min_records: usize,
    min_integrity_score: f64,
    max_change_percent: f64,
    backup_keep_days: i64,
}

impl<S: ListingSource> SyncEngine<S> {
    /// Build an engine over the configured data directory and the given
    /// listing source.
    ///
    /// # Errors
    /// Returns an error when the data or backup directory cannot be
    /// created.
    pub fn new(config: &Config, source: S) -> Result<Self> {
        Ok(Self {
            source,
            store: DatasetStore::new(config)?,
            backups: BackupManager::new(&config.data_dir)?,
            archives: ArchiveWriter::new(&config.data_dir),
            audit: AuditLog::new(config.data_dir.join(AUDIT_LOG_FILE)),
            validator: RecordValidator,
            min_records: config.min_records,
            min_integrity_score: config.min_integrity_score,
            max_change_percent: config.max_change_percent,
            backup_keep_days: config.backup_keep_days,
        })
    }

    /// Run one sync.
    ///
    /// # Errors
    /// Returns [`RegistryError::EmptyListing`] when the site returns
    /// nothing, [`RegistryError::SafetyCheckFailed`] when a threshold is
    /// violated (nothing is written in that case), and
    /// [`RegistryError::Verification`] when the written dataset does not
    /// read back as expected.
    pub fn run(&mut self, options: &SyncOptions) -> Result<SyncOutcome> {
        log::info!("starting sync with {}", self.source.source_name());

        let existing = self.store.load_or_empty()?;
        let existing_count = existing.len();

        let mut backup = None;
        if options.backup && self.store.exists() {
            backup = Some(self.backups.create(&self.store.dataset_path())?);
        }

        let fetched = self.source.fetch_listing()?;
        if fetched.is_empty() {
            return Err(RegistryError::EmptyListing);
        }

        let (clean, report) = self.validator.validate_records(fetched);
        let (errors, warnings) = self.safety_checks(existing_count, clean.len(), &report);
        if !errors.is_empty() {
            log::error!("sync aborted by safety checks: {}", errors.join("; "));
            return Err(RegistryError::SafetyCheckFailed { reasons: errors });
        }

        let integrity_score = report.integrity_score();
        let (merged, changes) = merge_records(existing, &clean);

        let mut outcome = SyncOutcome {
            status: SyncStatus::UpToDate,
            total_records: merged.len(),
            new_records: changes.new.len(),
            changed_records: changes.changed.len(),
            missing_records: changes.missing.len(),
            duplicates_removed: report.duplicates,
            invalid_records: report.invalid_records,
            integrity_score,
            backup,
            archive: None,
            warnings,
        };

        if changes.is_empty() {
            log::info!("dataset already up to date ({existing_count} records)");
            outcome.total_records = existing_count;
            return Ok(outcome);
        }

        log::info!(
            "found {} new and {} changed registrations ({} missing from listing)",
            changes.new.len(),
            changes.changed.len(),
            changes.missing.len()
        );

        if options.dry_run {
            log::info!("dry run: no files were written");
            outcome.status = SyncStatus::DryRun;
            return Ok(outcome);
        }

        self.store.save(&merged)?;
        self.verify_saved(&merged)?;

        self.audit.append(&AuditEntry::new(
            &self.store.dataset_path(),
            &changes.new,
            &changes.changed,
        ))?;

        if options.archive {
            outcome.archive = Some(self.archives.write_snapshot(&merged)?);
        }

        let removed = self.backups.cleanup(self.backup_keep_days)?;
        if removed > 0 {
            log::info!("removed {removed} expired backups");
        }

        let consistency = consistency_report(&merged);
        log::info!(
            "post-merge data quality {:.3} ({} serial gaps)",
            consistency.quality_score,
            consistency.serial_gaps.len()
        );

        outcome.status = SyncStatus::Updated;
        log::info!("sync completed: {} records", merged.len());
        Ok(outcome)
    }

    /// Threshold checks against the validated listing. Returns fatal
    /// violations and advisory warnings.
    fn safety_checks(
        &self,
        existing_count: usize,
        clean_count: usize,
        report: &IntegrityReport,
    ) -> (Vec<String>, Vec<String>) {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if clean_count < self.min_records {
            errors.push(format!(
                "record count too low: {clean_count} < {}",
                self.min_records
            ));
        }

        let score = report.integrity_score();
        if score < self.min_integrity_score {
            errors.push(format!(
                "data integrity too low: {score:.3} < {}",
                self.min_integrity_score
            ));
        }

        if existing_count > 0 {
            let change_percent = (clean_count as f64 - existing_count as f64).abs()
                / existing_count as f64
                * 100.0;
            if change_percent > self.max_change_percent {
                errors.push(format!(
                    "record count change too large: {change_percent:.1}% > {}%",
                    self.max_change_percent
                ));
            }
        }

        if report.duplicates > 0 {
            warnings.push(format!(
                "found and removed {} duplicate registrations",
                report.duplicates
            ));
        }
        if report.input_records > 0 {
            let invalid_percent =
                report.invalid_records as f64 / report.input_records as f64 * 100.0;
            if invalid_percent > 1.0 {
                warnings.push(format!("high invalid record rate: {invalid_percent:.1}%"));
            }
        }

        (errors, warnings)
    }

    /// Re-read the dataset and confirm it matches what was merged.
    fn verify_saved(&self, expected: &[crate::models::PharmacistRecord]) -> Result<()> {
        let saved = self.store.load()?;
        if saved.len() != expected.len() {
            return Err(RegistryError::Verification(format!(
                "saved record count mismatch: {} != {}",
                saved.len(),
                expected.len()
            )));
        }

        let expected_regs: rustc_hash::FxHashSet<&str> = expected
            .iter()
            .map(|r| r.registration_number.as_str())
            .collect();
        let mismatch = saved
            .iter()
            .any(|r| !expected_regs.contains(r.registration_number.as_str()));
        if mismatch {
            return Err(RegistryError::Verification(
                "saved registration numbers do not match expected".to_string(),
            ));
        }

        Ok(())
    }
}
