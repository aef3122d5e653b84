//! Record validation, deduplication and consistency reporting.

use std::collections::BTreeMap;

use itertools::Itertools;
use rustc_hash::FxHashSet;

use crate::models::{PharmacistRecord, SerialNumber};

/// Outcome of validating one batch of fetched records
#[derive(Debug, Clone, Default)]
pub struct IntegrityReport {
    /// Records that entered validation
    pub input_records: usize,
    /// Records that passed validation and deduplication
    pub clean_records: usize,
    /// Records dropped for rule violations
    pub invalid_records: usize,
    /// Records dropped as duplicate registration numbers
    pub duplicates: usize,
    /// Collected rule violations, for the audit trail
    pub issues: Vec<String>,
}

impl IntegrityReport {
    /// Fraction of input records that survived validation; 0 when the
    /// input was empty.
    #[must_use]
    pub fn integrity_score(&self) -> f64 {
        if self.input_records == 0 {
            0.0
        } else {
            self.clean_records as f64 / self.input_records as f64
        }
    }
}

/// Validates fetched records and strips duplicates
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordValidator;

impl RecordValidator {
    /// Drop invalid and duplicate records, first occurrence winning.
    #[must_use]
    pub fn validate_records(
        &self,
        records: Vec<PharmacistRecord>,
    ) -> (Vec<PharmacistRecord>, IntegrityReport) {
        let mut report = IntegrityReport {
            input_records: records.len(),
            ..IntegrityReport::default()
        };

        let mut seen: FxHashSet<String> = FxHashSet::default();
        let mut clean = Vec::with_capacity(records.len());

        for record in records {
            let violations = record.validate();
            if !violations.is_empty() {
                report.invalid_records += 1;
                log::warn!(
                    "invalid record {}: {}",
                    record.registration_number,
                    violations.join(", ")
                );
                report.issues.extend(violations);
                continue;
            }

            if !seen.insert(record.registration_number.clone()) {
                report.duplicates += 1;
                log::warn!(
                    "duplicate registration number found: {}",
                    record.registration_number
                );
                continue;
            }

            clean.push(record);
        }

        report.clean_records = clean.len();
        log::info!(
            "validation completed: {} clean of {} ({} invalid, {} duplicates)",
            report.clean_records,
            report.input_records,
            report.invalid_records,
            report.duplicates
        );
        (clean, report)
    }
}

/// Advisory data-shape report over a dataset; never blocks a sync
#[derive(Debug, Clone, Default)]
pub struct ConsistencyReport {
    /// Serial numbers absent from the contiguous `1..=n` expectation
    pub serial_gaps: Vec<u64>,
    /// Count of records per two-character registration prefix
    pub prefix_distribution: BTreeMap<String, usize>,
    /// Names shorter than three characters after trimming
    pub short_names: usize,
    /// Count of records per category
    pub category_distribution: BTreeMap<String, usize>,
    /// 1 minus the short-name ratio, penalized 0.1 when gaps exist
    pub quality_score: f64,
}

/// Build the advisory consistency report for a dataset.
#[must_use]
pub fn consistency_report(records: &[PharmacistRecord]) -> ConsistencyReport {
    let mut report = ConsistencyReport::default();
    if records.is_empty() {
        return report;
    }

    let serials: FxHashSet<u64> = records
        .iter()
        .filter_map(|r| match r.serial_number {
            Some(SerialNumber::Number(n)) => Some(n),
            _ => None,
        })
        .collect();
    if !serials.is_empty() {
        report.serial_gaps = (1..=serials.len() as u64)
            .filter(|n| !serials.contains(n))
            .collect();
    }

    report.prefix_distribution = records
        .iter()
        .map(|r| {
            let reg = &r.registration_number;
            if reg.len() >= 2 {
                reg[..2].to_string()
            } else {
                "UNKNOWN".to_string()
            }
        })
        .counts()
        .into_iter()
        .collect();

    report.short_names = records
        .iter()
        .filter(|r| r.name.trim().len() < 3)
        .count();

    report.category_distribution = records
        .iter()
        .map(|r| r.category.clone())
        .counts()
        .into_iter()
        .collect();

    let mut quality = 1.0 - report.short_names as f64 / records.len() as f64;
    if !report.serial_gaps.is_empty() {
        quality -= 0.1;
    }
    report.quality_score = quality.max(0.0);

    report
}
