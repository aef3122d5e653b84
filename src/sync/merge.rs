//! Incremental merge of a fresh listing into the stored dataset.

use std::cmp::Ordering;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::models::{PharmacistRecord, SerialNumber};

/// What a merge did, expressed as registration numbers
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    /// Registrations appended to the dataset
    pub new: Vec<String>,
    /// Registrations whose record was replaced
    pub changed: Vec<String>,
    /// Registrations present locally but absent from the fetched listing.
    /// These are reported, never deleted.
    pub missing: Vec<String>,
}

impl ChangeSet {
    /// Whether the merge left the dataset untouched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.new.is_empty() && self.changed.is_empty()
    }
}

/// Merge fetched records into the existing dataset.
///
/// A fetched record replaces its existing counterpart when any field
/// differs, otherwise it is ignored; unmatched fetched records append.
/// The merged dataset is sorted by serial number (numeric serials first,
/// textual after, records without a serial last).
#[must_use]
pub fn merge_records(
    existing: Vec<PharmacistRecord>,
    fetched: &[PharmacistRecord],
) -> (Vec<PharmacistRecord>, ChangeSet) {
    let fetched_regs: FxHashSet<&str> = fetched
        .iter()
        .map(|r| r.registration_number.as_str())
        .collect();

    let mut changes = ChangeSet {
        missing: existing
            .iter()
            .filter(|r| !fetched_regs.contains(r.registration_number.as_str()))
            .map(|r| r.registration_number.clone())
            .collect(),
        ..ChangeSet::default()
    };

    let mut merged = existing;
    let mut index: FxHashMap<String, usize> = merged
        .iter()
        .enumerate()
        .map(|(i, r)| (r.registration_number.clone(), i))
        .collect();

    for record in fetched {
        if record.registration_number.is_empty() {
            continue;
        }
        match index.get(&record.registration_number) {
            Some(&at) => {
                if merged[at] != *record {
                    merged[at] = record.clone();
                    changes.changed.push(record.registration_number.clone());
                }
            }
            None => {
                index.insert(record.registration_number.clone(), merged.len());
                changes.new.push(record.registration_number.clone());
                merged.push(record.clone());
            }
        }
    }

    merged.sort_by(|a, b| serial_order(a.serial_number.as_ref(), b.serial_number.as_ref()));
    (merged, changes)
}

/// Serial ordering with missing serials last. The sort is stable, so ties
/// keep their merge order.
fn serial_order(a: Option<&SerialNumber>, b: Option<&SerialNumber>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(serial: Option<u64>, reg: &str, name: &str) -> PharmacistRecord {
        PharmacistRecord::new(
            serial.map(SerialNumber::Number),
            reg,
            name,
            "Father",
            "BPharm",
        )
        .unwrap()
    }

    #[test]
    fn new_records_append_and_changed_records_replace() {
        let existing = vec![
            record(Some(1), "TS000001", "Ravi Kumar"),
            record(Some(2), "TS000002", "Latha Devi"),
        ];
        let fetched = vec![
            record(Some(1), "TS000001", "Ravi Kumar"),
            record(Some(2), "TS000002", "Latha D"),
            record(Some(3), "TS000003", "Suresh Babu"),
        ];

        let (merged, changes) = merge_records(existing, &fetched);

        assert_eq!(merged.len(), 3);
        assert_eq!(changes.new, vec!["TS000003"]);
        assert_eq!(changes.changed, vec!["TS000002"]);
        assert!(changes.missing.is_empty());
        assert_eq!(merged[1].name, "Latha D");
    }

    #[test]
    fn unchanged_listing_is_an_empty_changeset() {
        let existing = vec![record(Some(1), "TS000001", "Ravi Kumar")];
        let fetched = existing.clone();
        let (merged, changes) = merge_records(existing, &fetched);
        assert!(changes.is_empty());
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn missing_records_are_reported_but_kept() {
        let existing = vec![
            record(Some(1), "TS000001", "Ravi Kumar"),
            record(Some(2), "TS000002", "Latha Devi"),
        ];
        let fetched = vec![record(Some(1), "TS000001", "Ravi Kumar")];

        let (merged, changes) = merge_records(existing, &fetched);

        assert_eq!(changes.missing, vec!["TS000002"]);
        assert!(changes.is_empty());
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn merged_dataset_sorts_numbers_first_then_text_then_none() {
        let existing = vec![
            record(None, "TS000009", "No Serial"),
            record(Some(5), "TS000005", "Five"),
        ];
        let mut text_serial = record(None, "TS000007", "Seven");
        text_serial.serial_number = Some(SerialNumber::Text("A-7".to_string()));
        let fetched = vec![record(Some(2), "TS000002", "Two"), text_serial];

        let (merged, _) = merge_records(existing, &fetched);

        let regs: Vec<&str> = merged
            .iter()
            .map(|r| r.registration_number.as_str())
            .collect();
        assert_eq!(regs, vec!["TS000002", "TS000005", "TS000007", "TS000009"]);
    }
}
