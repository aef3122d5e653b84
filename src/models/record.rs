//! Core registry record definition
//!
//! This module contains the 5-field registry record as published on the
//! council's roster page, together with the normalization and validation
//! rules applied to every record entering the dataset.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, Result};

/// Categories the council registers pharmacists under
pub const VALID_CATEGORIES: [&str; 6] = ["BPharm", "DPharm", "PharmD", "MPharm", "QP", "QC"];

/// Position of a record in the council listing.
///
/// The site usually prints a plain number but occasionally emits free text
/// in the serial column; both forms are preserved. Numeric serials order
/// before textual ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SerialNumber {
    /// Ordinary numeric serial
    Number(u64),
    /// Non-numeric serial text, kept verbatim
    Text(String),
}

impl SerialNumber {
    /// Parse a serial cell: digits become a number, anything else is kept
    /// as text, and an empty cell is no serial at all.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        match raw.parse::<u64>() {
            Ok(n) => Some(Self::Number(n)),
            Err(_) => Some(Self::Text(raw.to_string())),
        }
    }
}

impl PartialOrd for SerialNumber {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SerialNumber {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.cmp(b),
            (Self::Number(_), Self::Text(_)) => Ordering::Less,
            (Self::Text(_), Self::Number(_)) => Ordering::Greater,
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
        }
    }
}

impl fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(t) => write!(f, "{t}"),
        }
    }
}

/// A single pharmacist entry from the council roster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PharmacistRecord {
    /// Position in the roster listing, when present
    #[serde(default)]
    pub serial_number: Option<SerialNumber>,
    /// Council registration number (`TS...` / `TG...`)
    pub registration_number: String,
    /// Registered name
    pub name: String,
    /// Father's (or husband's) name
    pub father_name: String,
    /// Qualification category (`BPharm`, `DPharm`, ...)
    pub category: String,
}

impl PharmacistRecord {
    /// Build a record from raw cell text, applying the normalization rules.
    ///
    /// # Errors
    /// Returns [`RegistryError::Validation`] when the registration number is
    /// missing or cannot be coerced into the council format.
    pub fn new(
        serial_number: Option<SerialNumber>,
        registration_number: &str,
        name: &str,
        father_name: &str,
        category: &str,
    ) -> Result<Self> {
        Ok(Self {
            serial_number,
            registration_number: normalize_registration_number(registration_number)?,
            name: clean_name(name),
            father_name: clean_name(father_name),
            category: normalize_category(category),
        })
    }

    /// Re-apply normalization to a record deserialized from storage.
    ///
    /// # Errors
    /// Returns [`RegistryError::Validation`] when the stored registration
    /// number is not salvageable.
    pub fn normalized(self) -> Result<Self> {
        Self::new(
            self.serial_number,
            &self.registration_number,
            &self.name,
            &self.father_name,
            &self.category,
        )
    }

    /// Validate the record and return every rule violation.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.registration_number.trim().is_empty() {
            errors.push("registration number is required".to_string());
        } else if normalize_registration_number(&self.registration_number).is_err() {
            errors.push(format!(
                "malformed registration number: {}",
                self.registration_number
            ));
        }
        if self.name.trim().is_empty() {
            errors.push("name is required".to_string());
        }
        if self.category.trim().is_empty() {
            errors.push("category is required".to_string());
        } else if !VALID_CATEGORIES.contains(&self.category.as_str()) {
            errors.push(format!("unknown category: {}", self.category));
        }

        errors
    }
}

impl fmt::Display for PharmacistRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.registration_number, self.name)
    }
}

/// Normalize a registration number into the council format.
///
/// The number is trimmed and upper-cased and must look like `TS`/`TG`
/// followed by optional letters and digits. An all-digit value is promoted
/// to `TS` plus the digits zero-padded to six places, matching how the
/// council back-fills legacy numbers.
///
/// # Errors
/// Returns [`RegistryError::Validation`] when the value is empty or does
/// not fit the format.
pub fn normalize_registration_number(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(RegistryError::Validation(
            "registration number is required".to_string(),
        ));
    }

    let upper = trimmed.to_uppercase();
    if is_council_format(&upper) {
        return Ok(upper);
    }
    if upper.chars().all(|c| c.is_ascii_digit()) {
        return Ok(format!("TS{upper:0>6}"));
    }

    Err(RegistryError::Validation(format!(
        "invalid registration number format: {trimmed}"
    )))
}

/// `^(TS|TG)[A-Z]*[0-9]+$` without pulling in a regex engine for one check.
fn is_council_format(upper: &str) -> bool {
    let rest = match upper.strip_prefix("TS").or_else(|| upper.strip_prefix("TG")) {
        Some(rest) => rest,
        None => return false,
    };
    let digits = rest.trim_start_matches(|c: char| c.is_ascii_uppercase());
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

/// Collapse whitespace runs and title-case a name field.
#[must_use]
pub fn clean_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for word in raw.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            for c in chars {
                out.extend(c.to_lowercase());
            }
        }
    }
    out
}

/// Normalize a category cell to the council's canonical spellings.
#[must_use]
pub fn normalize_category(raw: &str) -> String {
    let upper = raw.trim().to_uppercase();
    match upper.replace(['.', ' '], "").as_str() {
        "BPHARM" => "BPharm".to_string(),
        "DPHARM" => "DPharm".to_string(),
        "PHARMD" => "PharmD".to_string(),
        "MPHARM" => "MPharm".to_string(),
        "QP" => "QP".to_string(),
        "QC" => "QC".to_string(),
        _ => upper,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_number_is_upper_cased() {
        assert_eq!(
            normalize_registration_number("ts012345").unwrap(),
            "TS012345"
        );
        assert_eq!(normalize_registration_number(" TG99 ").unwrap(), "TG99");
    }

    #[test]
    fn digit_only_number_is_promoted() {
        assert_eq!(normalize_registration_number("123").unwrap(), "TS000123");
        assert_eq!(
            normalize_registration_number("1234567").unwrap(),
            "TS1234567"
        );
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        assert!(normalize_registration_number("").is_err());
        assert!(normalize_registration_number("AP1234").is_err());
        assert!(normalize_registration_number("TS").is_err());
        assert!(normalize_registration_number("TSABC").is_err());
    }

    #[test]
    fn names_are_cleaned() {
        assert_eq!(clean_name("  ravi   KUMAR "), "Ravi Kumar");
        assert_eq!(clean_name(""), "");
    }

    #[test]
    fn categories_normalize_known_variants() {
        for raw in ["BPHARM", "B.Pharm", "b pharm"] {
            assert_eq!(normalize_category(raw), "BPharm");
        }
        assert_eq!(normalize_category("Pharm.D"), "PharmD");
        assert_eq!(normalize_category("qc"), "QC");
        // Unknown categories pass through upper-cased for the validator.
        assert_eq!(normalize_category("nurse"), "NURSE");
    }

    #[test]
    fn validate_reports_every_violation() {
        let record = PharmacistRecord {
            serial_number: Some(SerialNumber::Number(1)),
            registration_number: "TS000001".to_string(),
            name: "Ravi Kumar".to_string(),
            father_name: "Krishna".to_string(),
            category: "BPharm".to_string(),
        };
        assert!(record.validate().is_empty());

        let broken = PharmacistRecord {
            serial_number: None,
            registration_number: "XX12".to_string(),
            name: " ".to_string(),
            father_name: String::new(),
            category: "NURSE".to_string(),
        };
        let errors = broken.validate();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn serial_numbers_order_numbers_first() {
        let mut serials = vec![
            SerialNumber::Text("A-12".to_string()),
            SerialNumber::Number(10),
            SerialNumber::Number(2),
            SerialNumber::Text("A-01".to_string()),
        ];
        serials.sort();
        assert_eq!(
            serials,
            vec![
                SerialNumber::Number(2),
                SerialNumber::Number(10),
                SerialNumber::Text("A-01".to_string()),
                SerialNumber::Text("A-12".to_string()),
            ]
        );
    }

    #[test]
    fn record_round_trips_through_json() {
        let record = PharmacistRecord::new(
            SerialNumber::parse("42"),
            "TS004242",
            "Ravi Kumar",
            "Krishna",
            "BPharm",
        )
        .unwrap();
        let json = serde_json::to_string(&record).unwrap();
        // Numeric serials serialize as bare numbers, like the historic files.
        assert!(json.contains("\"serial_number\":42"));
        let back: PharmacistRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn normalization_is_idempotent() {
        let record = PharmacistRecord::new(None, "ts12", "ravi", "krishna", "b.pharm").unwrap();
        let again = record.clone().normalized().unwrap();
        assert_eq!(record, again);
    }
}
