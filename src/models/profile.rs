//! Detailed pharmacist profile types
//!
//! The per-registration search endpoint returns more than the roster row:
//! registration status, gender, validity date, an optional photo, academic
//! history and the current workplace. These types model that page.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One row of the academic information table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EducationRecord {
    /// Qualification obtained (e.g. `D.Pharm`)
    pub qualification: String,
    /// Awarding board or university
    pub board_university: String,
    /// College name
    pub college_name: String,
    /// College address
    pub college_address: String,
    /// Academic year the course started
    pub academic_year_from: String,
    /// Academic year the course ended
    pub academic_year_to: String,
    /// Hall-ticket number
    pub hallticket_no: String,
}

/// Working / studying location from the third detail table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workplace {
    /// Street address
    pub address: String,
    /// State
    pub state: String,
    /// District
    pub district: String,
    /// Postal code
    pub pincode: String,
}

/// Everything the search page publishes for one registration number
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PharmacistProfile {
    /// Council registration number the profile was fetched for
    pub registration_number: String,
    /// Registered name
    pub name: String,
    /// Father's (or husband's) name
    pub father_name: String,
    /// Qualification category
    pub category: String,
    /// Registration status text (e.g. `Active`)
    pub status: String,
    /// Gender as printed on the page
    pub gender: String,
    /// Registration validity date, when the page prints a parseable one
    pub validity_date: Option<NaiveDate>,
    /// Photo `src` attribute: a data URI or a plain URL
    pub photo: Option<String>,
    /// Academic history rows
    pub education: Vec<EducationRecord>,
    /// Current workplace, when listed
    pub workplace: Option<Workplace>,
}

impl PharmacistProfile {
    /// Whether the profile carries anything beyond the roster fields.
    #[must_use]
    pub fn has_details(&self) -> bool {
        !self.education.is_empty()
            || self.workplace.is_some()
            || self.photo.is_some()
            || self.validity_date.is_some()
    }

    /// Completeness score in `0.0..=1.0`, weighting identity fields 0.4,
    /// status/gender 0.3, education 0.2 and photo/workplace 0.1.
    #[must_use]
    pub fn completeness(&self) -> f64 {
        let identity = [
            &self.registration_number,
            &self.name,
            &self.father_name,
            &self.category,
        ];
        let filled = identity.iter().filter(|f| !f.trim().is_empty()).count();
        let mut score = filled as f64 / identity.len() as f64 * 0.4;

        let optional = [&self.status, &self.gender];
        let filled = optional.iter().filter(|f| !f.trim().is_empty()).count();
        score += filled as f64 / optional.len() as f64 * 0.3;

        if !self.education.is_empty() {
            let filled: usize = self
                .education
                .iter()
                .map(|edu| {
                    [&edu.qualification, &edu.board_university, &edu.college_name]
                        .iter()
                        .filter(|f| !f.is_empty())
                        .count()
                })
                .sum();
            score += filled as f64 / (self.education.len() * 3) as f64 * 0.2;
        }

        let extras =
            usize::from(self.photo.is_some()) + usize::from(self.workplace.is_some());
        score += extras as f64 / 2.0 * 0.1;

        score.min(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_profile() -> PharmacistProfile {
        PharmacistProfile {
            registration_number: "TS001234".to_string(),
            name: "Ravi Kumar".to_string(),
            father_name: "Krishna".to_string(),
            category: "BPharm".to_string(),
            status: "Active".to_string(),
            gender: "Male".to_string(),
            validity_date: NaiveDate::from_ymd_opt(2022, 12, 31),
            photo: None,
            education: vec![EducationRecord {
                qualification: "B.Pharm".to_string(),
                board_university: "Osmania University".to_string(),
                college_name: "City College of Pharmacy".to_string(),
                ..EducationRecord::default()
            }],
            workplace: Some(Workplace {
                address: "1-2-3 Main Road".to_string(),
                state: "Telangana".to_string(),
                district: "Hyderabad".to_string(),
                pincode: "500001".to_string(),
            }),
        }
    }

    #[test]
    fn bare_profile_has_no_details() {
        let profile = PharmacistProfile {
            registration_number: "TS001234".to_string(),
            name: "Ravi Kumar".to_string(),
            ..PharmacistProfile::default()
        };
        assert!(!profile.has_details());
        assert!(sample_profile().has_details());
    }

    #[test]
    fn completeness_rewards_filled_sections() {
        let full = sample_profile().completeness();
        let bare = PharmacistProfile {
            registration_number: "TS001234".to_string(),
            name: "Ravi Kumar".to_string(),
            ..PharmacistProfile::default()
        };
        assert!(full > 0.9);
        assert!(bare.completeness() < 0.3);
    }

    #[test]
    fn profile_round_trips_through_json() {
        let profile = sample_profile();
        let json = serde_json::to_string(&profile).unwrap();
        let back: PharmacistProfile = serde_json::from_str(&json).unwrap();
        assert_eq!(back, profile);
    }
}
