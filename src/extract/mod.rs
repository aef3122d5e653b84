//! Page extraction for the council website.
//!
//! The council publishes two relevant pages: a roster listing every
//! registered pharmacist in a single table, and a search endpoint that
//! returns a detail page per registration number. The parsing functions
//! here are pure (`&str` in, records out) so they can be exercised against
//! fixture pages; [`Extractor`] drives them through the rate-limited
//! client.

pub mod html;

use chrono::NaiveDate;
use rustc_hash::FxHashSet;

use crate::client::{RegistryClient, RequestStats};
use crate::config::Config;
use crate::error::{RegistryError, Result};
use crate::models::record::SerialNumber;
use crate::models::{EducationRecord, PharmacistProfile, PharmacistRecord, Workplace};
use crate::models::record::{clean_name, normalize_category};
use crate::storage::Checkpoint;
use crate::utils::progress;

/// Path of the full roster listing
pub const LISTING_PATH: &str = "/pharmacy/srchpharmacisttotal";
/// Path of the per-registration search endpoint
pub const SEARCH_PATH: &str = "/pharmacy/getsearchpharmacist";
/// `id` attribute of the roster table
const ROSTER_TABLE_ID: &str = "tablesorter-demo";
/// Checkpoint save interval during batch fetches
const CHECKPOINT_EVERY: usize = 10;
/// Date format the detail page prints validity dates in (`31-Dec-2022`)
const VALIDITY_FORMAT: &str = "%d-%b-%Y";

/// Anything that can produce the current roster listing.
///
/// The sync engine depends on this trait rather than on [`Extractor`]
/// directly, so tests can drive it from fixture data.
pub trait ListingSource {
    /// Human-readable name of the source, used in log lines.
    fn source_name(&self) -> &'static str;

    /// Fetch the current listing.
    ///
    /// # Errors
    /// Implementations propagate fetch and parse failures.
    fn fetch_listing(&mut self) -> Result<Vec<PharmacistRecord>>;
}

/// Extracts roster records and detail profiles from the council website
#[derive(Debug)]
pub struct Extractor {
    client: RegistryClient,
    listing_url: String,
    search_url: String,
}

impl Extractor {
    /// Build an extractor against the configured base URL.
    ///
    /// # Errors
    /// Returns an error when the HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self> {
        let base = config.base_url.trim_end_matches('/');
        Ok(Self {
            client: RegistryClient::new(config)?,
            listing_url: format!("{base}{LISTING_PATH}"),
            search_url: format!("{base}{SEARCH_PATH}"),
        })
    }

    /// Current total of registered pharmacists on the roster page.
    ///
    /// # Errors
    /// Propagates fetch failures and a missing roster table.
    pub fn total_count(&mut self) -> Result<usize> {
        log::info!("fetching total pharmacist count");
        let page = self.client.get(&self.listing_url)?;
        listing_count(&page)
    }

    /// All basic records from the roster page.
    ///
    /// # Errors
    /// Propagates fetch failures and a missing roster table.
    pub fn basic_records(&mut self) -> Result<Vec<PharmacistRecord>> {
        log::info!("extracting basic pharmacist records");
        let page = self.client.get(&self.listing_url)?;
        let records = parse_listing(&page)?;
        log::info!("extracted {} records from the roster", records.len());
        Ok(records)
    }

    /// Detail profile for one registration number, `None` when the site
    /// reports no match.
    ///
    /// # Errors
    /// Propagates fetch failures and a malformed detail page.
    pub fn profile(&mut self, registration_number: &str) -> Result<Option<PharmacistProfile>> {
        log::debug!("fetching profile for {registration_number}");
        let form = [
            ("registration_no", registration_number),
            ("app_name", ""),
            ("father_name", ""),
            ("dob", ""),
            ("submit", "Submit"),
        ];
        let page = self.client.post_form(&self.search_url, &form)?;
        parse_profile(&page, registration_number)
    }

    /// Fetch profiles for a batch of registration numbers, resuming from
    /// and updating the checkpoint.
    ///
    /// Individual failures mark the number as failed and move on; an open
    /// circuit breaker aborts the whole batch after saving the checkpoint.
    ///
    /// # Errors
    /// Returns an error when the breaker opens or the checkpoint cannot be
    /// saved.
    pub fn batch_profiles(
        &mut self,
        registration_numbers: &[String],
        checkpoint: &mut Checkpoint,
    ) -> Result<Vec<PharmacistProfile>> {
        let pending = pending_numbers(registration_numbers, checkpoint);
        log::info!(
            "batch extraction: {} pending of {} requested",
            pending.len(),
            registration_numbers.len()
        );

        let bar = progress::create_batch_progress_bar(pending.len() as u64, Some("profiles"));
        let mut profiles = Vec::new();

        for (index, registration_number) in pending.iter().enumerate() {
            match self.profile(registration_number) {
                Ok(Some(profile)) => {
                    checkpoint.record_completed(registration_number);
                    profiles.push(profile);
                }
                Ok(None) => {
                    log::warn!("no profile found for {registration_number}");
                    checkpoint.record_failed(registration_number);
                }
                Err(err @ RegistryError::CircuitOpen { .. }) => {
                    checkpoint.last_index = index;
                    checkpoint.save()?;
                    progress::finish_progress_bar(&bar, Some("aborted"));
                    return Err(err);
                }
                Err(err) => {
                    log::error!("failed to fetch profile for {registration_number}: {err}");
                    checkpoint.record_failed(registration_number);
                }
            }

            checkpoint.last_index = index + 1;
            bar.inc(1);
            if (index + 1) % CHECKPOINT_EVERY == 0 {
                checkpoint.save()?;
            }
        }

        checkpoint.save()?;
        progress::finish_progress_bar(&bar, Some("done"));
        log::info!("batch extraction completed: {} profiles", profiles.len());
        Ok(profiles)
    }

    /// Request statistics from the underlying client.
    #[must_use]
    pub fn stats(&self) -> &RequestStats {
        self.client.stats()
    }
}

impl ListingSource for Extractor {
    fn source_name(&self) -> &'static str {
        "council website"
    }

    fn fetch_listing(&mut self) -> Result<Vec<PharmacistRecord>> {
        self.basic_records()
    }
}

/// Registration numbers not yet marked in the checkpoint, in input order.
#[must_use]
pub fn pending_numbers(registration_numbers: &[String], checkpoint: &Checkpoint) -> Vec<String> {
    let mut seen: FxHashSet<&str> = FxHashSet::default();
    seen.extend(checkpoint.completed.iter().map(String::as_str));
    seen.extend(checkpoint.failed.iter().map(String::as_str));

    registration_numbers
        .iter()
        .filter(|r| !seen.contains(r.as_str()))
        .cloned()
        .collect()
}

/// The roster table of a listing page: by id, falling back to the first
/// table.
fn roster_table(page: &str) -> Result<&str> {
    html::table_with_id(page, ROSTER_TABLE_ID)
        .or_else(|| html::tables(page).into_iter().next())
        .ok_or_else(|| RegistryError::Parse("could not locate the roster table".to_string()))
}

/// Parse the roster listing into records.
///
/// The header row is skipped; rows with fewer than five cells are ignored,
/// and rows whose record fails normalization are logged and dropped.
///
/// # Errors
/// Returns [`RegistryError::Parse`] when no table is present at all.
pub fn parse_listing(page: &str) -> Result<Vec<PharmacistRecord>> {
    let table = roster_table(page)?;
    let rows = html::rows(table);

    let mut records = Vec::new();
    for row in rows.iter().skip(1) {
        let cells = html::cells(row);
        if cells.len() < 5 {
            continue;
        }
        match PharmacistRecord::new(
            SerialNumber::parse(&cells[0]),
            &cells[1],
            &cells[2],
            &cells[3],
            &cells[4],
        ) {
            Ok(record) => records.push(record),
            Err(err) => log::warn!("skipping roster row {:?}: {err}", &cells[..5]),
        }
    }

    Ok(records)
}

/// Count of pharmacists on the listing page: distinct numeric serials, or
/// the data-row count when no serial parses.
///
/// # Errors
/// Returns [`RegistryError::Parse`] when the roster table or its rows are
/// missing.
pub fn listing_count(page: &str) -> Result<usize> {
    let table = roster_table(page)?;
    let data_rows: Vec<&str> = html::rows(table)
        .into_iter()
        .filter(|row| !html::tag_blocks(row, "td").is_empty())
        .collect();

    if data_rows.is_empty() {
        return Err(RegistryError::Parse(
            "no pharmacist rows found in the roster table".to_string(),
        ));
    }

    let serials: FxHashSet<u64> = data_rows
        .iter()
        .filter_map(|row| html::cells(row).first()?.parse::<u64>().ok())
        .collect();

    if serials.is_empty() {
        Ok(data_rows.len())
    } else {
        Ok(serials.len())
    }
}

/// Parse a detail page into a profile, `None` when the site found nothing.
///
/// # Errors
/// Currently infallible beyond the `Option`; kept fallible for parity with
/// the other parsers.
pub fn parse_profile(page: &str, registration_number: &str) -> Result<Option<PharmacistProfile>> {
    if page.contains("No Records Found") || page.contains("No records found") {
        return Ok(None);
    }

    let tables = html::tables(page);
    if tables.is_empty() {
        return Ok(None);
    }

    let mut profile = PharmacistProfile {
        registration_number: registration_number.to_string(),
        ..PharmacistProfile::default()
    };
    let mut found_any = false;

    if let Some(info) = tables.first() {
        found_any |= parse_info_table(info, &mut profile);
    }
    if let Some(education) = tables.get(1) {
        parse_education_table(education, &mut profile.education);
        found_any |= !profile.education.is_empty();
    }
    if let Some(work) = tables.get(2) {
        profile.workplace = parse_workplace_table(work);
        found_any |= profile.workplace.is_some();
    }

    Ok(found_any.then_some(profile))
}

/// Header-keyword mapping of the pharmacist info table. Returns whether any
/// field was filled.
fn parse_info_table(table: &str, profile: &mut PharmacistProfile) -> bool {
    let rows = html::rows(table);
    let (Some(header_row), Some(data_row)) = (rows.first(), rows.get(1)) else {
        return false;
    };

    let headers = html::cells(header_row);
    let values = html::cells(data_row);
    let fragments = html::cell_fragments(data_row);
    let mut filled = false;

    for (index, header) in headers.iter().enumerate() {
        let Some(value) = values.get(index) else {
            break;
        };
        let header = header.to_lowercase();
        let last_column = index == headers.len() - 1;

        if header.contains("name") && !header.contains("father") {
            profile.name = clean_name(value);
            filled |= !profile.name.is_empty();
        } else if header.contains("father") || header.contains("husband") {
            profile.father_name = clean_name(value);
            filled |= !profile.father_name.is_empty();
        } else if header.contains("category") || header.contains("qualification") {
            profile.category = normalize_category(value);
            filled |= !profile.category.is_empty();
        } else if header.contains("status") {
            profile.status = value.clone();
            filled |= !profile.status.is_empty();
        } else if header.contains("gender") || header.contains("sex") {
            profile.gender = value.clone();
            filled |= !profile.gender.is_empty();
        } else if header.contains("validity") {
            profile.validity_date = NaiveDate::parse_from_str(value, VALIDITY_FORMAT).ok();
            filled |= profile.validity_date.is_some();
        } else if header.contains("photo") || last_column {
            // Photo sits in the last column; keep the src only when it
            // carries alphanumeric content (data URIs included).
            if let Some(fragment) = fragments.get(index) {
                if let Some(src) = photo_source(fragment) {
                    profile.photo = Some(src);
                    filled = true;
                }
            }
        }
    }

    filled
}

fn photo_source(fragment: &str) -> Option<String> {
    let start = fragment.find("<img").or_else(|| fragment.find("<IMG"))?;
    let src = html::attr(&fragment[start..], "src")?;
    src.chars().any(|c| c.is_ascii_alphanumeric()).then_some(src)
}

/// Rows of the academic information table (7 columns per row).
fn parse_education_table(table: &str, education: &mut Vec<EducationRecord>) {
    for row in html::rows(table).iter().skip(1) {
        let cells = html::cells(row);
        if cells.len() < 7 {
            continue;
        }
        education.push(EducationRecord {
            qualification: cells[0].clone(),
            board_university: cells[1].clone(),
            college_name: cells[2].clone(),
            college_address: cells[3].clone(),
            academic_year_from: cells[4].clone(),
            academic_year_to: cells[5].clone(),
            hallticket_no: cells[6].clone(),
        });
    }
}

/// First data row of the working/studying table (4 columns).
fn parse_workplace_table(table: &str) -> Option<Workplace> {
    let rows = html::rows(table);
    let cells = html::cells(rows.get(1)?);
    if cells.len() < 4 {
        return None;
    }
    Some(Workplace {
        address: cells[0].clone(),
        state: cells[1].clone(),
        district: cells[2].clone(),
        pincode: cells[3].clone(),
    })
}
