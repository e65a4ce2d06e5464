//! Validation, standardization and deduplication of dealer records.
//!
//! Raw strategy output flows through [`normalize_records`]:
//! validate → dedupe → standardize. Rejections are counted, never surfaced
//! per record.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::address::{normalize_address_abbreviations, parse_address, restore_uppercase_tokens, title_case};
use crate::records::{CanonicalDealerRecord, DealershipType, RawDealerRecord};

/// Names that show up as card headings on locator pages but are not dealers.
const PLACEHOLDER_NAMES: &[&str] = &[
    "locations",
    "saved",
    "community news",
    "essential cookies",
    "sales",
    "service phone:",
    "parts phone:",
];

/// Phrases that mark marketing copy captured as a name.
const DESCRIPTIVE_PHRASES: &[&str] = &[
    "treat",
    "need",
    "customer",
    "concern",
    "expectation",
    "standard",
    "demonstrate",
    "about",
    "welcome to",
    "group description",
    "our mission",
];

const MAX_NAME_LEN: usize = 80;
const MAX_STREET_LEN: usize = 100;

/// Brand names recognized in dealership names.
pub const CAR_BRANDS: &[&str] = &[
    "Acura",
    "Airstream",
    "Alfa Romeo",
    "Aston Martin",
    "Audi",
    "Bentley",
    "BMW",
    "Bugatti",
    "Cadillac",
    "Chevrolet",
    "Ferrari",
    "FIAT",
    "Ford",
    "Genesis",
    "GMC",
    "Honda",
    "Hummer",
    "Hyundai",
    "Infiniti",
    "Isuzu",
    "Jaguar",
    "Kia",
    "Lamborghini",
    "Land Rover",
    "Lexus",
    "Lincoln",
    "Maserati",
    "Mazda",
    "McLaren",
    "Mercedes-Benz",
    "Mini",
    "Mitsubishi",
    "Nissan",
    "Polestar",
    "Porsche",
    "Rolls-Royce",
    "smart",
    "Sprinter",
    "Subaru",
    "Tesla",
    "Toyota",
    "Volkswagen",
    "Volvo",
    "Lotus",
    "INEOS",
    "Koenigsegg",
    "Harley-Davidson",
    "Rimac",
    "Karma",
    "Lucid",
    "Vinfast",
    "Buick",
    "Rivian",
    "Freightliner",
    "Western Star",
    "International",
    "Peterbilt",
    "Kenworth",
    "Mack",
    "Hino",
    "Autocar",
    "Fuso",
    "Maybach",
    "Pagani",
    "Chrysler",
    "Dodge",
    "Scion",
    "Jeep",
    "RAM",
];

const CDJR: &[&str] = &["chrysler", "jeep", "dodge", "ram"];

const COLLISION_KEYWORDS: &[&str] = &[
    "collision",
    "body shop",
    "autobody",
    "auto body",
    "repair center",
    "body repair",
    "repair",
];
const FIXED_OPS_KEYWORDS: &[&str] = &["service", "quick lane", "express", "maintenance", "tire", "lube"];
const USED_KEYWORDS: &[&str] = &["used", "pre-owned", "auto sales", "car sales"];

/// Canadian province and territory codes.
pub const CANADIAN_PROVINCES: &[&str] = &[
    "AB", "BC", "MB", "NB", "NL", "NS", "NT", "NU", "ON", "PE", "QC", "SK", "YT",
];

pub const COUNTRY_CANADA: &str = "Canada";
pub const COUNTRY_USA: &str = "United States of America";

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}").expect("valid regex"));
static WEBSITE_SCHEME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^https?://(www\.)?").expect("valid regex"));
static BACKSLASHES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\+").expect("valid regex"));
static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Why a raw record was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    MissingName,
    MissingStreet,
    PlaceholderName,
    DescriptiveText,
    MangledStreet,
    RelativeWebsite,
}

/// Result of normalizing one batch of raw records.
#[derive(Debug, Clone, Default)]
pub struct NormalizedBatch {
    pub records: Vec<CanonicalDealerRecord>,
    /// Raw records dropped by validation.
    pub rejected: usize,
    /// Raw records merged into an earlier record with the same name and street.
    pub duplicates: usize,
}

/// Check a raw record against the name, street and website rules.
///
/// # Errors
///
/// Returns the first [`RejectionReason`] that applies.
pub fn validate_record(record: &RawDealerRecord) -> Result<(), RejectionReason> {
    let name = record.name.trim().to_lowercase();
    let street = record.street.trim();
    let website = record.website.trim();

    if name.is_empty() {
        return Err(RejectionReason::MissingName);
    }
    if street.is_empty() {
        return Err(RejectionReason::MissingStreet);
    }
    if PLACEHOLDER_NAMES.contains(&name.as_str()) {
        return Err(RejectionReason::PlaceholderName);
    }
    if name.chars().count() > MAX_NAME_LEN
        || DESCRIPTIVE_PHRASES
            .iter()
            .any(|phrase| contains_phrase(&name, phrase))
    {
        return Err(RejectionReason::DescriptiveText);
    }
    if street.chars().count() > MAX_STREET_LEN
        || (street.to_lowercase().contains("directions") && street.contains(','))
    {
        return Err(RejectionReason::MangledStreet);
    }
    if website.starts_with('#') || website.starts_with('/') {
        return Err(RejectionReason::RelativeWebsite);
    }
    Ok(())
}

/// Drop records that share a normalized (name, street) key with an earlier
/// record. Records missing either part are always kept.
#[must_use]
pub fn dedupe_raw_records(records: Vec<RawDealerRecord>) -> Vec<RawDealerRecord> {
    let mut seen: HashSet<(String, String)> = HashSet::new();
    records
        .into_iter()
        .filter(|record| {
            let name = comparison_key(&record.name);
            let street = comparison_key(&record.street);
            if name.is_empty() || street.is_empty() {
                return true;
            }
            seen.insert((name, street))
        })
        .collect()
}

/// Lowercase and collapse whitespace for duplicate detection.
#[must_use]
pub fn comparison_key(text: &str) -> String {
    WHITESPACE_RE
        .replace_all(text.trim(), " ")
        .to_lowercase()
}

/// Validate, dedupe and standardize a batch of raw records for one dealer group.
#[must_use]
pub fn normalize_records(raw: Vec<RawDealerRecord>, dealer_group: &str) -> NormalizedBatch {
    let total = raw.len();
    let valid: Vec<RawDealerRecord> = raw
        .into_iter()
        .filter(|record| match validate_record(record) {
            Ok(()) => true,
            Err(reason) => {
                tracing::trace!(name = %record.name, ?reason, "rejected raw dealer record");
                false
            }
        })
        .collect();
    let rejected = total - valid.len();

    let valid_count = valid.len();
    let unique = dedupe_raw_records(valid);
    let duplicates = valid_count - unique.len();

    let records: Vec<CanonicalDealerRecord> = unique
        .into_iter()
        .filter_map(|record| standardize_record(record, dealer_group))
        .collect();

    tracing::debug!(
        total,
        rejected,
        duplicates,
        kept = records.len(),
        "normalized dealer records"
    );

    NormalizedBatch {
        records,
        rejected,
        duplicates,
    }
}

/// Turn one validated raw record into a canonical record.
///
/// When city or state is missing and the street holds a full address, the
/// address parser fills the gaps. Returns `None` if the standardized name or
/// address comes out empty.
#[must_use]
pub fn standardize_record(
    record: RawDealerRecord,
    dealer_group: &str,
) -> Option<CanonicalDealerRecord> {
    let record = record.trimmed();
    let dealership = normalize_name(&record.name);
    if dealership.is_empty() {
        return None;
    }

    let mut street = record.street;
    let mut city = record.city;
    let mut state = record.state;
    let mut zip = record.zip;

    if city.is_empty() || state.is_empty() {
        let parsed = parse_address(&street);
        if !parsed.street.is_empty() && !parsed.city.is_empty() {
            street = parsed.street;
            if city.is_empty() {
                city = parsed.city;
            }
            if state.is_empty() {
                state = parsed.state;
            }
            if zip.is_empty() {
                zip = parsed.postal_code;
            }
        }
    }

    let address = normalize_address_abbreviations(&street);
    if address.is_empty() {
        return None;
    }

    let state_province = state.trim().to_ascii_uppercase();
    Some(CanonicalDealerRecord {
        dealership_type: classify_dealer_type(&dealership),
        car_brand: extract_car_brands(&dealership),
        country: determine_country(&state_province).to_string(),
        dealership,
        dealer_group: dealer_group.trim().to_string(),
        address,
        city: normalize_city(&city),
        state_province,
        postal_code: zip.trim().to_string(),
        phone: extract_phone_number(&record.phone),
        website: normalize_website(&record.website),
    })
}

/// Title-case a dealership name, keeping brand and suffix tokens uppercase.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    let name = name.trim();
    if name.is_empty() {
        return String::new();
    }
    restore_uppercase_tokens(&title_case(name))
}

#[must_use]
pub fn normalize_city(city: &str) -> String {
    title_case(city.trim())
        .trim_end_matches([',', ' '])
        .to_string()
}

/// Strip scheme, `www.` and trailing slashes; turn backslashes into slashes.
#[must_use]
pub fn normalize_website(website: &str) -> String {
    let website = website.trim();
    if website.is_empty() {
        return String::new();
    }
    let stripped = WEBSITE_SCHEME_RE.replace(website, "");
    let slashed = BACKSLASHES_RE.replace_all(&stripped, "/");
    slashed.trim_end_matches('/').to_string()
}

/// First phone-number-shaped run in `text`, or empty.
#[must_use]
pub fn extract_phone_number(text: &str) -> String {
    PHONE_RE
        .find(text)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// Classify a dealership by keywords in its name: collision, then fixed-ops,
/// then used, then franchised if any brand is named.
#[must_use]
pub fn classify_dealer_type(name: &str) -> DealershipType {
    let lowered = name.to_lowercase();
    if lowered.trim().is_empty() {
        return DealershipType::Unknown;
    }
    let has_any = |keywords: &[&str]| keywords.iter().any(|k| contains_phrase(&lowered, k));

    if has_any(COLLISION_KEYWORDS) {
        DealershipType::Collision
    } else if has_any(FIXED_OPS_KEYWORDS) {
        DealershipType::FixedOps
    } else if has_any(USED_KEYWORDS) {
        DealershipType::Used
    } else if CAR_BRANDS
        .iter()
        .any(|brand| contains_phrase(&lowered, &brand.to_lowercase()))
    {
        DealershipType::Franchised
    } else {
        DealershipType::Unknown
    }
}

/// Brands named in a dealership name, `"; "`-joined. A name carrying all of
/// Chrysler, Jeep, Dodge and Ram collapses to `CDJR` (`CDJRF` with FIAT).
#[must_use]
pub fn extract_car_brands(name: &str) -> String {
    let lowered = name.to_lowercase();
    if lowered.trim().is_empty() {
        return String::new();
    }

    if CDJR.iter().all(|b| contains_phrase(&lowered, b)) {
        return if contains_phrase(&lowered, "fiat") {
            "CDJRF".to_string()
        } else {
            "CDJR".to_string()
        };
    }

    CAR_BRANDS
        .iter()
        .filter(|brand| contains_phrase(&lowered, &brand.to_lowercase()))
        .copied()
        .collect::<Vec<_>>()
        .join("; ")
}

/// `"Canada"` for the 13 province and territory codes, otherwise the US.
#[must_use]
pub fn determine_country(state_province: &str) -> &'static str {
    let code = state_province.trim().to_ascii_uppercase();
    if CANADIAN_PROVINCES.contains(&code.as_str()) {
        COUNTRY_CANADA
    } else {
        COUNTRY_USA
    }
}

/// Whole-word (or whole-phrase) containment on already-lowercased text.
fn contains_phrase(haystack: &str, phrase: &str) -> bool {
    let is_word = |c: char| c.is_alphanumeric();
    haystack.match_indices(phrase).any(|(start, matched)| {
        let end = start + matched.len();
        let before_ok = haystack[..start].chars().next_back().is_none_or(|c| !is_word(c));
        let after_ok = haystack[end..].chars().next().is_none_or(|c| !is_word(c));
        before_ok && after_ok
    })
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;
