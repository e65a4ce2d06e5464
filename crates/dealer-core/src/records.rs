//! Dealer record types shared by every stage of the pipeline.

use serde::{Deserialize, Serialize};

/// Unvalidated output of an extraction strategy.
///
/// Every field may be empty. Strategies only emit a record when `name` is
/// non-empty; everything else is filled opportunistically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDealerRecord {
    pub name: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub phone: String,
    pub website: String,
}

impl RawDealerRecord {
    /// Start a record with just a name; callers fill in the rest.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Trim surrounding whitespace on every field.
    #[must_use]
    pub fn trimmed(self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            street: self.street.trim().to_string(),
            city: self.city.trim().to_string(),
            state: self.state.trim().to_string(),
            zip: self.zip.trim().to_string(),
            phone: self.phone.trim().to_string(),
            website: self.website.trim().to_string(),
        }
    }
}

/// Dealership classification derived from the dealership name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DealershipType {
    Franchised,
    Used,
    #[serde(rename = "Fixed Ops")]
    FixedOps,
    Collision,
    Unknown,
}

impl DealershipType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DealershipType::Franchised => "Franchised",
            DealershipType::Used => "Used",
            DealershipType::FixedOps => "Fixed Ops",
            DealershipType::Collision => "Collision",
            DealershipType::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for DealershipType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated, standardized dealership record. The terminal artifact of a
/// scrape: serialized to stdout by the CLI and written by the exporters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalDealerRecord {
    pub dealership: String,
    pub dealer_group: String,
    pub dealership_type: DealershipType,
    pub car_brand: String,
    pub address: String,
    pub city: String,
    pub state_province: String,
    pub postal_code: String,
    pub phone: String,
    pub country: String,
    pub website: String,
}

impl CanonicalDealerRecord {
    /// Column headers in export order.
    pub const COLUMNS: [&'static str; 11] = [
        "Dealership",
        "Dealer Group",
        "Dealership Type",
        "Car Brand",
        "Address",
        "City",
        "State/Province",
        "Postal Code",
        "Phone",
        "Country",
        "Website",
    ];

    /// Field values in the same order as [`Self::COLUMNS`].
    #[must_use]
    pub fn row(&self) -> [&str; 11] {
        [
            &self.dealership,
            &self.dealer_group,
            self.dealership_type.as_str(),
            &self.car_brand,
            &self.address,
            &self.city,
            &self.state_province,
            &self.postal_code,
            &self.phone,
            &self.country,
            &self.website,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dealership_type_serializes_fixed_ops_with_space() {
        let json = serde_json::to_string(&DealershipType::FixedOps).unwrap();
        assert_eq!(json, "\"Fixed Ops\"");
    }

    #[test]
    fn canonical_record_uses_camel_case_keys() {
        let record = CanonicalDealerRecord {
            dealership: "Test Motors".to_string(),
            dealer_group: "Test Group".to_string(),
            dealership_type: DealershipType::Unknown,
            car_brand: String::new(),
            address: "1 Main St".to_string(),
            city: "Springfield".to_string(),
            state_province: "IL".to_string(),
            postal_code: "62701".to_string(),
            phone: String::new(),
            country: "United States of America".to_string(),
            website: String::new(),
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["dealerGroup"], "Test Group");
        assert_eq!(value["stateProvince"], "IL");
        assert_eq!(value["postalCode"], "62701");
        assert_eq!(value["dealershipType"], "Unknown");
    }

    #[test]
    fn row_matches_column_order() {
        let record = CanonicalDealerRecord {
            dealership: "A".to_string(),
            dealer_group: "B".to_string(),
            dealership_type: DealershipType::Used,
            car_brand: "C".to_string(),
            address: "D".to_string(),
            city: "E".to_string(),
            state_province: "F".to_string(),
            postal_code: "G".to_string(),
            phone: "H".to_string(),
            country: "I".to_string(),
            website: "J".to_string(),
        };
        assert_eq!(
            record.row(),
            ["A", "B", "Used", "C", "D", "E", "F", "G", "H", "I", "J"]
        );
    }

    #[test]
    fn trimmed_strips_every_field() {
        let raw = RawDealerRecord {
            name: "  Test Motors ".to_string(),
            street: " 1 Main St\n".to_string(),
            ..RawDealerRecord::default()
        }
        .trimmed();
        assert_eq!(raw.name, "Test Motors");
        assert_eq!(raw.street, "1 Main St");
    }
}
