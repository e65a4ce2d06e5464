//! schema.org JSON-LD: `AutoDealer`, `AutomotiveBusiness` and `LocalBusiness`
//! entities collected from arbitrarily nested `ld+json` blocks.

use std::sync::LazyLock;

use async_trait::async_trait;
use dealer_core::{parse_address, RawDealerRecord};
use regex::Regex;
use serde_json::Value;

use super::{PageInput, Strategy, Tier};
use crate::error::ExtractionError;

const DEALER_TYPES: &[&str] = &["AutoDealer", "AutomotiveBusiness", "LocalBusiness"];

/// Whole-word name terms that mark a corporate or head-office entity.
const CORPORATE_TERMS: &[&str] = &[
    "auto group",
    "automotive group",
    "corporation",
    "corp",
    "corporate",
    "headquarters",
    "hq",
];

static LD_JSON_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<script[^>]+type\s*=\s*["']application/ld\+json["'][^>]*>(.*?)</script>"#)
        .expect("valid regex")
});

pub struct JsonLdStrategy;

#[async_trait]
impl Strategy for JsonLdStrategy {
    fn name(&self) -> &'static str {
        "json_ld"
    }

    fn tier(&self) -> Tier {
        Tier::Specific
    }

    fn can_handle(&self, page: &PageInput<'_>) -> bool {
        LD_JSON_RE.is_match(page.html)
    }

    async fn extract(
        &self,
        page: &PageInput<'_>,
    ) -> Result<Vec<RawDealerRecord>, ExtractionError> {
        Ok(extract_jsonld(page.html, page.url))
    }
}

fn extract_jsonld(html: &str, page_url: &str) -> Vec<RawDealerRecord> {
    let mut records = Vec::new();
    for cap in LD_JSON_RE.captures_iter(html) {
        let Some(body) = cap.get(1) else { continue };
        let value: Value = match serde_json::from_str(body.as_str().trim()) {
            Ok(v) => v,
            Err(error) => {
                tracing::debug!(%error, "skipping unparsable ld+json block");
                continue;
            }
        };

        let mut entities = Vec::new();
        collect_dealer_entities(&value, &mut entities);
        records.extend(
            entities
                .into_iter()
                .filter_map(|entity| entity_to_record(entity, page_url)),
        );
    }
    tracing::debug!(count = records.len(), "json-ld entities parsed");
    records
}

fn has_dealer_type(entity: &Value) -> bool {
    match entity.get("@type") {
        Some(Value::String(t)) => DEALER_TYPES.contains(&t.as_str()),
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(Value::as_str)
            .any(|t| DEALER_TYPES.contains(&t)),
        _ => false,
    }
}

/// Depth-first walk collecting every object with a dealer `@type`.
/// `department` sub-entities belong to their parent and are not collected.
fn collect_dealer_entities<'a>(value: &'a Value, out: &mut Vec<&'a Value>) {
    match value {
        Value::Object(map) => {
            if has_dealer_type(value) {
                out.push(value);
            }
            for (key, child) in map {
                if key != "department" {
                    collect_dealer_entities(child, out);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_dealer_entities(item, out);
            }
        }
        _ => {}
    }
}

fn is_corporate(entity: &Value, name: &str) -> bool {
    if entity.get("department").is_some() {
        return true;
    }
    let lowered = name.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    CORPORATE_TERMS.iter().any(|term| {
        let term_words: Vec<&str> = term.split(' ').collect();
        words.windows(term_words.len()).any(|w| w == term_words.as_slice())
    })
}

/// A scalar as text; lists contribute their first element.
fn scalar_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Array(items)) => scalar_text(items.first()),
        _ => String::new(),
    }
}

fn entity_to_record(entity: &Value, page_url: &str) -> Option<RawDealerRecord> {
    let name = scalar_text(entity.get("name"));
    if name.is_empty() {
        return None;
    }
    if is_corporate(entity, &name) {
        tracing::debug!(name, "skipping corporate json-ld entity");
        return None;
    }

    let mut record = RawDealerRecord::named(name);

    let address = match entity.get("address") {
        Some(Value::Array(items)) => items.first(),
        other => other,
    };
    match address {
        Some(address @ Value::Object(_)) => {
            record.street = scalar_text(address.get("streetAddress"));
            record.city = scalar_text(address.get("addressLocality"));
            record.state = scalar_text(address.get("addressRegion"));
            record.zip = scalar_text(address.get("postalCode"));
        }
        Some(Value::String(text)) => {
            let parsed = parse_address(text);
            if parsed.is_empty() {
                record.street = text.trim().to_string();
            } else {
                record.street = parsed.street;
                record.city = parsed.city;
                record.state = parsed.state;
                record.zip = parsed.postal_code;
            }
        }
        _ => {}
    }

    record.phone = scalar_text(entity.get("telephone"));
    let website = scalar_text(entity.get("url"));
    record.website = if website.is_empty() {
        page_url.to_string()
    } else {
        website
    };

    Some(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_auto_dealer_yields_one_record_with_empty_phone() {
        let html = r#"<html><head><script type="application/ld+json">
            {"@context":"https://schema.org","@type":"AutoDealer","name":"Test Motors",
             "address":{"@type":"PostalAddress","streetAddress":"1 Main St","addressLocality":"Springfield"}}
            </script></head><body></body></html>"#;
        let strategy = JsonLdStrategy;
        assert!(strategy.can_handle(&PageInput::new(html, "https://testmotors.com")));

        let records = extract_jsonld(html, "https://testmotors.com");
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.name, "Test Motors");
        assert_eq!(record.street, "1 Main St");
        assert_eq!(record.city, "Springfield");
        assert_eq!(record.phone, "");
        assert_eq!(record.website, "https://testmotors.com");
    }

    #[test]
    fn collects_nested_graph_entities_and_skips_corporate_ones() {
        let html = r#"<script type='application/ld+json'>
            {"@graph":[
              {"@type":"Organization","name":"Parent Co",
               "subOrganization":[
                 {"@type":["AutoDealer","LocalBusiness"],"name":"North Ford",
                  "address":"10 North Rd, Fargo, ND 58102",
                  "telephone":["701-555-0100","701-555-0101"],
                  "url":["https://northford.com"]},
                 {"@type":"AutoDealer","name":"Smith Auto Group HQ",
                  "address":{"streetAddress":"1 Corporate Way"}},
                 {"@type":"AutomotiveBusiness","name":"South Chevrolet",
                  "address":[{"streetAddress":"5 South St","addressRegion":"SD"}],
                  "department":[{"@type":"AutoDealer","name":"South Chevrolet Service"}]}
               ]}
            ]}
            </script>
            <script type="application/ld+json">{ not json </script>"#;

        let records = extract_jsonld(html, "https://example.com/locations");
        assert_eq!(records.len(), 1, "got {records:?}");
        let record = &records[0];
        assert_eq!(record.name, "North Ford");
        assert_eq!(record.street, "10 North Rd");
        assert_eq!(record.city, "Fargo");
        assert_eq!(record.state, "ND");
        assert_eq!(record.zip, "58102");
        assert_eq!(record.phone, "701-555-0100");
        assert_eq!(record.website, "https://northford.com");
    }
}
