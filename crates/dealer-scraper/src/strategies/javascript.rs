//! Inline JavaScript arrays: `var locations = [...]`, `window.dealerData = [...]`,
//! `locationData: [...]` and close relatives.

use std::sync::LazyLock;

use async_trait::async_trait;
use dealer_core::RawDealerRecord;
use regex::Regex;
use serde_json::Value;

use super::{PageInput, Strategy, Tier};
use crate::error::ExtractionError;

static SCRIPT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script\b[^>]*>(.*?)</script>").expect("valid regex"));

/// Matches up to and including the opening `[` of a location array.
static ASSIGNMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:(?:var|let|const)\s+(?:locations|dealers|stores|dealerLocations|dealerships)\s*=|window\.dealerData\s*=|locationData\s*:)\s*\[",
    )
    .expect("valid regex")
});

const NAME_KEYS: &[&str] = &["name", "title", "storeName", "locationName", "dealerName"];
const STREET_KEYS: &[&str] = &["address", "street", "streetAddress", "address1"];
const CITY_KEYS: &[&str] = &["city", "locality"];
const STATE_KEYS: &[&str] = &["state", "province", "region"];
const ZIP_KEYS: &[&str] = &["zip", "zipCode", "postalCode", "postal", "postal_code"];
const PHONE_KEYS: &[&str] = &["phone", "telephone", "phoneNumber"];
const WEBSITE_KEYS: &[&str] = &["url", "website", "link"];

pub struct JavaScriptArrayStrategy;

#[async_trait]
impl Strategy for JavaScriptArrayStrategy {
    fn name(&self) -> &'static str {
        "javascript_arrays"
    }

    fn tier(&self) -> Tier {
        Tier::Specific
    }

    fn can_handle(&self, page: &PageInput<'_>) -> bool {
        ASSIGNMENT_RE.is_match(page.html)
    }

    async fn extract(
        &self,
        page: &PageInput<'_>,
    ) -> Result<Vec<RawDealerRecord>, ExtractionError> {
        Ok(extract_js_arrays(page.html, page.url))
    }
}

fn extract_js_arrays(html: &str, page_url: &str) -> Vec<RawDealerRecord> {
    let mut records = Vec::new();

    for cap in SCRIPT_RE.captures_iter(html) {
        let Some(content) = cap.get(1).map(|m| m.as_str()) else {
            continue;
        };

        for m in ASSIGNMENT_RE.find_iter(content) {
            // The match ends with `[`, so the array starts one byte back.
            let start = m.end() - 1;
            let Some(array_src) = extract_balanced_array(&content[start..]) else {
                tracing::debug!("unterminated location array in script");
                continue;
            };
            let Some(Value::Array(items)) = parse_js_literal(array_src) else {
                tracing::debug!("location array is not parseable as JSON");
                continue;
            };
            records.extend(
                items
                    .iter()
                    .filter_map(|item| object_to_record(item, page_url)),
            );
        }
    }

    tracing::debug!(count = records.len(), "javascript location arrays parsed");
    records
}

/// Return the shortest prefix of `s` that forms a balanced `[...]` array.
///
/// Brackets inside single- or double-quoted strings are ignored, so minified
/// code following the array on the same line does not matter.
pub(crate) fn extract_balanced_array(s: &str) -> Option<&str> {
    if !s.starts_with('[') {
        return None;
    }
    let mut depth: i32 = 0;
    let mut quote: Option<char> = None;
    let mut escape = false;
    for (i, c) in s.char_indices() {
        if escape {
            escape = false;
            continue;
        }
        if let Some(q) = quote {
            match c {
                '\\' => escape = true,
                _ if c == q => quote = None,
                _ => {}
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '[' | '{' => depth += 1,
            '}' => depth -= 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse a JavaScript array/object literal: strict JSON first, then a
/// relaxed pass that fixes single quotes, bare keys and trailing commas.
pub(crate) fn parse_js_literal(src: &str) -> Option<Value> {
    serde_json::from_str(src)
        .or_else(|_| serde_json::from_str(&relax_js_literal(src)))
        .ok()
}

fn relax_js_literal(src: &str) -> String {
    let chars: Vec<char> = src.chars().collect();
    let mut out = String::with_capacity(src.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' | '\'' => {
                i = copy_string(&chars, i, &mut out);
                continue;
            }
            ']' | '}' => {
                let trimmed_len = out.trim_end().len();
                out.truncate(trimmed_len);
                if out.ends_with(',') {
                    out.pop();
                }
                out.push(c);
            }
            c if c.is_ascii_alphabetic() || c == '_' || c == '$' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_ascii_alphanumeric() || chars[i] == '_' || chars[i] == '$')
                {
                    i += 1;
                }
                let ident: String = chars[start..i].iter().collect();
                let mut j = i;
                while j < chars.len() && chars[j].is_whitespace() {
                    j += 1;
                }
                let prev = out.trim_end().chars().last();
                if chars.get(j) == Some(&':') && matches!(prev, Some('{' | ',')) {
                    out.push('"');
                    out.push_str(&ident);
                    out.push('"');
                } else {
                    out.push_str(&ident);
                }
                continue;
            }
            _ => out.push(c),
        }
        i += 1;
    }
    out
}

/// Copy a quoted string starting at `start` as a JSON double-quoted string.
/// Returns the index just past the closing quote.
fn copy_string(chars: &[char], start: usize, out: &mut String) -> usize {
    let quote = chars[start];
    out.push('"');
    let mut i = start + 1;
    while i < chars.len() {
        let c = chars[i];
        if c == '\\' {
            match chars.get(i + 1) {
                Some('\'') => out.push('\''),
                Some(&next) => {
                    out.push('\\');
                    out.push(next);
                }
                None => {}
            }
            i += 2;
            continue;
        }
        if c == quote {
            out.push('"');
            return i + 1;
        }
        if c == '"' {
            out.push_str("\\\"");
        } else {
            out.push(c);
        }
        i += 1;
    }
    i
}

fn first_text(obj: &Value, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|key| match obj.get(*key) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
        .unwrap_or_default()
}

fn object_to_record(obj: &Value, page_url: &str) -> Option<RawDealerRecord> {
    if !obj.is_object() {
        return None;
    }
    let name = first_text(obj, NAME_KEYS);
    if name.is_empty() {
        return None;
    }

    // Some widgets nest the address parts under `address`.
    let address_obj = obj.get("address").filter(|a| a.is_object());
    let source = address_obj.unwrap_or(obj);

    let mut record = RawDealerRecord::named(name);
    record.street = first_text(source, STREET_KEYS);
    record.city = first_text(source, CITY_KEYS);
    record.state = first_text(source, STATE_KEYS);
    record.zip = first_text(source, ZIP_KEYS);
    record.phone = first_text(obj, PHONE_KEYS);
    record.website = first_text(obj, WEBSITE_KEYS);
    if record.website.is_empty() {
        record.website = page_url.to_string();
    }

    let has_location = !record.street.is_empty()
        || !record.city.is_empty()
        || obj.get("lat").or_else(|| obj.get("latitude")).is_some();
    has_location.then_some(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balanced_array_ignores_brackets_in_strings() {
        let src = r#"[{"name":"A ] B","x":[1,2]}]; var other = [3];"#;
        assert_eq!(
            extract_balanced_array(src),
            Some(r#"[{"name":"A ] B","x":[1,2]}]"#)
        );
        assert_eq!(extract_balanced_array("[1, 2"), None);
        assert_eq!(extract_balanced_array("x[1]"), None);
    }

    #[test]
    fn relaxed_literals_parse() {
        let src = "[{name: 'Bob\\'s Ford', city: \"Austin\", tags: ['a', 'b',],},]";
        let value = parse_js_literal(src).unwrap();
        assert_eq!(value[0]["name"], "Bob's Ford");
        assert_eq!(value[0]["city"], "Austin");
        assert_eq!(value[0]["tags"][1], "b");
    }

    #[test]
    fn extracts_records_from_minified_scripts() {
        let html = r#"<script>window.x=1;var locations=[{"name":"North Honda","address":"1 North Rd","city":"Reno","state":"NV","zip":"89501","phone":"775-555-0100"},{"name":"Menu item"}];init(locations);</script>
            <script>
              const dealers = [
                { title: 'South Kia', address: { street: '2 South Rd', city: 'Carson City', state: 'NV' }, website: 'https://southkia.com', },
              ];
            </script>"#;
        let strategy = JavaScriptArrayStrategy;
        assert!(strategy.can_handle(&PageInput::new(html, "https://group.com")));

        let records = extract_js_arrays(html, "https://group.com/locations");
        assert_eq!(records.len(), 2, "got {records:?}");
        assert_eq!(records[0].name, "North Honda");
        assert_eq!(records[0].zip, "89501");
        assert_eq!(records[0].website, "https://group.com/locations");
        assert_eq!(records[1].name, "South Kia");
        assert_eq!(records[1].street, "2 South Rd");
        assert_eq!(records[1].city, "Carson City");
        assert_eq!(records[1].website, "https://southkia.com");
    }
}
