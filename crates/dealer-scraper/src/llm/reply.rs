//! Permissive parsing of the model's reply into raw records.

use std::sync::LazyLock;

use dealer_core::RawDealerRecord;
use regex::Regex;
use serde_json::{Map, Value};

use super::LlmError;

const WRAPPER_KEYS: &[&str] = &["items", "dealers", "dealerships", "locations"];

static STATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{2}$").expect("valid regex"));
static POSTAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\d{5}(?:-\d{4})?|[A-Z]\d[A-Z]\s?\d[A-Z]\d)$").expect("valid regex")
});
static PHONE_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{3}[-.\s]?\d{4}").expect("valid regex"));

/// Extract the list of item objects from the model's reply.
///
/// Accepts a bare array, an object wrapping one under a known key, either
/// inside a markdown code fence, or failing all that the outermost
/// `[...]` span of the text.
///
/// # Errors
///
/// Returns [`LlmError::MalformedReply`] when no JSON array can be found.
pub(crate) fn parse_reply(content: &str) -> Result<Vec<Map<String, Value>>, LlmError> {
    let body = strip_code_fence(content);
    let value = serde_json::from_str::<Value>(body).or_else(|_| {
        let start = body.find('[');
        let end = body.rfind(']');
        match (start, end) {
            (Some(s), Some(e)) if s < e => serde_json::from_str::<Value>(&body[s..=e])
                .map_err(|err| LlmError::MalformedReply(err.to_string())),
            _ => Err(LlmError::MalformedReply("no JSON array in reply".to_string())),
        }
    })?;

    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => WRAPPER_KEYS
            .iter()
            .find_map(|key| match map.remove(*key) {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            })
            .ok_or_else(|| LlmError::MalformedReply("object without an item list".to_string()))?,
        other => {
            return Err(LlmError::MalformedReply(format!(
                "expected an array, got {}",
                json_kind(&other)
            )))
        }
    };

    Ok(items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .collect())
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // drop the info string ("json") on the opening fence line
    let rest = rest.split_once('\n').map_or(rest, |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Field value by case-insensitive key; lists are joined with ", ".
fn field(item: &Map<String, Value>, key: &str) -> String {
    let value = item
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v);
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Array(parts)) => parts
            .iter()
            .filter_map(|p| match p {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        _ => String::new(),
    }
}

/// Convert reply items into records.
///
/// An item with a state that is not two letters is dropped. A postal code
/// that is neither US nor Canadian, or a phone without a 7-digit run, is
/// blanked. A missing website defaults to `page_url`.
pub(crate) fn records_from_items(
    items: &[Map<String, Value>],
    page_url: &str,
) -> Vec<RawDealerRecord> {
    items
        .iter()
        .filter_map(|item| {
            let name = field(item, "name");
            if name.is_empty() {
                return None;
            }
            let state = field(item, "state").to_ascii_uppercase();
            if !state.is_empty() && !STATE_RE.is_match(&state) {
                tracing::debug!(name, state, "dropping item with malformed state");
                return None;
            }
            let mut zip = field(item, "zip").to_ascii_uppercase();
            if !POSTAL_RE.is_match(&zip) {
                zip.clear();
            }
            let mut phone = field(item, "phone");
            if !PHONE_RUN_RE.is_match(&phone) {
                phone.clear();
            }
            let mut website = field(item, "website");
            if website.is_empty() {
                website = page_url.to_string();
            }
            Some(RawDealerRecord {
                name,
                street: field(item, "street"),
                city: field(item, "city"),
                state,
                zip,
                phone,
                website,
            })
        })
        .collect()
}
