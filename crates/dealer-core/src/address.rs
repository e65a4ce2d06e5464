//! Free-text address parsing for US and Canadian dealership addresses.
//!
//! Parsing never fabricates: anything that does not fit one of the known
//! shapes comes back as four empty strings.

use std::sync::LazyLock;

use regex::Regex;

const US_ZIP: &str = r"\d{5}(?:-\d{4})?";
const CA_POSTAL: &str = r"[A-Za-z]\d[A-Za-z]\s?\d[A-Za-z]\d";

static WITH_COUNTRY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^(.*?),\s*([^,]+?),\s*([A-Z]{{2}})\s+({US_ZIP}|{CA_POSTAL})(?:,\s*[^,]+)?\s*$"
    ))
    .expect("valid regex")
});
static WITHOUT_COUNTRY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^(.*?),\s*([^,]+?),\s*([A-Za-z]{{2}})\s+({US_ZIP}|{CA_POSTAL})\s*$"
    ))
    .expect("valid regex")
});
static CA_STATE_POSTAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"([A-Z]{{2}})\s+({CA_POSTAL})")).expect("valid regex")
});
static US_STATE_ZIP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"([A-Z]{{2}})\s+({US_ZIP})")).expect("valid regex"));
static CA_POSTAL_EXACT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!("^{CA_POSTAL}$")).expect("valid regex"));

static ABBREVIATIONS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        ("Street", "St"),
        ("Avenue", "Ave"),
        ("Boulevard", "Blvd"),
        ("Highway", "Hwy"),
        ("Lane", "Ln"),
        ("Drive", "Dr"),
        ("Road", "Rd"),
        ("Parkway", "Pkwy"),
        ("Expressway", "Expy"),
    ]
    .into_iter()
    .map(|(word, abbr)| {
        (
            Regex::new(&format!(r"(?i)\b{word}\b")).expect("valid regex"),
            abbr,
        )
    })
    .collect()
});

/// Tokens that title-casing would corrupt and that are restored verbatim.
pub const UPPERCASE_TOKENS: &[&str] = &[
    "NE", "NW", "SE", "SW", "GMC", "FIAT", "RAM", "BMW", "USA", "II", "III", "IV", "LLC", "INC",
    "LTD", "CDJR", "CDJRF",
];

static UPPERCASE_RES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    UPPERCASE_TOKENS
        .iter()
        .map(|token| {
            let titled = title_case(token);
            (
                Regex::new(&format!(r"\b{titled}\b")).expect("valid regex"),
                *token,
            )
        })
        .collect()
});

static TRAILING_PUNCT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.,\s]+$").expect("valid regex"));

/// Address components. Any field may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedAddress {
    pub street: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
}

impl ParsedAddress {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.street.is_empty()
            && self.city.is_empty()
            && self.state.is_empty()
            && self.postal_code.is_empty()
    }
}

/// Parse a combined address string into street, city, state/province and
/// postal code.
///
/// Tries a strict `Street, City, ST ZIP, Country` match, then the same shape
/// without a country, then a comma-split fallback. Returns an empty
/// [`ParsedAddress`] when none of them apply.
#[must_use]
pub fn parse_address(text: &str) -> ParsedAddress {
    let text = text.trim();
    if text.is_empty() {
        return ParsedAddress::default();
    }

    for re in [&*WITH_COUNTRY_RE, &*WITHOUT_COUNTRY_RE] {
        if let Some(caps) = re.captures(text) {
            return ParsedAddress {
                street: caps[1].trim().to_string(),
                city: caps[2].trim().to_string(),
                state: caps[3].trim().to_ascii_uppercase(),
                postal_code: format_postal_code(caps[4].trim()),
            };
        }
    }

    parse_fallback(text)
}

fn parse_fallback(text: &str) -> ParsedAddress {
    let parts: Vec<&str> = text
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    if parts.len() < 3 {
        return ParsedAddress::default();
    }

    let last = parts[parts.len() - 1];
    let last_tokens: Vec<&str> = last.split_whitespace().collect();

    let (state, postal_code) = if parts.len() >= 4 && last_tokens.len() == 1 {
        // Street, City, ST, ZIP[, Country]
        (parts[2].to_ascii_uppercase(), parts[3].to_string())
    } else if last_tokens.len() >= 2 {
        (last_tokens[0].to_ascii_uppercase(), last_tokens[1].to_string())
    } else {
        extract_state_postal(last)
    };

    ParsedAddress {
        street: parts[0].to_string(),
        city: parts[1].to_string(),
        state,
        postal_code: format_postal_code(&postal_code),
    }
}

/// Search free text for a `ST 12345` or `PR A1A 1A1` pair. Canadian codes win
/// when both are present.
#[must_use]
pub fn extract_state_postal(text: &str) -> (String, String) {
    if let Some(caps) = CA_STATE_POSTAL_RE.captures(text) {
        return (caps[1].to_string(), caps[2].to_string());
    }
    if let Some(caps) = US_STATE_ZIP_RE.captures(text) {
        return (caps[1].to_string(), caps[2].to_string());
    }
    (String::new(), String::new())
}

/// Insert the missing space in a Canadian postal code (`M5V3A1` -> `M5V 3A1`).
/// US ZIP codes pass through untouched.
#[must_use]
pub fn format_postal_code(code: &str) -> String {
    if CA_POSTAL_EXACT_RE.is_match(code) {
        let compact: String = code
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_uppercase();
        if compact.len() == 6 {
            return format!("{} {}", &compact[..3], &compact[3..]);
        }
    }
    code.to_string()
}

/// Rewrite long street suffixes to their short forms, title-case the result,
/// restore whitelisted uppercase tokens and trim trailing punctuation.
#[must_use]
pub fn normalize_address_abbreviations(address: &str) -> String {
    if address.trim().is_empty() {
        return String::new();
    }

    let mut normalized = address.to_string();
    for (re, abbr) in ABBREVIATIONS.iter() {
        normalized = re.replace_all(&normalized, *abbr).into_owned();
    }

    let normalized = restore_uppercase_tokens(&title_case(&normalized));
    TRAILING_PUNCT_RE.replace(&normalized, "").into_owned()
}

/// Title-case every word. A word starts after whitespace or punctuation, but
/// not after a digit or apostrophe, so `4th` and `Rick's` survive intact.
#[must_use]
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut at_word_start = true;
    for ch in text.chars() {
        if ch.is_alphabetic() {
            if at_word_start {
                out.extend(ch.to_uppercase());
            } else {
                out.extend(ch.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(ch);
            at_word_start = !(ch.is_alphanumeric() || ch == '\'' || ch == '\u{2019}');
        }
    }
    out
}

/// Put back tokens like `GMC` or `NW` that [`title_case`] turned into `Gmc`/`Nw`.
#[must_use]
pub fn restore_uppercase_tokens(text: &str) -> String {
    let mut out = text.to_string();
    for (re, token) in UPPERCASE_RES.iter() {
        out = re.replace_all(&out, *token).into_owned();
    }
    out
}

#[cfg(test)]
#[path = "address_test.rs"]
mod tests;
