//! Text patterns shared by the strategies: phone numbers, `City, ST ZIP`
//! lines and US state names.

use std::sync::LazyLock;

use regex::Regex;

pub(crate) static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}").expect("valid regex")
});

/// `City, ST 12345` anywhere in a line.
pub(crate) static CITY_STATE_ZIP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([^,\n]+),\s*([A-Z]{2})\s*(\d{5})(?:-\d{4})?").expect("valid regex")
});

/// Whole-line `City/State/ZIP` shapes, most specific first. Group 1 is the
/// city, group 2 the state (code or full name), group 3 the ZIP when present.
static CITY_STATE_ZIP_LINE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^([^,<>]+),\s*([A-Z]{2})\s*(\d{5})(?:-\d{4})?$",
        r"^([^,<>]+)\s+([A-Z]{2}),\s*(\d{5})(?:-\d{4})?$",
        r"^([^,<>]+)\s+([A-Z]{2})\s*(\d{5})(?:-\d{4})?$",
        r"^([^,<>]+),\s*([A-Za-z][A-Za-z ]+?)\s*(\d{5})(?:-\d{4})?$",
        r"^([^,<>]+)\s+([A-Za-z][A-Za-z ]+),\s*(\d{5})(?:-\d{4})?$",
        r"^([^,<>]+),\s*([A-Z]{2})\s*(\d{4})(?:-\d{4})?$",
        r"^([^,<>]+),\s*([A-Z]{2})$",
        r"^([^,<>]+)\s+([A-Z]{2})$",
        r"^([^,<>]+),\s*([A-Za-z][A-Za-z ]+)$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

const STATE_NAMES: &[(&str, &str)] = &[
    ("alabama", "AL"),
    ("alaska", "AK"),
    ("arizona", "AZ"),
    ("arkansas", "AR"),
    ("california", "CA"),
    ("colorado", "CO"),
    ("connecticut", "CT"),
    ("delaware", "DE"),
    ("district of columbia", "DC"),
    ("washington dc", "DC"),
    ("florida", "FL"),
    ("georgia", "GA"),
    ("hawaii", "HI"),
    ("idaho", "ID"),
    ("illinois", "IL"),
    ("indiana", "IN"),
    ("iowa", "IA"),
    ("kansas", "KS"),
    ("kentucky", "KY"),
    ("louisiana", "LA"),
    ("maine", "ME"),
    ("maryland", "MD"),
    ("massachusetts", "MA"),
    ("michigan", "MI"),
    ("minnesota", "MN"),
    ("mississippi", "MS"),
    ("missouri", "MO"),
    ("montana", "MT"),
    ("nebraska", "NE"),
    ("nevada", "NV"),
    ("new hampshire", "NH"),
    ("new jersey", "NJ"),
    ("new mexico", "NM"),
    ("new york", "NY"),
    ("north carolina", "NC"),
    ("north dakota", "ND"),
    ("ohio", "OH"),
    ("oklahoma", "OK"),
    ("oregon", "OR"),
    ("pennsylvania", "PA"),
    ("rhode island", "RI"),
    ("south carolina", "SC"),
    ("south dakota", "SD"),
    ("tennessee", "TN"),
    ("texas", "TX"),
    ("utah", "UT"),
    ("vermont", "VT"),
    ("virginia", "VA"),
    ("washington", "WA"),
    ("west virginia", "WV"),
    ("wisconsin", "WI"),
    ("wyoming", "WY"),
];

/// City, state and ZIP pulled out of one line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct CityStateZip {
    pub city: String,
    pub state: String,
    pub zip: String,
}

/// Map a state token to its two-letter code. Two-letter input is uppercased,
/// full names are looked up; anything else comes back trimmed and unchanged.
pub(crate) fn normalize_state(token: &str) -> String {
    let cleaned = token.trim().trim_end_matches('.').trim();
    if cleaned.len() == 2 && cleaned.chars().all(|c| c.is_ascii_alphabetic()) {
        return cleaned.to_ascii_uppercase();
    }
    let lowered = cleaned.to_ascii_lowercase();
    STATE_NAMES
        .iter()
        .find(|(name, _)| *name == lowered)
        .map_or_else(|| cleaned.to_string(), |(_, code)| (*code).to_string())
}

/// Match a whole line against the `City, ST ZIP` family. Full state names
/// only count when they map to a known state.
pub(crate) fn parse_city_state_zip_line(line: &str) -> Option<CityStateZip> {
    let line = line.trim();
    CITY_STATE_ZIP_LINE_PATTERNS.iter().find_map(|re| {
        let caps = re.captures(line)?;
        let state = normalize_state(&caps[2]);
        if state.len() != 2 {
            return None;
        }
        Some(CityStateZip {
            city: caps[1].trim().to_string(),
            state,
            zip: caps.get(3).map(|m| m.as_str().to_string()).unwrap_or_default(),
        })
    })
}

/// Find the first line containing `City, ST 12345`; returns its index.
pub(crate) fn find_city_state_zip(lines: &[String]) -> Option<(usize, CityStateZip)> {
    lines.iter().enumerate().find_map(|(idx, line)| {
        CITY_STATE_ZIP_RE.captures(line).map(|caps| {
            (
                idx,
                CityStateZip {
                    city: caps[1].trim().to_string(),
                    state: caps[2].to_string(),
                    zip: caps[3].to_string(),
                },
            )
        })
    })
}

/// First phone number found in any of `lines`.
pub(crate) fn find_phone<S: AsRef<str>>(lines: &[S]) -> String {
    lines
        .iter()
        .find_map(|line| PHONE_RE.find(line.as_ref()))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// Phone number from a `tel:` href, keeping only dialable characters.
pub(crate) fn phone_from_tel_href(href: &str) -> Option<String> {
    let rest = href.trim().strip_prefix("tel:")?;
    let cleaned = clean_phone(rest);
    (!cleaned.is_empty()).then_some(cleaned)
}

/// Keep digits and the usual phone punctuation.
pub(crate) fn clean_phone(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '-' | '(' | ')' | ' ' | '+' | '.'))
        .collect::<String>()
        .trim()
        .to_string()
}
