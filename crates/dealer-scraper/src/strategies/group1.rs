//! Group 1 Automotive dealer results (`div.dealerResults__listing`).
//!
//! The address block comes in several shapes:
//! `Street | City, State ZIP`, `Street, City | State ZIP`,
//! `Street, City, State ZIP` and `Street City, State ZIP`. State may be a
//! code or a full name.

use std::sync::LazyLock;

use async_trait::async_trait;
use dealer_core::RawDealerRecord;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::{PageInput, Strategy, Tier};
use crate::dom::{select_attr, select_text, text_of};
use crate::error::ExtractionError;
use crate::patterns::{clean_phone, normalize_state, phone_from_tel_href};

static LISTING: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.dealerResults__listing").expect("valid selector"));
static NAME: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(".dealerResults__listing--name").expect("valid selector")
});
static ADDRESS: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(".dealerResults__listing--address").expect("valid selector")
});
static PHONE_LINKS: LazyLock<[Selector; 3]> = LazyLock::new(|| {
    [
        ".dealerResults__listing--phoneSales a",
        ".dealerResults__listing--phoneService a",
        "a[href^='tel:']",
    ]
    .map(|css| Selector::parse(css).expect("valid selector"))
});
static WEBSITE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".website").expect("valid selector"));
static EXTERNAL_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href^='http']").expect("valid selector"));

static THREE_PART_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+),\s*(.+?),\s*([A-Za-z.\s]+?)(?:\s+(\d{5}))?$").expect("valid regex")
});

const MULTI_WORD_CITIES: &[&str] = &[
    "Clear Lake",
    "Sugar Land",
    "Round Rock",
    "El Paso",
    "Santa Fe",
    "Newport Beach",
    "Beverly Hills",
    "Panama City",
    "Rock Hill",
    "Rockville Centre",
    "Landover Hills",
];

pub struct Group1Strategy;

#[async_trait]
impl Strategy for Group1Strategy {
    fn name(&self) -> &'static str {
        "group1"
    }

    fn tier(&self) -> Tier {
        Tier::Specific
    }

    fn can_handle(&self, page: &PageInput<'_>) -> bool {
        page.html.contains("dealerResults__listing")
            && Html::parse_document(page.html)
                .select(&LISTING)
                .next()
                .is_some()
    }

    async fn extract(
        &self,
        page: &PageInput<'_>,
    ) -> Result<Vec<RawDealerRecord>, ExtractionError> {
        let doc = Html::parse_document(page.html);
        let records: Vec<RawDealerRecord> = doc
            .select(&LISTING)
            .filter_map(|listing| parse_listing(listing, page.url))
            .collect();
        tracing::debug!(count = records.len(), "group1 listings parsed");
        Ok(records)
    }
}

fn parse_listing(listing: ElementRef<'_>, page_url: &str) -> Option<RawDealerRecord> {
    let name = select_text(listing, &NAME);
    if name.is_empty() {
        tracing::trace!("group1 listing without a name");
        return None;
    }

    let address = select_text(listing, &ADDRESS);
    let (street, city, state, zip) = split_group1_address(&address);

    let phone = PHONE_LINKS
        .iter()
        .find_map(|sel| listing.select(sel).next())
        .map(|link| {
            link.value()
                .attr("href")
                .and_then(phone_from_tel_href)
                .unwrap_or_else(|| clean_phone(&text_of(link)))
        })
        .unwrap_or_default();

    let website = select_attr(listing, &WEBSITE, "href")
        .or_else(|| {
            listing
                .select(&EXTERNAL_LINK)
                .filter_map(|a| a.value().attr("href"))
                .find(|href| !href.contains("group1auto.com"))
                .map(str::to_string)
        })
        .unwrap_or_else(|| page_url.to_string());

    Some(RawDealerRecord {
        name,
        street,
        city,
        state,
        zip,
        phone,
        website,
    })
}

fn strip_country(text: &str) -> &str {
    let trimmed = text.trim().trim_end_matches('.');
    let upper = trimmed.to_ascii_uppercase();
    if upper.ends_with("USA") {
        trimmed[..trimmed.len() - 3]
            .trim_end()
            .trim_end_matches(',')
            .trim_end()
    } else {
        trimmed
    }
}

/// Split `State ZIP` into a state code and an optional five-digit ZIP.
fn split_state_zip(text: &str) -> (String, String) {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    match tokens.split_last() {
        Some((last, rest)) if last.len() == 5 && last.chars().all(|c| c.is_ascii_digit()) => {
            (normalize_state(&rest.join(" ")), (*last).to_string())
        }
        Some(_) => (normalize_state(&tokens.join(" ")), String::new()),
        None => (String::new(), String::new()),
    }
}

fn split_group1_address(address: &str) -> (String, String, String, String) {
    let address = address.trim();
    if address.is_empty() {
        return Default::default();
    }

    if let Some((left, right)) = address.split_once('|') {
        let left = left.trim();
        let right = strip_country(right);

        if let Some((city, state_zip)) = right.rsplit_once(',') {
            let (state, zip) = split_state_zip(state_zip);
            return (left.to_string(), city.trim().to_string(), state, zip);
        }
        if let Some((street, city)) = left.split_once(',') {
            if !city.contains(',') {
                let (state, zip) = split_state_zip(right);
                return (
                    street.trim().to_string(),
                    city.trim().to_string(),
                    state,
                    zip,
                );
            }
        }
    }

    let cleaned = strip_country(address);
    if let Some(caps) = THREE_PART_RE.captures(cleaned) {
        return (
            caps[1].trim().to_string(),
            caps[2].trim().to_string(),
            normalize_state(&caps[3]),
            caps.get(4).map(|m| m.as_str().to_string()).unwrap_or_default(),
        );
    }

    // "15943 Gulf Freeway Webster, TX 77598": no comma between street and city.
    if let Some((left, right)) = cleaned.split_once(',') {
        let words: Vec<&str> = left.split_whitespace().collect();
        if words.len() >= 2 && !right.contains(',') {
            let (state, zip) = split_state_zip(right);
            if words.len() >= 3 {
                let candidate = words[words.len() - 2..].join(" ");
                if MULTI_WORD_CITIES.contains(&candidate.as_str()) {
                    return (words[..words.len() - 2].join(" "), candidate, state, zip);
                }
            }
            return (
                words[..words.len() - 1].join(" "),
                words[words.len() - 1].to_string(),
                state,
                zip,
            );
        }
    }

    (address.to_string(), String::new(), String::new(), String::new())
}
