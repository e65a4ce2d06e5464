//! Loosely formatted "Our Locations" pages: a heading per store followed by
//! a few sibling blocks with the address and phone.
//!
//! A block needs a city/state/ZIP line plus either a phone number or a
//! street line directly above the city/state/ZIP.

use std::sync::LazyLock;

use async_trait::async_trait;
use dealer_core::RawDealerRecord;
use scraper::{ElementRef, Html, Node, Selector};

use super::{PageInput, Strategy, Tier};
use crate::dom::{collapse_whitespace, text_lines, text_of};
use crate::error::ExtractionError;
use crate::patterns::{find_city_state_zip, PHONE_RE};

const MAX_SIBLINGS: usize = 8;
const MIN_NAME_CHARS: usize = 3;
const HEADING_TAGS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6"];

/// Headings that label a section rather than name a store.
const NAVIGATION_TERMS: &[&str] = &[
    "explore our locations",
    "our locations",
    "find us",
    "visit us",
    "locations",
    "dealerships",
    "store locations",
    "branches",
    "offices",
    "contact us",
    "where to find us",
    "find a location",
    "location finder",
    "store finder",
];

static SECTION_HEADING: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h1, h2, h3").expect("valid selector"));
static STORE_HEADING: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h2, h3, h4, h5").expect("valid selector"));

pub struct HeadingBlocksStrategy;

#[async_trait]
impl Strategy for HeadingBlocksStrategy {
    fn name(&self) -> &'static str {
        "heading_blocks"
    }

    fn tier(&self) -> Tier {
        Tier::Generic
    }

    fn can_handle(&self, page: &PageInput<'_>) -> bool {
        let doc = Html::parse_document(page.html);
        doc.select(&STORE_HEADING)
            .filter(|h| !is_navigation_heading(&text_of(*h)))
            .take(64)
            .any(|h| parse_heading(h, page.url).is_some())
    }

    async fn extract(
        &self,
        page: &PageInput<'_>,
    ) -> Result<Vec<RawDealerRecord>, ExtractionError> {
        let doc = Html::parse_document(page.html);

        // Narrow the search to the "Our Locations" section when there is one.
        let root = doc
            .select(&SECTION_HEADING)
            .find(|h| text_of(*h).eq_ignore_ascii_case("our locations"))
            .and_then(|h| h.parent().and_then(ElementRef::wrap))
            .unwrap_or_else(|| doc.root_element());

        let records: Vec<RawDealerRecord> = root
            .select(&STORE_HEADING)
            .filter_map(|heading| parse_heading(heading, page.url))
            .collect();
        tracing::debug!(count = records.len(), "heading blocks parsed");
        Ok(records)
    }
}

/// House number followed by a street name.
fn looks_like_street(line: &str) -> bool {
    line.starts_with(|c: char| c.is_ascii_digit()) && line.chars().any(char::is_alphabetic)
}

fn is_navigation_heading(text: &str) -> bool {
    let lowered = text.to_lowercase();
    NAVIGATION_TERMS.iter().any(|term| lowered.contains(term))
}

/// Text lines of up to [`MAX_SIBLINGS`] siblings after `heading`, stopping
/// at the next heading.
fn following_lines(heading: ElementRef<'_>) -> Vec<String> {
    let mut lines = Vec::new();
    for sibling in heading.next_siblings().take(MAX_SIBLINGS) {
        match sibling.value() {
            Node::Element(el) if HEADING_TAGS.contains(&el.name()) => break,
            Node::Element(_) => {
                if let Some(el) = ElementRef::wrap(sibling) {
                    lines.extend(text_lines(el));
                }
            }
            Node::Text(text) => {
                let line = collapse_whitespace(text);
                if !line.is_empty() {
                    lines.push(line);
                }
            }
            _ => {}
        }
    }
    lines
}

fn parse_heading(heading: ElementRef<'_>, page_url: &str) -> Option<RawDealerRecord> {
    let name = text_of(heading);
    if name.chars().count() < MIN_NAME_CHARS || is_navigation_heading(&name) {
        return None;
    }
    let lines = following_lines(heading);
    let (idx, csz) = find_city_state_zip(&lines)?;
    let has_street = idx
        .checked_sub(1)
        .is_some_and(|i| looks_like_street(&lines[i]));
    let phone = lines
        .iter()
        .find_map(|line| PHONE_RE.find(line))
        .map(|m| m.as_str().to_string());
    if phone.is_none() && !has_street {
        return None;
    }

    let mut record = RawDealerRecord::named(name);
    if idx > 0 {
        record.street.clone_from(&lines[idx - 1]);
    }
    record.city = csz.city;
    record.state = csz.state.to_ascii_uppercase();
    record.zip = csz.zip;
    record.phone = phone.unwrap_or_default();
    record.website = page_url.to_string();
    Some(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<body>
      <h2>Shop by brand</h2><p>Nothing to see</p>
      <div class="content">
        <h2>Our Locations</h2>
        <h3>Bakhtiari Chevrolet</h3>
        <p>2200 Main St</p><p>Stroudsburg, PA 18360</p><p>Sales: 570-555-0100</p>
        <h3>Bakhtiari Buick GMC</h3>
        <p>2300 Main St<br>Stroudsburg, PA 18360</p>
        <h3>Bakhtiari Used Cars</h3>
        <p>Stroudsburg, PA 18360</p>
        <h3>Find Us</h3>
        <p>1 Nowhere Ln</p><p>Nowhere, PA 18000</p><p>570-555-0199</p>
      </div></body>"#;

    #[tokio::test]
    async fn headings_need_an_address_and_a_phone_or_street() {
        let strategy = HeadingBlocksStrategy;
        let page = PageInput::new(PAGE, "https://bakhtiariauto.com/");
        assert!(strategy.can_handle(&page));

        let records = strategy.extract(&page).await.unwrap();
        assert_eq!(records.len(), 2, "got {records:?}");
        assert_eq!(records[1].name, "Bakhtiari Buick GMC");
        assert_eq!(records[1].street, "2300 Main St");
        assert!(records[1].phone.is_empty());
        let record = &records[0];
        assert_eq!(record.name, "Bakhtiari Chevrolet");
        assert_eq!(record.street, "2200 Main St");
        assert_eq!(record.city, "Stroudsburg");
        assert_eq!(record.state, "PA");
        assert_eq!(record.phone, "570-555-0100");
        assert_eq!(record.website, "https://bakhtiariauto.com/");
    }

    #[tokio::test]
    async fn h5_cards_without_phones_are_parsed() {
        let html = r#"<div class="locations">
          <h5>Hudson Toyota</h5><p>390 Communipaw Ave</p><p>Jersey City, NJ 07304</p>
          <h5>Hudson Hyundai</h5><p>5 Kennedy Blvd</p><p>Jersey City, NJ 07306</p>
        </div>"#;
        let strategy = HeadingBlocksStrategy;
        let page = PageInput::new(html, "https://hudsonautogroup.com/locations");
        assert!(strategy.can_handle(&page));

        let records = strategy.extract(&page).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "Hudson Toyota");
        assert_eq!(records[0].street, "390 Communipaw Ave");
        assert_eq!(records[1].zip, "07306");
    }

    #[test]
    fn navigation_headings_are_rejected() {
        assert!(is_navigation_heading("Explore Our Locations"));
        assert!(!is_navigation_heading("Lakeside Ford"));
    }
}
