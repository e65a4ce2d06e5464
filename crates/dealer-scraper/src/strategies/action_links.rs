//! Cards recognised by their action links ("Directions", "Contact Us",
//! "Visit Site"): the nearest block ancestor of the link is the card.

use std::sync::LazyLock;

use async_trait::async_trait;
use dealer_core::RawDealerRecord;
use scraper::{ElementRef, Html, Selector};

use super::{PageInput, Strategy, Tier};
use crate::dom::{text_lines, text_of};
use crate::error::ExtractionError;
use crate::patterns::{find_city_state_zip, find_phone};

const ACTION_TEXTS: &[&str] = &["directions", "contact", "contact us", "visit site", "visit website"];
const CARD_TAGS: &[&str] = &["section", "article", "li", "div"];
const MAX_CLIMB: usize = 4;

static LINK: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").expect("valid selector"));
static HEADING: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h1, h2, h3, h4, h5, h6").expect("valid selector"));

pub struct ActionLinksStrategy;

#[async_trait]
impl Strategy for ActionLinksStrategy {
    fn name(&self) -> &'static str {
        "action_links"
    }

    fn tier(&self) -> Tier {
        Tier::Generic
    }

    fn can_handle(&self, page: &PageInput<'_>) -> bool {
        let lowered = page.html.to_ascii_lowercase();
        if !["directions", "contact", "visit"].iter().any(|m| lowered.contains(m)) {
            return false;
        }
        let doc = Html::parse_document(page.html);
        doc.select(&LINK).any(is_action_link)
    }

    async fn extract(
        &self,
        page: &PageInput<'_>,
    ) -> Result<Vec<RawDealerRecord>, ExtractionError> {
        let doc = Html::parse_document(page.html);
        let records: Vec<RawDealerRecord> = card_containers(&doc)
            .into_iter()
            .filter_map(|card| parse_card(card, page.url))
            .collect();
        tracing::debug!(count = records.len(), "action-link cards parsed");
        Ok(records)
    }
}

fn is_action_link(link: ElementRef<'_>) -> bool {
    let text = text_of(link).to_lowercase();
    ACTION_TEXTS.contains(&text.as_str())
}

/// Nearest block ancestor (within [`MAX_CLIMB`] hops) of every action
/// link, in document order and without repeats.
fn card_containers(doc: &Html) -> Vec<ElementRef<'_>> {
    let mut cards: Vec<ElementRef<'_>> = Vec::new();
    for link in doc.select(&LINK).filter(|a| is_action_link(*a)) {
        let mut node = link;
        let mut found = None;
        for _ in 0..MAX_CLIMB {
            let Some(parent) = node.parent().and_then(ElementRef::wrap) else {
                break;
            };
            if CARD_TAGS.contains(&parent.value().name()) {
                found = Some(parent);
                break;
            }
            node = parent;
        }
        if let Some(card) = found {
            if !cards.iter().any(|c| c.id() == card.id()) {
                cards.push(card);
            }
        }
    }
    cards
}

/// First heading inside the card, else the closest preceding sibling heading.
fn card_name(card: ElementRef<'_>) -> String {
    if let Some(heading) = card.select(&HEADING).next() {
        return text_of(heading);
    }
    card.prev_siblings()
        .filter_map(ElementRef::wrap)
        .find(|el| matches!(el.value().name(), "h2" | "h3" | "h4"))
        .map(text_of)
        .unwrap_or_default()
}

fn parse_card(card: ElementRef<'_>, page_url: &str) -> Option<RawDealerRecord> {
    let name = card_name(card);
    if name.is_empty() {
        return None;
    }
    let lines = text_lines(card);
    let mut record = RawDealerRecord::named(name);

    if let Some((idx, csz)) = find_city_state_zip(&lines) {
        if idx > 0 && lines[idx - 1] != record.name {
            record.street.clone_from(&lines[idx - 1]);
        }
        record.city = csz.city;
        record.state = csz.state;
        record.zip = csz.zip;
    }
    record.phone = find_phone(&lines);
    record.website = page_url.to_string();

    let located = !record.street.is_empty() || (!record.city.is_empty() && !record.state.is_empty());
    located.then_some(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cards_are_bounded_by_the_nearest_block() {
        let html = r#"<section class="locations">
          <div class="loc"><h3>Harbor Toyota</h3><p>12 Dock St</p><p>Salem, MA 01970</p>
            <p>(978) 555-0101</p><span><a href="/dir">Directions</a></span></div>
          <div class="loc"><h3>Harbor Subaru</h3><p>14 Dock St</p><p>Salem, MA 01970</p>
            <a href="/contact">Contact Us</a></div>
          <div class="promo"><a href="/specials">Directions to savings</a></div>
        </section>"#;
        let strategy = ActionLinksStrategy;
        let page = PageInput::new(html, "https://harborauto.com/our-locations");
        assert!(strategy.can_handle(&page));

        let records = strategy.extract(&page).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "Harbor Toyota");
        assert_eq!(records[0].street, "12 Dock St");
        assert_eq!(records[0].phone, "(978) 555-0101");
        assert_eq!(records[1].name, "Harbor Subaru");
        assert_eq!(records[1].zip, "01970");
        assert_eq!(records[1].phone, "");
    }

    #[test]
    fn pages_without_action_links_are_skipped() {
        let html = r#"<div><h3>Store</h3><a href="/x">Inventory</a></div>"#;
        assert!(!ActionLinksStrategy.can_handle(&PageInput::new(html, "https://x.com")));
    }
}
