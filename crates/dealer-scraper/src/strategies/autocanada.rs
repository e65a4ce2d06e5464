//! AutoCanada dealer cards: `div.well.matchable-heights`.

use std::sync::LazyLock;

use async_trait::async_trait;
use dealer_core::{parse_address, RawDealerRecord};
use scraper::{ElementRef, Html, Selector};

use super::{PageInput, Strategy, Tier};
use crate::dom::{element_ancestors, select_text, text_lines};
use crate::error::ExtractionError;
use crate::patterns::find_phone;

static CARD: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.well.matchable-heights").expect("valid selector"));
static ADDRESS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span.di-dealer-address").expect("valid selector"));
static PHONE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span.dealer-phone").expect("valid selector"));
static SALES_PHONE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span.dealer-phone.sales span").expect("valid selector"));
static HEADING: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h2").expect("valid selector"));

pub struct AutoCanadaStrategy;

#[async_trait]
impl Strategy for AutoCanadaStrategy {
    fn name(&self) -> &'static str {
        "autocanada"
    }

    fn tier(&self) -> Tier {
        Tier::Specific
    }

    fn can_handle(&self, page: &PageInput<'_>) -> bool {
        if !page.html.contains("matchable-heights") {
            return false;
        }
        let doc = Html::parse_document(page.html);
        doc.select(&CARD).next().is_some_and(|card| {
            card.select(&ADDRESS).next().is_some() && card.select(&PHONE).next().is_some()
        })
    }

    async fn extract(
        &self,
        page: &PageInput<'_>,
    ) -> Result<Vec<RawDealerRecord>, ExtractionError> {
        let doc = Html::parse_document(page.html);
        let records: Vec<RawDealerRecord> = doc
            .select(&CARD)
            .filter_map(|card| parse_card(card, page.url))
            .collect();
        tracing::debug!(count = records.len(), "autocanada cards parsed");
        Ok(records)
    }
}

fn parse_card(card: ElementRef<'_>, page_url: &str) -> Option<RawDealerRecord> {
    let heading = card.select(&HEADING).next()?;
    let name = crate::dom::text_of(heading);
    if name.is_empty() {
        return None;
    }

    let website = element_ancestors(heading)
        .find(|el| el.value().name() == "a")
        .and_then(|a| a.value().attr("href"))
        .map_or_else(|| page_url.to_string(), str::to_string);

    let lines = card
        .select(&ADDRESS)
        .next()
        .map(text_lines)
        .unwrap_or_default();
    let parsed = parse_address(&lines.join(", "));
    let street = if parsed.street.is_empty() {
        lines.first().cloned().unwrap_or_default()
    } else {
        parsed.street
    };

    let mut phone = select_text(card, &SALES_PHONE);
    if phone.is_empty() {
        phone = find_phone(&[select_text(card, &PHONE)]);
    }

    Some(RawDealerRecord {
        name,
        street,
        city: parsed.city,
        state: parsed.state,
        zip: parsed.postal_code,
        phone,
        website,
    })
}
