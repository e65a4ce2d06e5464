//! Lithia Motors location lists: `li.info-window` microformat cards.

use std::sync::LazyLock;

use async_trait::async_trait;
use dealer_core::RawDealerRecord;
use scraper::{ElementRef, Html, Selector};

use super::{PageInput, Strategy, Tier};
use crate::dom::{select_attr, select_text};
use crate::error::ExtractionError;

static CARD: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("li.info-window").expect("valid selector"));
static ORG: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".org").expect("valid selector"));
static URL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a.url").expect("valid selector"));
static STREET: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".street-address").expect("valid selector"));
static LOCALITY: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".locality").expect("valid selector"));
static REGION: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".region").expect("valid selector"));
static POSTAL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".postal-code").expect("valid selector"));
static SALES_TEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(".tel[data-click-to-call='Sales']").expect("valid selector")
});
static SALES_TEL_VALUE: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(".tel[data-click-to-call='Sales'] .value").expect("valid selector")
});

pub struct LithiaStrategy;

#[async_trait]
impl Strategy for LithiaStrategy {
    fn name(&self) -> &'static str {
        "lithia"
    }

    fn tier(&self) -> Tier {
        Tier::Specific
    }

    fn can_handle(&self, page: &PageInput<'_>) -> bool {
        let has_marker = page.url.to_ascii_lowercase().contains("lithia")
            || page.html.to_ascii_lowercase().contains("lithia");
        if !has_marker || !page.html.contains("info-window") {
            return false;
        }
        Html::parse_document(page.html).select(&CARD).next().is_some()
    }

    async fn extract(
        &self,
        page: &PageInput<'_>,
    ) -> Result<Vec<RawDealerRecord>, ExtractionError> {
        Ok(parse_lithia(page.html, page.url))
    }
}

fn parse_lithia(html: &str, page_url: &str) -> Vec<RawDealerRecord> {
    let doc = Html::parse_document(html);
    let records: Vec<RawDealerRecord> = doc
        .select(&CARD)
        .filter_map(|card| parse_card(card, page_url))
        .collect();
    tracing::debug!(count = records.len(), "lithia cards parsed");
    records
}

fn parse_card(card: ElementRef<'_>, page_url: &str) -> Option<RawDealerRecord> {
    let name = select_text(card, &ORG);
    if name.is_empty() {
        return None;
    }

    let phone = select_attr(card, &SALES_TEL, "data-click-to-call-phone")
        .unwrap_or_else(|| select_text(card, &SALES_TEL_VALUE));

    Some(RawDealerRecord {
        name,
        street: select_text(card, &STREET),
        city: select_text(card, &LOCALITY),
        state: select_text(card, &REGION),
        zip: select_text(card, &POSTAL),
        phone,
        website: select_attr(card, &URL, "href").unwrap_or_else(|| page_url.to_string()),
    })
}
