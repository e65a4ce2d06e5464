//! Dealer.com location lists: `ol#proximity-dealer-list` of hCard entries.

use std::sync::LazyLock;

use async_trait::async_trait;
use dealer_core::RawDealerRecord;
use scraper::{ElementRef, Html, Selector};

use super::{PageInput, Strategy, Tier};
use crate::dom::{select_attr, select_text, text_of};
use crate::error::ExtractionError;
use crate::patterns::{clean_phone, phone_from_tel_href};

const MIN_LOOSE_VCARDS: usize = 5;

static LIST_ITEM: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("ol#proximity-dealer-list li").expect("valid selector"));
static VCARD: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".vcard").expect("valid selector"));
static VCARD_ORG: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".vcard .org").expect("valid selector"));
static ORG: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".org").expect("valid selector"));
static STREET: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".street-address").expect("valid selector"));
static LOCALITY: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".locality").expect("valid selector"));
static REGION: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".region").expect("valid selector"));
static POSTAL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".postal-code").expect("valid selector"));
static PHONE: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(
        "ul.tels li.tel .value [data-phone-ref], ul.tels li.tel .value, a[href^='tel:']",
    )
    .expect("valid selector")
});
static SITE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".fn.n a.url, a.url").expect("valid selector"));

pub struct DealerDotComStrategy;

#[async_trait]
impl Strategy for DealerDotComStrategy {
    fn name(&self) -> &'static str {
        "dealer_dot_com"
    }

    fn tier(&self) -> Tier {
        Tier::Specific
    }

    fn can_handle(&self, page: &PageInput<'_>) -> bool {
        if !page.html.contains("vcard") {
            return false;
        }
        let doc = Html::parse_document(page.html);
        let listed = doc
            .select(&LIST_ITEM)
            .any(|li| li.select(&VCARD).next().is_some());
        listed || doc.select(&VCARD_ORG).count() >= MIN_LOOSE_VCARDS
    }

    async fn extract(
        &self,
        page: &PageInput<'_>,
    ) -> Result<Vec<RawDealerRecord>, ExtractionError> {
        let doc = Html::parse_document(page.html);
        let mut cards: Vec<ElementRef<'_>> = doc
            .select(&LIST_ITEM)
            .filter_map(|li| li.select(&VCARD).next())
            .collect();
        if cards.is_empty() {
            cards = doc.select(&VCARD).collect();
        }

        let records: Vec<RawDealerRecord> = cards
            .into_iter()
            .filter_map(|vcard| parse_vcard(vcard, page.url))
            .collect();
        tracing::debug!(count = records.len(), "dealer.com vcards parsed");
        Ok(records)
    }
}

fn parse_vcard(vcard: ElementRef<'_>, page_url: &str) -> Option<RawDealerRecord> {
    let name = select_text(vcard, &ORG);
    if name.is_empty() {
        return None;
    }

    let phone = vcard
        .select(&PHONE)
        .next()
        .map(|el| {
            el.value()
                .attr("href")
                .and_then(phone_from_tel_href)
                .unwrap_or_else(|| clean_phone(&text_of(el)))
        })
        .unwrap_or_default();

    Some(RawDealerRecord {
        name,
        street: select_text(vcard, &STREET),
        city: select_text(vcard, &LOCALITY),
        state: select_text(vcard, &REGION),
        zip: select_text(vcard, &POSTAL),
        phone,
        website: select_attr(vcard, &SITE, "href").unwrap_or_else(|| page_url.to_string()),
    })
}
