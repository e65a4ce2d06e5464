//! Overfuel-built group sites: store addresses rendered as Google Maps
//! search links wrapping hCard spans, plus Bootstrap `div.card` tiles.

use std::collections::HashSet;
use std::sync::LazyLock;

use async_trait::async_trait;
use dealer_core::RawDealerRecord;
use percent_encoding::percent_decode_str;
use scraper::{ElementRef, Html, Selector};

use super::{PageInput, Strategy, Tier};
use crate::dom::{select_attr, select_text};
use crate::error::ExtractionError;
use crate::patterns::phone_from_tel_href;

const PHONE_CLIMB: usize = 3;

static MAPS_LINK: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("a[href*='google.com/maps/search']").expect("valid selector")
});
static MAPS_STREET: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("a[href*='google.com/maps/search'] .street-address").expect("valid selector")
});
static NAME: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("b, .org").expect("valid selector"));
static STREET: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".street-address").expect("valid selector"));
static LOCALITY: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".locality").expect("valid selector"));
static REGION: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".region").expect("valid selector"));
static POSTAL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".postal-code").expect("valid selector"));
static TEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href^='tel:']").expect("valid selector"));
static CARD: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.card").expect("valid selector"));
static CARD_HEADER: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".card-header h6").expect("valid selector"));

pub struct OverfuelStrategy;

#[async_trait]
impl Strategy for OverfuelStrategy {
    fn name(&self) -> &'static str {
        "overfuel"
    }

    fn tier(&self) -> Tier {
        Tier::Specific
    }

    fn can_handle(&self, page: &PageInput<'_>) -> bool {
        if page.html.to_ascii_lowercase().contains("overfuel") {
            return true;
        }
        page.html.contains("Find a Location")
            && Html::parse_document(page.html)
                .select(&MAPS_STREET)
                .next()
                .is_some()
    }

    async fn extract(
        &self,
        page: &PageInput<'_>,
    ) -> Result<Vec<RawDealerRecord>, ExtractionError> {
        Ok(parse_overfuel(page.html, page.url))
    }
}

/// Store name from a `/maps/search/<name>,<address>` link.
fn name_from_maps_href(href: &str) -> String {
    href.rsplit("/maps/search/")
        .next()
        .map(|query| {
            let query = query.replace('+', " ");
            let decoded = percent_decode_str(&query).decode_utf8_lossy().into_owned();
            decoded.split(',').next().unwrap_or_default().trim().to_string()
        })
        .unwrap_or_default()
}

/// Address parts from a maps link; `None` when the link lacks a full address.
fn address_from_link(link: ElementRef<'_>, name: String, page_url: &str) -> Option<RawDealerRecord> {
    let name = if name.is_empty() {
        link.value()
            .attr("href")
            .map(name_from_maps_href)
            .unwrap_or_default()
    } else {
        name
    };

    let record = RawDealerRecord {
        name,
        street: select_text(link, &STREET),
        city: select_text(link, &LOCALITY),
        state: select_text(link, &REGION),
        zip: select_text(link, &POSTAL),
        phone: String::new(),
        website: page_url.to_string(),
    };
    let complete = !record.name.is_empty()
        && !record.street.is_empty()
        && !record.city.is_empty()
        && !record.state.is_empty();
    complete.then_some(record)
}

fn tel_under(element: ElementRef<'_>) -> String {
    select_attr(element, &TEL, "href")
        .and_then(|href| phone_from_tel_href(&href))
        .unwrap_or_default()
}

fn parse_overfuel(html: &str, page_url: &str) -> Vec<RawDealerRecord> {
    let doc = Html::parse_document(html);
    let mut seen: HashSet<(String, String, String)> = HashSet::new();
    let mut records = Vec::new();
    let mut push = |record: RawDealerRecord| {
        let key = (
            record.name.to_lowercase(),
            record.street.to_lowercase(),
            record.city.to_lowercase(),
        );
        if seen.insert(key) {
            records.push(record);
        }
    };

    // Pass A: every maps link on the page; footers often carry the full list.
    for link in doc.select(&MAPS_LINK) {
        let Some(mut record) = address_from_link(link, select_text(link, &NAME), page_url) else {
            continue;
        };
        let mut scope = link;
        for _ in 0..PHONE_CLIMB {
            if let Some(parent) = scope.parent().and_then(ElementRef::wrap) {
                scope = parent;
            }
        }
        record.phone = tel_under(scope);
        push(record);
    }

    // Pass B: card tiles whose header carries the store name.
    for card in doc.select(&CARD) {
        let Some(link) = card.select(&MAPS_LINK).next() else {
            continue;
        };
        let mut name = select_text(card, &CARD_HEADER);
        if name.is_empty() {
            name = select_text(link, &NAME);
        }
        let Some(mut record) = address_from_link(link, name, page_url) else {
            continue;
        };
        record.phone = tel_under(card);
        push(record);
    }

    tracing::debug!(count = records.len(), "overfuel locations parsed");
    records
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_name_from_maps_query() {
        assert_eq!(
            name_from_maps_href("https://www.google.com/maps/search/Lake%20Ford,+1+Lake+Rd"),
            "Lake Ford"
        );
    }

    #[tokio::test]
    async fn collects_footer_links_and_cards_without_duplicates() {
        let html = r#"<body><!-- powered by Overfuel -->
          <div class="card">
            <div class="card-header"><h6>Lake Ford</h6></div>
            <div class="card-body">
              <a href="https://www.google.com/maps/search/Lake%20Ford,1%20Lake%20Rd">
                <span class="street-address">1 Lake Rd</span>
                <span class="locality">Lakeville</span>, <span class="region">MN</span>
                <span class="postal-code">55044</span></a>
              <a href="tel:952-555-0100">Call</a>
            </div>
          </div>
          <footer><ul><li><div><div>
            <a href="https://www.google.com/maps/search/Lake%20Ford,1%20Lake%20Rd"><b>Lake Ford</b>
              <span class="street-address">1 Lake Rd</span><span class="locality">Lakeville</span>
              <span class="region">MN</span></a>
            <a href="https://www.google.com/maps/search/River%20Kia,9%20River%20Rd">
              <span class="street-address">9 River Rd</span><span class="locality">Ramsey</span>
              <span class="region">MN</span></a>
            <a href="https://www.google.com/maps/search/Broken">no address</a>
          </div></div></li></ul></footer></body>"#;

        let strategy = OverfuelStrategy;
        let page = PageInput::new(html, "https://www.lakeautogroup.com/locations");
        assert!(strategy.can_handle(&page));
        let records = strategy.extract(&page).await.unwrap();
        let names: Vec<_> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Lake Ford", "River Kia"]);
        assert_eq!(records[0].phone, "952-555-0100");
        assert_eq!(records[1].website, "https://www.lakeautogroup.com/locations");
    }
}
