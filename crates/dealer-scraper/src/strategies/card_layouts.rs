//! Known Bootstrap/CMS card grids, described as data and read by one
//! interpreter. Adding a layout means adding a row to [`LAYOUTS`].

use async_trait::async_trait;
use dealer_core::{parse_address, RawDealerRecord};
use scraper::{ElementRef, Html, Selector};

use super::{PageInput, Strategy, Tier};
use crate::dom::{absolute_url, parse_selector, text_lines, text_of};
use crate::error::ExtractionError;
use crate::patterns::{find_phone, parse_city_state_zip_line, PHONE_RE};

/// Where a card keeps its address.
#[derive(Debug, Clone, Copy)]
enum AddressSource {
    /// One element holding `Street, City, ST ZIP`.
    Single(&'static str),
    /// Visual lines across the matched elements: street, then `City, ST ZIP`.
    Lines(&'static str),
    /// Separate street and `City, ST ZIP` elements.
    Split(&'static str, &'static str),
}

#[derive(Debug, Clone, Copy)]
struct CardLayout {
    name: &'static str,
    container: &'static str,
    title: &'static str,
    address: AddressSource,
    phone: Option<&'static str>,
    website: Option<&'static str>,
    /// Only links whose text contains this (lowercased) count as the website.
    website_label: Option<&'static str>,
}

const LAYOUTS: &[CardLayout] = &[
    CardLayout {
        name: "panel",
        container: "div.panel.panel-default",
        title: "h4 > strong, h3 strong, h4 strong",
        address: AddressSource::Lines("p.larger, div.panel-body > p"),
        phone: Some("div.tab-pane.active p, .phone"),
        website: Some("div.cta-section a, a[href^='http']"),
        website_label: Some("visit"),
    },
    CardLayout {
        name: "dealer_info",
        container: "div.dealerInfo",
        title: "h2.dealerBrand",
        address: AddressSource::Split("div.dealerAddress1", "div.dealerAddress2"),
        phone: Some("div.dealerPhone"),
        website: Some("div.dealerCTA a"),
        website_label: None,
    },
    CardLayout {
        name: "car_details",
        container: "div.car-details",
        title: "h2 a",
        address: AddressSource::Single("p.extra-details.address"),
        phone: None,
        website: Some("h2 a"),
        website_label: None,
    },
    CardLayout {
        name: "location_result",
        container: "li.location-result",
        title: "h2.name",
        address: AddressSource::Single("div.address"),
        phone: Some(".phone"),
        website: None,
        website_label: None,
    },
    CardLayout {
        name: "fusion_column",
        container: "div.fusion-layout-column",
        title: "h4.fusion-title-heading",
        address: AddressSource::Lines("div.fusion-text"),
        phone: None,
        website: Some("a.fusion-button"),
        website_label: Some("website"),
    },
    CardLayout {
        name: "card_border",
        container: "div.card.border-0",
        title: "div.item-card9 h4",
        address: AddressSource::Single("div.item-card9 p"),
        phone: Some("div.call-number"),
        website: Some("div.item-card9 a"),
        website_label: None,
    },
    CardLayout {
        name: "location_dealer",
        container: "div.location.dealer",
        title: "h3.af-brand-text",
        address: AddressSource::Lines("p"),
        phone: None,
        website: Some("a"),
        website_label: Some("website"),
    },
];

pub struct CardLayoutsStrategy;

#[async_trait]
impl Strategy for CardLayoutsStrategy {
    fn name(&self) -> &'static str {
        "card_layouts"
    }

    fn tier(&self) -> Tier {
        Tier::Generic
    }

    fn can_handle(&self, page: &PageInput<'_>) -> bool {
        let doc = Html::parse_document(page.html);
        LAYOUTS.iter().any(|layout| {
            let (Some(container), Some(title)) =
                (parse_selector(layout.container), parse_selector(layout.title))
            else {
                return false;
            };
            doc.select(&container)
                .any(|card| card.select(&title).next().is_some())
        })
    }

    async fn extract(
        &self,
        page: &PageInput<'_>,
    ) -> Result<Vec<RawDealerRecord>, ExtractionError> {
        let doc = Html::parse_document(page.html);
        let mut records = Vec::new();
        for layout in LAYOUTS {
            let found = read_layout(&doc, layout, page.url);
            if !found.is_empty() {
                tracing::debug!(layout = layout.name, count = found.len(), "card layout matched");
            }
            records.extend(found);
        }
        Ok(records)
    }
}

fn read_layout(doc: &Html, layout: &CardLayout, page_url: &str) -> Vec<RawDealerRecord> {
    let Some(container) = parse_selector(layout.container) else {
        return Vec::new();
    };
    doc.select(&container)
        .filter_map(|card| read_card(card, layout, page_url))
        .collect()
}

fn first_text(card: ElementRef<'_>, css: &str) -> String {
    parse_selector(css)
        .and_then(|sel| card.select(&sel).next())
        .map(text_of)
        .unwrap_or_default()
}

fn lines_of(card: ElementRef<'_>, css: &str) -> Vec<String> {
    parse_selector(css)
        .map(|sel: Selector| card.select(&sel).flat_map(text_lines).collect())
        .unwrap_or_default()
}

fn read_card(card: ElementRef<'_>, layout: &CardLayout, page_url: &str) -> Option<RawDealerRecord> {
    let name = first_text(card, layout.title);
    if name.is_empty() {
        return None;
    }
    let mut record = RawDealerRecord::named(name);
    let mut card_lines = Vec::new();

    match layout.address {
        AddressSource::Single(css) => {
            let parsed = parse_address(&first_text(card, css));
            record.street = parsed.street;
            record.city = parsed.city;
            record.state = parsed.state;
            record.zip = parsed.postal_code;
        }
        AddressSource::Split(street_css, locality_css) => {
            let street = first_text(card, street_css);
            let locality = first_text(card, locality_css);
            if let Some(csz) = parse_city_state_zip_line(&locality) {
                record.street = street;
                record.city = csz.city;
                record.state = csz.state;
                record.zip = csz.zip;
            } else {
                let parsed = parse_address(&format!("{street}, {locality}"));
                record.street = if parsed.street.is_empty() { street } else { parsed.street };
                record.city = parsed.city;
                record.state = parsed.state;
                record.zip = parsed.postal_code;
            }
        }
        AddressSource::Lines(css) => {
            card_lines = lines_of(card, css);
            let csz_at = card_lines
                .iter()
                .enumerate()
                .find_map(|(idx, line)| parse_city_state_zip_line(line).map(|csz| (idx, csz)));
            match csz_at {
                Some((idx, csz)) => {
                    if idx > 0 {
                        record.street.clone_from(&card_lines[idx - 1]);
                    }
                    record.city = csz.city;
                    record.state = csz.state;
                    record.zip = csz.zip;
                }
                None => {
                    let parsed = parse_address(&card_lines.join(", "));
                    record.street = parsed.street;
                    record.city = parsed.city;
                    record.state = parsed.state;
                    record.zip = parsed.postal_code;
                }
            }
        }
    }

    record.phone = layout
        .phone
        .map(|css| lines_of(card, css))
        .map(|lines| find_phone(&lines))
        .filter(|phone| !phone.is_empty())
        .unwrap_or_else(|| find_phone(&card_lines));
    if record.phone.is_empty() {
        record.phone = PHONE_RE
            .find(&text_of(card))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
    }

    record.website = layout
        .website
        .and_then(parse_selector)
        .and_then(|sel| {
            card.select(&sel)
                .filter(|a| {
                    layout
                        .website_label
                        .is_none_or(|label| text_of(*a).to_lowercase().contains(label))
                })
                .find_map(|a| a.value().attr("href"))
                .and_then(|href| absolute_url(page_url, href))
        })
        .unwrap_or_else(|| page_url.to_string());

    (!record.street.is_empty() || !record.city.is_empty()).then_some(record)
}
