//! Dealer.com "content block" pages: free-form text blocks where the first
//! line is the store name and address lines follow, usually with a
//! "Visit Site" link per store.

use std::sync::LazyLock;

use async_trait::async_trait;
use dealer_core::RawDealerRecord;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::{PageInput, Strategy, Tier};
use crate::dom::{text_lines, text_of};
use crate::error::ExtractionError;
use crate::patterns::{find_phone, parse_city_state_zip_line};

const MIN_VISIT_LINKS: usize = 2;
const MAX_CLIMB: usize = 4;
const CONTAINER_TAGS: &[&str] = &["div", "section", "li", "article"];

static BLOCK: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(".ddc-content .text-content-container").expect("valid selector")
});
static LINK: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").expect("valid selector"));
static DIRECTIONS_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:get\s+)?directions\s+").expect("valid regex"));

pub struct ContentBlocksStrategy;

#[async_trait]
impl Strategy for ContentBlocksStrategy {
    fn name(&self) -> &'static str {
        "dealer_dot_com_content_blocks"
    }

    fn tier(&self) -> Tier {
        Tier::Specific
    }

    fn can_handle(&self, page: &PageInput<'_>) -> bool {
        let lowered = page.html.to_ascii_lowercase();
        if !lowered.contains("text-content-container") && !lowered.contains("visit site") {
            return false;
        }
        let doc = Html::parse_document(page.html);
        doc.select(&BLOCK).next().is_some() || visit_site_links(&doc).len() >= MIN_VISIT_LINKS
    }

    async fn extract(
        &self,
        page: &PageInput<'_>,
    ) -> Result<Vec<RawDealerRecord>, ExtractionError> {
        let doc = Html::parse_document(page.html);
        let mut blocks: Vec<ElementRef<'_>> = doc.select(&BLOCK).collect();
        if blocks.is_empty() {
            blocks = containers_around_visit_links(&doc);
        }
        let records: Vec<RawDealerRecord> = blocks
            .into_iter()
            .filter_map(|block| parse_block(block, page.url))
            .collect();
        tracing::debug!(count = records.len(), "dealer.com content blocks parsed");
        Ok(records)
    }
}

fn is_visit_site(link: ElementRef<'_>) -> bool {
    text_of(link).to_lowercase().contains("visit site")
}

fn visit_site_links(doc: &Html) -> Vec<ElementRef<'_>> {
    doc.select(&LINK).filter(|a| is_visit_site(*a)).collect()
}

fn containers_around_visit_links(doc: &Html) -> Vec<ElementRef<'_>> {
    let mut containers: Vec<ElementRef<'_>> = Vec::new();
    for link in visit_site_links(doc) {
        let mut container = link;
        for _ in 0..MAX_CLIMB {
            // Stop before a parent that would swallow a neighbouring store.
            match container.parent().and_then(ElementRef::wrap) {
                Some(parent)
                    if CONTAINER_TAGS.contains(&parent.value().name())
                        && parent.select(&LINK).filter(|a| is_visit_site(*a)).count() <= 1 =>
                {
                    container = parent;
                }
                _ => break,
            }
        }
        if !containers.iter().any(|c| c.id() == container.id()) {
            containers.push(container);
        }
    }
    containers
}

fn parse_block(block: ElementRef<'_>, page_url: &str) -> Option<RawDealerRecord> {
    let lines = text_lines(block);
    let name = lines.first()?.clone();
    if name.chars().count() < 3 {
        return None;
    }

    let mut record = RawDealerRecord::named(name);
    for (idx, line) in lines.iter().enumerate().skip(1) {
        let line = DIRECTIONS_PREFIX_RE.replace(line, "");
        if let Some(csz) = parse_city_state_zip_line(&line) {
            record.city = csz.city;
            record.state = csz.state;
            record.zip = csz.zip;
            if idx > 1 {
                record.street = DIRECTIONS_PREFIX_RE
                    .replace(&lines[idx - 1], "")
                    .into_owned();
            }
            break;
        }
    }
    record.phone = find_phone(&lines);

    let links: Vec<ElementRef<'_>> = block
        .select(&LINK)
        .filter(|a| a.value().attr("href").is_some())
        .collect();
    record.website = links
        .iter()
        .find(|a| is_visit_site(**a))
        .or_else(|| links.first())
        .and_then(|a| a.value().attr("href"))
        .filter(|href| href.starts_with("http"))
        .map_or_else(|| page_url.to_string(), str::to_string);

    let has_location = !record.street.is_empty() || (!record.city.is_empty() && !record.state.is_empty());
    has_location.then_some(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn extracts_ddc_text_blocks() {
        let html = r#"<div class="ddc-content content-default">
          <div class="text-content-container">
            <div><font><b>Baker Honda</b></font></div>
            <div>Directions 1100 Main Street</div>
            <div>Baltimore, Maryland 21201</div>
            <div>Sales: 410-555-0177</div>
            <a href="https://www.bakerhonda.com">Visit Site</a>
          </div>
          <div class="text-content-container"><div><img src="logo.png"></div></div>
        </div>"#;
        let strategy = ContentBlocksStrategy;
        let page = PageInput::new(html, "https://www.bakerautogroup.com/");
        assert!(strategy.can_handle(&page));

        let records = strategy.extract(&page).await.unwrap();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.name, "Baker Honda");
        assert_eq!(record.street, "1100 Main Street");
        assert_eq!(record.city, "Baltimore");
        assert_eq!(record.state, "MD");
        assert_eq!(record.zip, "21201");
        assert_eq!(record.phone, "410-555-0177");
        assert_eq!(record.website, "https://www.bakerhonda.com");
    }

    #[tokio::test]
    async fn falls_back_to_visit_site_containers() {
        let html = r#"<section>
          <div class="store"><h4>Baker Ford</h4><p>10 Oak Rd</p><p>Towson, MD 21204</p>
            <a href="https://www.bakerford.com">Visit Site</a></div>
          <div class="store"><h4>Baker Kia</h4><p>20 Elm Rd</p><p>Dundalk, MD 21222</p>
            <a href="https://www.bakerkia.com">Visit Site</a></div>
        </section>"#;
        let strategy = ContentBlocksStrategy;
        let page = PageInput::new(html, "https://www.bakerautogroup.com/");
        assert!(strategy.can_handle(&page));
        let records = strategy.extract(&page).await.unwrap();
        let names: Vec<_> = records.iter().map(|r| r.name.as_str()).collect();
        assert!(names.contains(&"Baker Ford"), "got {names:?}");
        assert!(names.contains(&"Baker Kia"), "got {names:?}");
    }
}
