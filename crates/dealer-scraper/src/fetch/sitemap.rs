//! Sitemap discovery of per-location pages, the last-resort path for group
//! sites whose locations index is unusable.

use std::collections::HashSet;

use quick_xml::events::Event;
use quick_xml::Reader;
use url::Url;

use super::http::fetch_text;
use crate::error::ScraperError;

const SITEMAP_INDEX_PATH: &str = "/sitemap-index.xml";
const MAX_SITEMAP_DEPTH: usize = 3;

/// Whether the URL path suggests a locations section worth a sitemap crawl.
#[must_use]
pub fn looks_like_locations_path(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    let path = parsed.path().to_ascii_lowercase();
    let host = parsed.host_str().unwrap_or_default().to_ascii_lowercase();
    path.contains("/locations")
        || path.contains("our-locations")
        || path.contains("/location/")
        || host.starts_with("locations.")
}

/// Every `<loc>` value in a sitemap or sitemap index, in document order.
/// Malformed XML ends the scan with whatever was read so far.
#[must_use]
pub fn parse_sitemap_locs(xml: &str) -> Vec<String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut locs = Vec::new();
    let mut in_loc = false;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"loc" => in_loc = true,
            Ok(Event::End(e)) if e.local_name().as_ref() == b"loc" => in_loc = false,
            Ok(Event::Text(e)) if in_loc => {
                let text = e.unescape().unwrap_or_default().trim().to_string();
                if !text.is_empty() {
                    locs.push(text);
                }
            }
            Ok(Event::CData(e)) if in_loc => {
                let text = String::from_utf8_lossy(&e).trim().to_string();
                if !text.is_empty() {
                    locs.push(text);
                }
            }
            Ok(Event::Eof) => break,
            Err(error) => {
                tracing::debug!(%error, "sitemap parse stopped early");
                break;
            }
            _ => {}
        }
    }
    locs
}

fn is_location_sitemap(loc: &str) -> bool {
    let lowered = loc.to_ascii_lowercase();
    lowered.contains("locations") && lowered.ends_with(".xml")
}

fn is_location_page(loc: &str) -> bool {
    loc.to_ascii_lowercase().contains("/locations/")
}

/// Walk `{scheme}://{host}/sitemap-index.xml`, descending into sub-sitemaps
/// whose URL mentions locations, and return up to `cap` unique location
/// page URLs.
///
/// # Errors
///
/// Returns [`ScraperError::InvalidUrl`] for an unparseable page URL, or the
/// fetch error of the sitemap index itself. Failing sub-sitemaps are logged
/// and skipped.
pub async fn discover_location_pages(
    client: &reqwest::Client,
    page_url: &str,
    user_agent: &str,
    cap: usize,
) -> Result<Vec<String>, ScraperError> {
    let parsed = Url::parse(page_url).map_err(|e| ScraperError::InvalidUrl {
        url: page_url.to_string(),
        reason: e.to_string(),
    })?;
    let host = parsed.host_str().ok_or_else(|| ScraperError::InvalidUrl {
        url: page_url.to_string(),
        reason: "missing host".to_string(),
    })?;
    let mut index_url = format!("{}://{host}", parsed.scheme());
    if let Some(port) = parsed.port() {
        index_url.push_str(&format!(":{port}"));
    }
    index_url.push_str(SITEMAP_INDEX_PATH);

    let index = fetch_text(client, &index_url, user_agent).await?;

    let mut pages = Vec::new();
    let mut seen = HashSet::new();
    let mut visited = HashSet::from([index_url.clone()]);
    // (sitemap body, depth) still to scan
    let mut pending = vec![(index, 0_usize)];

    while let Some((xml, depth)) = pending.pop() {
        for loc in parse_sitemap_locs(&xml) {
            if pages.len() >= cap {
                break;
            }
            if is_location_sitemap(&loc) {
                if depth + 1 >= MAX_SITEMAP_DEPTH || !visited.insert(loc.clone()) {
                    continue;
                }
                match fetch_text(client, &loc, user_agent).await {
                    Ok(body) => pending.push((body, depth + 1)),
                    Err(error) => tracing::warn!(sitemap = %loc, %error, "sub-sitemap fetch failed"),
                }
            } else if is_location_page(&loc) && seen.insert(loc.clone()) {
                pages.push(loc);
            }
        }
    }

    tracing::info!(page_url, count = pages.len(), "sitemap location pages discovered");
    Ok(pages)
}
