//! Directory pages: a group site whose locations page only links to one
//! page per store (or per state/brand) instead of listing addresses.

use std::collections::HashSet;
use std::sync::LazyLock;

use scraper::{Html, Selector};
use url::Url;

use crate::dom::absolute_url;

/// Fewer links than this is a regular page, not a directory.
pub const MIN_DIRECTORY_LINKS: usize = 3;

const LINK_PATTERNS: &[&str] = &[
    "/locations/",
    "/location/",
    "/dealers/",
    "/dealer/",
    "/dealerships/",
    "state=",
    "brand=",
    "/stores/",
];

static DIRECTORY_CONTAINER: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(
        "nav.directory, .directory, .locations-list, .state-list, .dealer-directory, \
         [class*='directory'], [id*='directory']",
    )
    .expect("valid selector")
});
static LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid selector"));

/// Same-host links that look like per-location pages.
///
/// Links inside a recognised directory container win; otherwise the whole
/// page is scanned. Returns `None` unless the count lands in
/// `MIN_DIRECTORY_LINKS..=max_links`: too many links means a sitemap-style
/// footer rather than a directory.
#[must_use]
pub fn find_directory_links(html: &str, base_url: &str, max_links: usize) -> Option<Vec<String>> {
    let base = Url::parse(base_url).ok()?;
    let doc = Html::parse_document(html);

    let scoped: Vec<String> = doc
        .select(&DIRECTORY_CONTAINER)
        .flat_map(|container| container.select(&LINK))
        .filter_map(|a| a.value().attr("href").map(str::to_string))
        .collect();
    let hrefs = if scoped.is_empty() {
        doc.select(&LINK)
            .filter_map(|a| a.value().attr("href").map(str::to_string))
            .collect()
    } else {
        scoped
    };

    let page = strip_fragment(base.as_str());
    let mut seen = HashSet::new();
    let links: Vec<String> = hrefs
        .iter()
        .filter(|href| !href.starts_with('#') && !href.starts_with("javascript:"))
        .filter_map(|href| absolute_url(base_url, href))
        .map(|url| strip_fragment(&url))
        .filter(|url| url != &page)
        .filter(|url| same_host(&base, url))
        .filter(|url| {
            let lowered = url.to_ascii_lowercase();
            LINK_PATTERNS.iter().any(|p| lowered.contains(p))
        })
        .filter(|url| seen.insert(url.clone()))
        .collect();

    let count = links.len();
    if (MIN_DIRECTORY_LINKS..=max_links).contains(&count) {
        tracing::debug!(base_url, count, "directory links found");
        Some(links)
    } else {
        None
    }
}

fn strip_fragment(url: &str) -> String {
    url.split('#').next().unwrap_or(url).to_string()
}

fn same_host(base: &Url, candidate: &str) -> bool {
    Url::parse(candidate)
        .ok()
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
        .is_some_and(|host| Some(host.as_str()) == base.host_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_container_links_are_collected() {
        let html = r##"<header><a href="/locations/">Locations</a></header>
          <nav class="directory">
            <a href="/locations/austin">Austin</a>
            <a href="/locations/dallas">Dallas</a>
            <a href="/locations/dallas#map">Dallas map</a>
            <a href="https://other.com/locations/houston">Elsewhere</a>
            <a href="/locations/el-paso">El Paso</a>
          </nav>"##;
        let links =
            find_directory_links(html, "https://www.texasauto.com/locations/", 50).unwrap();
        assert_eq!(
            links,
            vec![
                "https://www.texasauto.com/locations/austin",
                "https://www.texasauto.com/locations/dallas",
                "https://www.texasauto.com/locations/el-paso",
            ]
        );
    }

    #[test]
    fn whole_page_is_scanned_without_a_container() {
        let html = r#"<ul>
            <li><a href="/dealers/one">One</a></li>
            <li><a href="/dealers/two">Two</a></li>
            <li><a href="/inventory?brand=ford">Ford</a></li>
            <li><a href="/about">About</a></li></ul>"#;
        let links = find_directory_links(html, "https://group.com/", 50).unwrap();
        assert_eq!(links.len(), 3);
    }

    #[test]
    fn counts_outside_the_window_are_not_directories() {
        let two = r#"<a href="/dealers/one">1</a><a href="/dealers/two">2</a>"#;
        assert!(find_directory_links(two, "https://group.com/", 50).is_none());

        let many: String = (0..6)
            .map(|i| format!(r#"<a href="/dealers/{i}">{i}</a>"#))
            .collect();
        assert!(find_directory_links(&many, "https://group.com/", 5).is_none());
    }
}
