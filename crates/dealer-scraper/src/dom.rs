//! Small helpers over `scraper` element trees shared by the DOM strategies.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Node, Selector};

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

const BLOCK_TAGS: &[&str] = &[
    "address", "article", "br", "dd", "div", "dt", "footer", "h1", "h2", "h3", "h4", "h5", "h6",
    "header", "li", "ol", "p", "section", "table", "td", "th", "tr", "ul",
];

const SKIPPED_TAGS: &[&str] = &["script", "style", "noscript", "template", "svg"];

/// Parse a selector that comes from data (a learned rule or a layout table).
pub(crate) fn parse_selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

pub(crate) fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_RE.replace_all(text.trim(), " ").into_owned()
}

/// Text content of an element with whitespace collapsed to single spaces.
pub(crate) fn text_of(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

/// Text of the first match of `selector` under `element`, or empty.
pub(crate) fn select_text(element: ElementRef<'_>, selector: &Selector) -> String {
    element.select(selector).next().map(text_of).unwrap_or_default()
}

/// Attribute of the first match of `selector` under `element`.
pub(crate) fn select_attr(
    element: ElementRef<'_>,
    selector: &Selector,
    attr: &str,
) -> Option<String> {
    element
        .select(selector)
        .find_map(|el| el.value().attr(attr))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Split an element's text into visual lines: block elements and `<br>`
/// break lines, inline elements do not.
pub(crate) fn text_lines(element: ElementRef<'_>) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    collect_lines(element, &mut lines, &mut current);
    flush_line(&mut lines, &mut current);
    lines
}

fn collect_lines(element: ElementRef<'_>, lines: &mut Vec<String>, current: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => current.push_str(text),
            Node::Element(el) => {
                let name = el.name();
                if SKIPPED_TAGS.contains(&name) {
                    continue;
                }
                let Some(child_el) = ElementRef::wrap(child) else {
                    continue;
                };
                let is_block = BLOCK_TAGS.contains(&name);
                if is_block {
                    flush_line(lines, current);
                }
                collect_lines(child_el, lines, current);
                if is_block {
                    flush_line(lines, current);
                }
            }
            _ => {}
        }
    }
}

fn flush_line(lines: &mut Vec<String>, current: &mut String) {
    let line = collapse_whitespace(current);
    if !line.is_empty() {
        lines.push(line);
    }
    current.clear();
}

/// Element ancestors, nearest first.
pub(crate) fn element_ancestors(element: ElementRef<'_>) -> impl Iterator<Item = ElementRef<'_>> {
    element.ancestors().filter_map(ElementRef::wrap)
}

/// Resolve `href` against `base`. Returns `None` for `javascript:`,
/// `mailto:` and `tel:` links or when either side does not parse.
pub(crate) fn absolute_url(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    let lowered = href.to_ascii_lowercase();
    if href.is_empty()
        || lowered.starts_with("javascript:")
        || lowered.starts_with("mailto:")
        || lowered.starts_with("tel:")
    {
        return None;
    }
    let base = url::Url::parse(base).ok()?;
    base.join(href).ok().map(String::from)
}

#[cfg(test)]
mod tests {
    use scraper::Html;

    use super::*;

    fn first<'a>(doc: &'a Html, css: &str) -> ElementRef<'a> {
        let sel = Selector::parse(css).unwrap();
        doc.select(&sel).next().unwrap()
    }

    #[test]
    fn text_lines_breaks_on_blocks_and_br() {
        let doc = Html::parse_fragment(
            r#"<div id="card"><h3>Test <b>Motors</b></h3><p>1 Main St<br>Springfield, IL 62701</p>
            <script>var x = 1;</script><span>Call</span> <span>555-111-2222</span></div>"#,
        );
        let lines = text_lines(first(&doc, "#card"));
        assert_eq!(
            lines,
            vec![
                "Test Motors",
                "1 Main St",
                "Springfield, IL 62701",
                "Call 555-111-2222"
            ]
        );
    }

    #[test]
    fn absolute_url_resolves_relative_and_skips_tel() {
        assert_eq!(
            absolute_url("https://example.com/locations/", "tx/dallas").as_deref(),
            Some("https://example.com/locations/tx/dallas")
        );
        assert_eq!(absolute_url("https://example.com/", "tel:5551112222"), None);
        assert_eq!(absolute_url("not a url", "/x"), None);
    }
}
