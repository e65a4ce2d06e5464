//! Coarse structural fingerprint of a location page, used to reuse a rule
//! learned on one domain for another domain built on the same layout.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Node, Selector};

use crate::patterns::PHONE_RE;

const MIN_HITS: usize = 3;
const MIN_CATEGORIES: usize = 2;
const CONTAINER_KEYWORDS: &[&str] = &["location", "dealer", "store", "office", "branch"];

static CONTAINERS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("section[class], div[class], article[class]").expect("valid selector"));
static LIST_ITEMS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("ul li, ol li").expect("valid selector"));
static STREET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d+\s+[A-Za-z\s]+(?:St|Street|Ave|Avenue|Rd|Road|Blvd|Boulevard|Dr|Drive)")
        .expect("valid regex")
});
static STATE_ZIP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z]{2}\s+\d{5}").expect("valid regex"));

/// Count range used in signature keys, so pages with a few more or fewer
/// cards share a signature.
fn bucket(count: usize) -> &'static str {
    match count {
        0 => "0",
        1..=2 => "1-2",
        3..=9 => "3-9",
        _ => "10+",
    }
}

/// `layout:<categories>` when at least two fingerprint categories clear the
/// threshold, else `None`. Categories are sorted so the key is stable.
#[must_use]
pub fn layout_signature(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let mut parts = Vec::new();

    let containers = doc
        .select(&CONTAINERS)
        .filter(|el| {
            el.value().attr("class").is_some_and(|class| {
                let class = class.to_ascii_lowercase();
                CONTAINER_KEYWORDS.iter().any(|k| class.contains(k))
            })
        })
        .count();
    if containers >= MIN_HITS {
        parts.push(format!("containers:{}", bucket(containers)));
    }

    let list_items = doc.select(&LIST_ITEMS).count();
    if list_items >= MIN_HITS {
        parts.push(format!("lists:{}", bucket(list_items)));
    }

    let texts: Vec<&str> = doc
        .root_element()
        .descendants()
        .filter_map(|node| match node.value() {
            Node::Text(text) => {
                let parent_is_code = node
                    .parent()
                    .and_then(|p| p.value().as_element().map(|e| matches!(e.name(), "script" | "style")))
                    .unwrap_or(false);
                (!parent_is_code).then_some(&**text)
            }
            _ => None,
        })
        .collect();

    let count = |re: &Regex| texts.iter().filter(|t| re.is_match(t)).count();
    if count(&STREET_RE) >= MIN_HITS {
        parts.push("addresses:multiple".to_string());
    }
    if count(&PHONE_RE) >= MIN_HITS {
        parts.push("phones:multiple".to_string());
    }
    if count(&STATE_ZIP_RE) >= MIN_HITS {
        parts.push("states:multiple".to_string());
    }

    if parts.len() < MIN_CATEGORIES {
        return None;
    }
    parts.sort();
    Some(format!("layout:{}", parts.join("|")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cards(count: u32) -> String {
        let body: String = (1..=count)
            .map(|n| {
                format!(
                    r#"<div class="dealer-card"><h3>Store {n}</h3><p>{n}00 Main St</p>
                    <p>Austin, TX 7870{d}</p><p>512-555-01{n:02}</p></div>"#,
                    d = n % 10
                )
            })
            .collect();
        format!("<body>{body}</body>")
    }

    #[test]
    fn repeated_cards_produce_a_stable_signature() {
        assert_eq!(
            layout_signature(&cards(3)).as_deref(),
            Some("layout:addresses:multiple|containers:3-9|phones:multiple|states:multiple")
        );
    }

    #[test]
    fn card_counts_are_bucketed() {
        assert_eq!(layout_signature(&cards(3)), layout_signature(&cards(7)));
        assert_ne!(layout_signature(&cards(7)), layout_signature(&cards(12)));
        assert!(layout_signature(&cards(12))
            .unwrap()
            .contains("containers:10+"));
        assert_eq!(bucket(0), "0");
        assert_eq!(bucket(2), "1-2");
    }

    #[test]
    fn sparse_pages_have_no_signature() {
        let html = r#"<ul><li>Home</li><li>About</li><li>Contact</li></ul>
            <script>var a = "512-555-0101 512-555-0102 512-555-0103";</script>"#;
        assert_eq!(layout_signature(html), None);
    }
}
