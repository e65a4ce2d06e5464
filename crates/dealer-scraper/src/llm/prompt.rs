//! Turning a page into the short text sample the model reads.

use scraper::{Html, Node};

pub(crate) const SYSTEM_PROMPT: &str = "You are an information extractor. Given text from a \
     car dealer group's website, return a JSON array of objects with keys: name, street, city, \
     state, zip, phone, website, brand. Only include real physical dealership locations present \
     in the text. Use two-letter US state or Canadian province codes. Return JSON only, no extra \
     text.";

const SKIPPED_TAGS: &[&str] = &["script", "style", "nav", "header", "footer", "noscript"];

const KEYWORDS: &[&str] = &[
    "location",
    "dealer",
    "address",
    "phone",
    "store",
    "showroom",
    "service",
    "sales",
    "automotive",
    "contact",
    "hours",
    "directions",
    "visit",
    "find us",
    "our locations",
    "zip",
    "call",
    "street",
    "avenue",
];

/// Keyword lines shorter than this are too thin to send on their own.
const MIN_RELEVANT_CHARS: usize = 500;

/// Visible text of `html`, one line per text node, without page chrome.
pub(crate) fn page_text(html: &str) -> String {
    let doc = Html::parse_document(html);
    let mut lines = Vec::new();
    for node in doc.root_element().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let skipped = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|el| SKIPPED_TAGS.contains(&el.name()))
        });
        if skipped {
            continue;
        }
        let line = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if !line.is_empty() {
            lines.push(line);
        }
    }
    lines.join("\n")
}

/// Pick at most `max_chars` characters of `text` worth sending: the lines
/// that mention a dealer keyword, or a slice from one third into the page
/// when those are too sparse.
pub(crate) fn relevant_text(text: &str, max_chars: usize) -> String {
    let relevant: Vec<&str> = text
        .lines()
        .filter(|line| {
            let lowered = line.to_lowercase();
            KEYWORDS.iter().any(|k| lowered.contains(k))
        })
        .collect();
    let joined = relevant.join("\n");
    if joined.chars().count() > MIN_RELEVANT_CHARS {
        return joined.chars().take(max_chars).collect();
    }

    let start = text.chars().count() / 3;
    text.chars().skip(start).take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_chrome_is_dropped() {
        let html = r"<html><head><style>.x{}</style></head><body>
            <header>Menu Inventory</header><nav>Home</nav>
            <main><h2>Lakeside Ford</h2><p>12   Shore Dr</p></main>
            <script>var a = 1;</script><footer>Copyright</footer></body></html>";
        assert_eq!(page_text(html), "Lakeside Ford\n12 Shore Dr");
    }

    #[test]
    fn keyword_lines_win_when_plentiful() {
        let dealer_lines = "Visit our dealer showroom at 1 Main Street\n".repeat(20);
        let text = format!("Welcome\n{dealer_lines}Unrelated footer text");
        let sample = relevant_text(&text, 8000);
        assert!(!sample.contains("Welcome"));
        assert!(sample.starts_with("Visit our dealer"));
    }

    #[test]
    fn sparse_pages_fall_back_to_a_middle_slice() {
        let text = "a".repeat(30) + &"b".repeat(30) + &"c".repeat(30);
        let sample = relevant_text(&text, 20);
        assert_eq!(sample, "b".repeat(20));
    }
}
