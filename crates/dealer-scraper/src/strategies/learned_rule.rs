//! Replays [`DomainRule`]s promoted from earlier LLM extractions.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use dealer_core::RawDealerRecord;
use regex::Regex;
use scraper::{ElementRef, Html};

use super::{PageInput, Strategy, Tier};
use crate::dom::{parse_selector, text_of};
use crate::error::ExtractionError;
use crate::rules::{layout_signature, DomainRule, RuleStore, PATTERN_HOST};

static RULE_CSZ_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([^,]+),\s*([A-Za-z]{2})\s*(\d{5})").expect("valid regex"));
static RULE_PHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}").expect("valid regex")
});

pub struct LearnedRuleStrategy {
    store: Arc<RuleStore>,
}

impl LearnedRuleStrategy {
    #[must_use]
    pub fn new(store: Arc<RuleStore>) -> Self {
        Self { store }
    }

    /// Whether the store holds anything that could apply to `page`: rules
    /// for its host, or any layout-signature rule. Answered from the store cache.
    fn has_candidates(&self, page: &PageInput<'_>) -> bool {
        let host = url::Url::parse(page.url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string));
        let lookup = |key: &str| {
            self.store.has_rules_for(key).unwrap_or_else(|error| {
                tracing::warn!(%error, "could not read learned rules");
                false
            })
        };
        host.is_some_and(|host| lookup(host.as_str())) || lookup(PATTERN_HOST)
    }

    /// Host rules whose path regex matches, else pattern rules whose
    /// signature equals this page's layout signature.
    fn matching_rules(&self, page: &PageInput<'_>) -> Vec<DomainRule> {
        let Ok(url) = url::Url::parse(page.url) else {
            return Vec::new();
        };
        let path = if url.path().is_empty() { "/" } else { url.path() };

        let host_rules = url
            .host_str()
            .map(|host| self.store.list_for_host(host))
            .transpose()
            .unwrap_or_else(|error| {
                tracing::warn!(%error, "could not read learned rules");
                None
            })
            .unwrap_or_default();
        let matched: Vec<DomainRule> = host_rules
            .into_iter()
            .filter(|rule| {
                Regex::new(&rule.path_pattern).is_ok_and(|re| re.is_match(path))
            })
            .collect();
        if !matched.is_empty() {
            return matched;
        }

        let Some(signature) = layout_signature(page.html) else {
            return Vec::new();
        };
        match self.store.pattern_rules() {
            Ok(rules) => rules
                .into_iter()
                .filter(|rule| rule.path_pattern == signature)
                .collect(),
            Err(error) => {
                tracing::warn!(%error, "could not read pattern rules");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl Strategy for LearnedRuleStrategy {
    fn name(&self) -> &'static str {
        "learned_rule"
    }

    fn tier(&self) -> Tier {
        Tier::Specific
    }

    fn can_handle(&self, page: &PageInput<'_>) -> bool {
        self.has_candidates(page)
    }

    async fn extract(
        &self,
        page: &PageInput<'_>,
    ) -> Result<Vec<RawDealerRecord>, ExtractionError> {
        let rules = self.matching_rules(page);
        let mut records = Vec::new();
        let mut replayed = Vec::new();
        {
            let doc = Html::parse_document(page.html);
            for rule in &rules {
                let found = apply_rule(&doc, rule, page.url);
                if !found.is_empty() {
                    replayed.push(rule);
                }
                records.extend(found);
            }
        }

        for rule in replayed {
            if let Err(error) = self.store.record_success(&rule.host, &rule.path_pattern) {
                tracing::warn!(%error, host = %rule.host, "could not record rule success");
            }
        }

        tracing::debug!(count = records.len(), rules = rules.len(), "learned rules replayed");
        Ok(records)
    }
}

fn first_match_text(card: ElementRef<'_>, css: Option<&String>) -> String {
    css.and_then(|css| parse_selector(css))
        .and_then(|sel| card.select(&sel).next())
        .map(text_of)
        .unwrap_or_default()
}

/// First element under `css` whose text holds `City, ST 12345`.
fn city_state_zip(card: ElementRef<'_>, css: Option<&String>) -> Option<(String, String, String)> {
    let sel = css.and_then(|css| parse_selector(css))?;
    card.select(&sel).map(text_of).find_map(|text| {
        RULE_CSZ_RE.captures(&text).map(|caps| {
            (
                caps[1].trim().to_string(),
                caps[2].to_ascii_uppercase(),
                caps[3].to_string(),
            )
        })
    })
}

fn apply_rule(doc: &Html, rule: &DomainRule, page_url: &str) -> Vec<RawDealerRecord> {
    let Some(card_selector) = parse_selector(&rule.card_selector) else {
        tracing::warn!(selector = %rule.card_selector, "learned rule has an invalid card selector");
        return Vec::new();
    };
    doc.select(&card_selector)
        .filter_map(|card| apply_to_card(card, rule, page_url))
        .collect()
}

fn apply_to_card(card: ElementRef<'_>, rule: &DomainRule, page_url: &str) -> Option<RawDealerRecord> {
    let fields = &rule.fields;
    let name = first_match_text(card, fields.name.as_ref());
    if name.is_empty() {
        return None;
    }

    let mut record = RawDealerRecord::named(name);
    record.street = first_match_text(card, fields.street.as_ref());

    if let Some((city, state, zip)) = city_state_zip(card, fields.city_state_zip.as_ref()) {
        record.city = city;
        record.state = state;
        record.zip = zip;
    } else {
        record.city = first_match_text(card, fields.city.as_ref());
        record.state = first_match_text(card, fields.state.as_ref()).to_ascii_uppercase();
        record.zip = first_match_text(card, fields.zip.as_ref());
    }

    let phone_text = first_match_text(card, fields.phone.as_ref());
    record.phone = RULE_PHONE_RE
        .find(&phone_text)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();

    let website_selector = fields.website.as_deref().unwrap_or("a[href]");
    record.website = parse_selector(website_selector)
        .and_then(|sel| card.select(&sel).find_map(|a| a.value().attr("href")))
        .filter(|href| href.starts_with("http"))
        .map_or_else(|| page_url.to_string(), str::to_string);

    (!record.street.is_empty() || !record.city.is_empty()).then_some(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::FieldSelectors;

    const PAGE: &str = r#"<main>
      <div class="store"><h3>North Ford</h3><span class="st">1 North Rd</span>
        <span class="csz">Fargo, ND 58102</span><span class="ph">Call (701) 555-0100</span>
        <a href="https://northford.com">Site</a></div>
      <div class="store"><h3>South Kia</h3><span class="st">2 South Rd</span>
        <span class="csz">Bismarck, nd 58501</span></div>
      <div class="store"><span class="st">3 Nameless Rd</span></div>
    </main>"#;

    fn store_rule() -> DomainRule {
        DomainRule {
            host: "northgroup.com".to_string(),
            path_pattern: "^/locations".to_string(),
            version: 1,
            card_selector: "div.store".to_string(),
            fields: FieldSelectors {
                name: Some("h3".to_string()),
                street: Some(".st".to_string()),
                city_state_zip: Some(".csz".to_string()),
                phone: Some(".ph".to_string()),
                ..FieldSelectors::default()
            },
            dom_signature: None,
            success_count: 0,
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn replays_host_rule_and_records_success() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(RuleStore::open(dir.path().join("rules.json")));
        store.upsert(store_rule()).unwrap();
        let strategy = LearnedRuleStrategy::new(Arc::clone(&store));

        let other_path = PageInput::new(PAGE, "https://www.northgroup.com/about");
        assert!(strategy.can_handle(&other_path));
        assert!(strategy.extract(&other_path).await.unwrap().is_empty());

        let other_host = PageInput::new(PAGE, "https://southgroup.com/locations/");
        assert!(!strategy.can_handle(&other_host));

        let page = PageInput::new(PAGE, "https://www.northgroup.com/locations/");
        assert!(strategy.can_handle(&page));
        let records = strategy.extract(&page).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "North Ford");
        assert_eq!(records[0].city, "Fargo");
        assert_eq!(records[0].phone, "(701) 555-0100");
        assert_eq!(records[0].website, "https://northford.com");
        assert_eq!(records[1].state, "ND");
        assert_eq!(records[1].website, "https://www.northgroup.com/locations/");

        let stored = store.list_for_host("northgroup.com").unwrap();
        assert_eq!(stored[0].success_count, 1);
        let on_disk = RuleStore::open(store.path()).list_for_host("northgroup.com").unwrap();
        assert_eq!(on_disk[0].success_count, 1);
        assert_eq!(stored[0].version, 2);
    }

    #[tokio::test]
    async fn falls_back_to_pattern_rule_with_same_signature() {
        let card = |n: u32| {
            format!(
                r#"<div class="location-item"><h3>Store {n}</h3><p>{n}00 Main St</p>
                <p>Austin, TX 7870{n}</p><a href="tel:5125550100">512-555-010{n}</a></div>"#
            )
        };
        let html = format!("<body>{}{}{}</body>", card(1), card(2), card(3));
        let signature = layout_signature(&html).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(RuleStore::open(dir.path().join("rules.json")));
        store.upsert(DomainRule::for_signature(&signature)).unwrap();
        let strategy = LearnedRuleStrategy::new(Arc::clone(&store));

        let page = PageInput::new(&html, "https://unseen-group.com/stores");
        assert!(strategy.can_handle(&page));
        let unrelated = PageInput::new("<p>About us</p>", "https://unseen-group.com/about");
        assert!(strategy.extract(&unrelated).await.unwrap().is_empty());
        let records = strategy.extract(&page).await.unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[2].name, "Store 3");
        assert_eq!(records[2].street, "300 Main St");
        assert_eq!(records[2].city, "Austin");
        assert_eq!(records[2].zip, "78703");
        assert_eq!(store.pattern_rules().unwrap()[0].host, PATTERN_HOST);
        assert_eq!(store.pattern_rules().unwrap()[0].success_count, 1);
    }

    #[test]
    fn can_handle_does_not_reread_the_rule_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.json");
        let store = Arc::new(RuleStore::open(&path));
        store.upsert(store_rule()).unwrap();
        let strategy = LearnedRuleStrategy::new(Arc::clone(&store));

        std::fs::remove_file(&path).unwrap();
        let page = PageInput::new(PAGE, "https://northgroup.com/locations");
        assert!(strategy.can_handle(&page));
    }

    #[test]
    fn empty_store_handles_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(RuleStore::open(dir.path().join("rules.json")));
        let strategy = LearnedRuleStrategy::new(store);
        assert!(!strategy.can_handle(&PageInput::new(PAGE, "https://northgroup.com/locations")));
    }
}
