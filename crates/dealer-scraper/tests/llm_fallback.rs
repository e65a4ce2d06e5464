//! Integration tests for `LlmExtractor` against a mocked chat-completions API.

use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use dealer_scraper::rules::PATTERN_HOST;
use dealer_scraper::{LlmError, LlmExtractor, LlmSettings, RuleStore};

const PAGE_URL: &str = "https://www.lakesideauto.com/our-dealerships";

/// Three location cards: enough containers, street lines, and phones for a
/// layout signature.
const PAGE: &str = r#"<html><body>
  <header>Inventory Specials</header>
  <div class="location-card"><h3>Lakeside Ford</h3><p>12 Shore Dr</p><p>(512) 555-0100</p></div>
  <div class="location-card"><h3>Lakeside Toyota</h3><p>14 Shore Dr</p><p>(512) 555-0101</p></div>
  <div class="location-card"><h3>Lakeside Honda</h3><p>16 Shore Dr</p><p>(512) 555-0102</p></div>
</body></html>"#;

fn settings(base_url: &str) -> LlmSettings {
    LlmSettings {
        enabled: true,
        api_key: Some("test-key".to_string()),
        model: "gpt-4o-mini".to_string(),
        base_url: base_url.to_string(),
        max_chars: 8000,
    }
}

fn completion(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "choices": [{ "index": 0, "message": { "role": "assistant", "content": content } }]
    })
}

fn three_dealers() -> String {
    let items = json!([
        { "name": "Lakeside Ford", "street": "12 Shore Dr", "city": "Austin", "state": "TX",
          "zip": "78701", "phone": "(512) 555-0100" },
        { "name": "Lakeside Toyota", "street": "14 Shore Dr", "city": "Austin", "state": "TX",
          "zip": "78701", "phone": "(512) 555-0101" },
        { "name": "Lakeside Honda", "street": "16 Shore Dr", "city": "Austin", "state": "TX",
          "zip": "78701", "phone": "(512) 555-0102" }
    ]);
    format!("```json\n{items}\n```")
}

// ---------------------------------------------------------------------------
// Successful extraction and rule promotion
// ---------------------------------------------------------------------------

#[tokio::test]
async fn three_valid_records_are_returned_and_promoted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({ "model": "gpt-4o-mini", "temperature": 0 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(&three_dealers())))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let rules = Arc::new(RuleStore::open(dir.path().join("rules.json")));
    let extractor =
        LlmExtractor::new(reqwest::Client::new(), settings(&server.uri())).with_rules(Arc::clone(&rules));

    let records = extractor.extract(PAGE, PAGE_URL).await;
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].name, "Lakeside Ford");
    assert_eq!(records[2].phone, "(512) 555-0102");
    assert_eq!(records[1].website, PAGE_URL);

    let host_rules = rules.list_for_host("lakesideauto.com").unwrap();
    assert_eq!(host_rules.len(), 1);
    assert_eq!(host_rules[0].path_pattern, "^/our\\-dealerships$");

    let pattern_rules = rules.list_for_host(PATTERN_HOST).unwrap();
    assert_eq!(pattern_rules.len(), 1);
    assert!(pattern_rules[0].path_pattern.starts_with("layout:"));
}

#[tokio::test]
async fn fewer_than_three_records_are_not_promoted() {
    let server = MockServer::start().await;
    let reply = json!([{ "name": "Lakeside Ford", "street": "12 Shore Dr", "state": "TX" }]);
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(&reply.to_string())))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let rules = Arc::new(RuleStore::open(dir.path().join("rules.json")));
    let extractor =
        LlmExtractor::new(reqwest::Client::new(), settings(&server.uri())).with_rules(Arc::clone(&rules));

    assert_eq!(extractor.extract(PAGE, PAGE_URL).await.len(), 1);
    assert!(rules.list_for_host("lakesideauto.com").unwrap().is_empty());
    assert!(!rules.path().exists());
}

// ---------------------------------------------------------------------------
// Degraded replies
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rate_limits_degrade_to_empty() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": { "message": "Rate limit reached for gpt-4o-mini", "type": "requests" }
        })))
        .mount(&server)
        .await;

    let extractor = LlmExtractor::new(reqwest::Client::new(), settings(&server.uri()));
    assert!(matches!(
        extractor.try_extract(PAGE, PAGE_URL).await,
        Err(LlmError::RateLimited)
    ));
    assert!(extractor.extract(PAGE, PAGE_URL).await.is_empty());
}

#[tokio::test]
async fn exhausted_quota_is_classified() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": { "message": "You exceeded your current quota", "type": "insufficient_quota" }
        })))
        .mount(&server)
        .await;

    let extractor = LlmExtractor::new(reqwest::Client::new(), settings(&server.uri()));
    assert!(matches!(
        extractor.try_extract(PAGE, PAGE_URL).await,
        Err(LlmError::QuotaExceeded)
    ));
}

#[tokio::test]
async fn prose_replies_are_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion("Sorry, I could not find any dealerships.")),
        )
        .mount(&server)
        .await;

    let extractor = LlmExtractor::new(reqwest::Client::new(), settings(&server.uri()));
    assert!(matches!(
        extractor.try_extract(PAGE, PAGE_URL).await,
        Err(LlmError::MalformedReply(_))
    ));
    assert!(extractor.extract(PAGE, PAGE_URL).await.is_empty());
}
