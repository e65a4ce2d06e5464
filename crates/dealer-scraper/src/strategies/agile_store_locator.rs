//! `WordPress` Agile Store Locator: the page only ships the plugin's AJAX
//! config, the store list comes from a follow-up `admin-ajax.php` call.

use std::sync::LazyLock;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine as _;
use dealer_core::RawDealerRecord;
use regex::Regex;
use serde_json::Value;

use super::{PageInput, Strategy, Tier};
use crate::error::ExtractionError;

const NAME: &str = "agile_store_locator";
const ACTIONS: [&str; 3] = ["asl_load_stores", "asl_stores_load", "asl_load_store"];
const MARKERS: &[&str] = &["agile-store-locator", "asl_remote", "asl_load_stores"];

static AJAX_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""ajax_url"\s*:\s*"([^"]+)""#).expect("valid regex"));
static NONCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""nonce"\s*:\s*"([^"]*)""#).expect("valid regex"));
static ADMIN_AJAX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)ajax_url.*?["'](https?://[^"']*admin-ajax\.php)["']"#).expect("valid regex")
});
static BASE64_SCRIPT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"src\s*=\s*["']data:text/javascript;base64,([^"']+)["']"#).expect("valid regex")
});
static CONFIG_VAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)var\s+asl_configuration\s*=\s*(\{.*?\});").expect("valid regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
struct AslConfig {
    ajax_url: String,
    nonce: String,
    lang: Option<String>,
    load_all: String,
    layout: Option<String>,
}

pub struct AgileStoreLocatorStrategy {
    client: reqwest::Client,
    user_agent: String,
}

impl AgileStoreLocatorStrategy {
    #[must_use]
    pub fn new(client: reqwest::Client, user_agent: &str) -> Self {
        Self {
            client,
            user_agent: user_agent.to_string(),
        }
    }

    async fn fetch_action(
        &self,
        config: &AslConfig,
        action: &str,
        page_url: &str,
    ) -> Result<Value, ExtractionError> {
        let mut query = vec![
            ("action", action.to_string()),
            ("nonce", config.nonce.clone()),
            ("load_all", config.load_all.clone()),
            ("lat", String::new()),
            ("lng", String::new()),
            ("distance", "100000".to_string()),
        ];
        if let Some(lang) = &config.lang {
            query.push(("asl_lang", lang.clone()));
        }
        if let Some(layout) = &config.layout {
            query.push(("layout", layout.clone()));
        }

        let body = self
            .client
            .get(&config.ajax_url)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .header(reqwest::header::REFERER, page_url)
            .query(&query)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| ExtractionError::new(NAME, e.to_string()))?
            .text()
            .await
            .map_err(|e| ExtractionError::new(NAME, e.to_string()))?;

        serde_json::from_str(&body).map_err(|e| ExtractionError::new(NAME, e.to_string()))
    }
}

#[async_trait]
impl Strategy for AgileStoreLocatorStrategy {
    fn name(&self) -> &'static str {
        NAME
    }

    fn tier(&self) -> Tier {
        Tier::Specific
    }

    fn can_handle(&self, page: &PageInput<'_>) -> bool {
        let lowered = page.html.to_ascii_lowercase();
        MARKERS.iter().any(|m| lowered.contains(m)) || BASE64_SCRIPT_RE.is_match(page.html)
    }

    async fn extract(
        &self,
        page: &PageInput<'_>,
    ) -> Result<Vec<RawDealerRecord>, ExtractionError> {
        let Some(config) = extract_config(page.html) else {
            tracing::debug!(url = page.url, "no agile store locator ajax config found");
            return Ok(Vec::new());
        };
        tracing::debug!(ajax_url = %config.ajax_url, "agile store locator config found");

        let mut last_error = None;
        for action in ACTIONS {
            match self.fetch_action(&config, action, page.url).await {
                Ok(payload) => {
                    let records = parse_stores(&payload, page.url);
                    if !records.is_empty() {
                        tracing::debug!(action, count = records.len(), "agile store locator stores loaded");
                        return Ok(records);
                    }
                }
                Err(error) => {
                    tracing::debug!(action, %error, "agile store locator action failed");
                    last_error = Some(error);
                }
            }
        }

        match last_error {
            Some(error) => Err(error),
            None => Ok(Vec::new()),
        }
    }
}

fn unescape_slashes(s: &str) -> String {
    s.replace("\\/", "/")
}

/// Decode every inline `data:text/javascript;base64,...` script.
fn decoded_scripts(html: &str) -> Vec<String> {
    BASE64_SCRIPT_RE
        .captures_iter(html)
        .filter_map(|caps| {
            let payload = caps[1].trim().trim_end_matches('=');
            STANDARD_NO_PAD
                .decode(payload)
                .ok()
                .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        })
        .collect()
}

fn config_from_source(source: &str) -> Option<AslConfig> {
    let ajax_url = AJAX_URL_RE
        .captures(source)
        .or_else(|| ADMIN_AJAX_RE.captures(source))
        .map(|caps| unescape_slashes(caps[1].trim()))
        .filter(|url| !url.is_empty())?;
    let nonce = NONCE_RE
        .captures(source)
        .map(|caps| caps[1].trim().to_string())
        .unwrap_or_default();

    let settings: Option<Value> = CONFIG_VAR_RE
        .captures(source)
        .and_then(|caps| serde_json::from_str(&caps[1]).ok());
    let setting = |key: &str| {
        settings
            .as_ref()
            .and_then(|s| s.get(key))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    Some(AslConfig {
        ajax_url,
        nonce,
        lang: setting("lang"),
        load_all: setting("load_all").unwrap_or_else(|| "1".to_string()),
        layout: setting("layout"),
    })
}

/// Plain page source first, then the base64-embedded scripts.
fn extract_config(html: &str) -> Option<AslConfig> {
    config_from_source(html).or_else(|| {
        decoded_scripts(html)
            .iter()
            .filter(|script| script.contains("ajax_url"))
            .find_map(|script| config_from_source(script))
    })
}

fn text_field(store: &Value, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|key| match store.get(*key) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
        .unwrap_or_default()
}

fn parse_stores(payload: &Value, page_url: &str) -> Vec<RawDealerRecord> {
    let stores = payload
        .as_array()
        .or_else(|| payload.get("stores").and_then(Value::as_array))
        .or_else(|| payload.get("data").and_then(Value::as_array));
    let Some(stores) = stores else {
        return Vec::new();
    };

    stores
        .iter()
        .filter_map(|store| {
            let name = text_field(store, &["title", "name"]);
            if name.is_empty() {
                return None;
            }
            Some(RawDealerRecord {
                name,
                street: text_field(store, &["street", "address"]),
                city: text_field(store, &["city"]),
                state: text_field(store, &["state"]),
                zip: text_field(store, &["postal_code", "zip"]),
                phone: text_field(store, &["phone"]),
                website: page_url.to_string(),
            })
        })
        .collect()
}
