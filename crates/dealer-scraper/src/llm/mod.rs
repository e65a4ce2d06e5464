//! LLM fallback extraction.
//!
//! Used only after every pattern strategy (static and rendered) came up
//! empty. Sends a trimmed text sample of the page to an OpenAI-compatible
//! chat completion endpoint and reads back a JSON list of locations. When
//! the reply yields enough valid records, the page's host and layout are
//! promoted into the rule store so the next visit skips the model.

mod prompt;
mod reply;

use std::sync::Arc;

use dealer_core::{validate_record, AppConfig, RawDealerRecord};
use serde_json::json;
use thiserror::Error;
use url::Url;

use crate::rules::{layout_signature, DomainRule, RuleStore};

/// Valid records needed before a page's layout is promoted to a rule.
pub const PROMOTION_THRESHOLD: usize = 3;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM fallback is disabled")]
    Disabled,

    #[error("no API key configured for the LLM fallback")]
    MissingApiKey,

    #[error("LLM request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("LLM API returned status {status}: {body}")]
    ApiStatus { status: u16, body: String },

    #[error("LLM API rate limit hit")]
    RateLimited,

    #[error("LLM API quota exhausted")]
    QuotaExceeded,

    #[error("malformed LLM reply: {0}")]
    MalformedReply(String),
}

#[derive(Clone)]
pub struct LlmSettings {
    pub enabled: bool,
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub max_chars: usize,
}

impl std::fmt::Debug for LlmSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmSettings")
            .field("enabled", &self.enabled)
            .field("api_key", &self.api_key.as_ref().map(|_| "[redacted]"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("max_chars", &self.max_chars)
            .finish()
    }
}

impl LlmSettings {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            enabled: config.llm_enabled,
            api_key: config.openai_api_key.clone(),
            model: config.llm_model.clone(),
            base_url: config.llm_base_url.clone(),
            max_chars: config.llm_max_chars,
        }
    }
}

#[derive(Debug)]
pub struct LlmExtractor {
    client: reqwest::Client,
    settings: LlmSettings,
    rules: Option<Arc<RuleStore>>,
}

impl LlmExtractor {
    #[must_use]
    pub fn new(client: reqwest::Client, settings: LlmSettings) -> Self {
        Self {
            client,
            settings,
            rules: None,
        }
    }

    /// Promote successful extractions into `rules`.
    #[must_use]
    pub fn with_rules(mut self, rules: Arc<RuleStore>) -> Self {
        self.rules = Some(rules);
        self
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        self.settings.enabled && self.settings.api_key.is_some()
    }

    /// Records the model finds on the page. Every failure is logged and
    /// degrades to an empty list.
    pub async fn extract(&self, html: &str, page_url: &str) -> Vec<RawDealerRecord> {
        match self.try_extract(html, page_url).await {
            Ok(records) => records,
            Err(LlmError::Disabled) => {
                tracing::debug!(page_url, "LLM fallback disabled; skipping");
                Vec::new()
            }
            Err(error @ (LlmError::RateLimited | LlmError::QuotaExceeded)) => {
                tracing::warn!(page_url, %error, "LLM fallback unavailable");
                Vec::new()
            }
            Err(error) => {
                tracing::warn!(page_url, %error, "LLM fallback failed");
                Vec::new()
            }
        }
    }

    /// Like [`Self::extract`], but surfaces the failure.
    ///
    /// # Errors
    ///
    /// Returns an [`LlmError`] when the fallback is switched off, has no key,
    /// the request fails, or the reply holds no JSON list.
    pub async fn try_extract(
        &self,
        html: &str,
        page_url: &str,
    ) -> Result<Vec<RawDealerRecord>, LlmError> {
        if !self.settings.enabled {
            return Err(LlmError::Disabled);
        }
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .ok_or(LlmError::MissingApiKey)?;

        let text = prompt::relevant_text(&prompt::page_text(html), self.settings.max_chars);
        if text.trim().is_empty() {
            tracing::debug!(page_url, "page has no text to send to the LLM");
            return Ok(Vec::new());
        }

        let content = self.complete(api_key, &text).await?;
        let items = reply::parse_reply(&content)?;
        let records = reply::records_from_items(&items, page_url);
        tracing::info!(page_url, items = items.len(), records = records.len(), "LLM extraction parsed");

        let valid = records.iter().filter(|r| validate_record(r).is_ok()).count();
        if valid >= PROMOTION_THRESHOLD {
            self.promote(html, page_url);
        }
        Ok(records)
    }

    async fn complete(&self, api_key: &str, text: &str) -> Result<String, LlmError> {
        let endpoint = format!("{}/chat/completions", self.settings.base_url.trim_end_matches('/'));
        let body = json!({
            "model": self.settings.model,
            "temperature": 0,
            "messages": [
                { "role": "system", "content": prompt::SYSTEM_PROMPT },
                { "role": "user", "content": text },
            ],
        });

        let response = self
            .client
            .post(&endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        let raw = response.text().await?;
        if !status.is_success() {
            return Err(classify_failure(status.as_u16(), raw));
        }

        let value: serde_json::Value = serde_json::from_str(&raw)
            .map_err(|e| LlmError::MalformedReply(format!("response is not JSON: {e}")))?;
        value
            .pointer("/choices/0/message/content")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| LlmError::MalformedReply("response has no message content".to_string()))
    }

    /// Store a host rule for this page's path and, when the page has a
    /// recognisable layout, a signature rule. Store failures are logged.
    fn promote(&self, html: &str, page_url: &str) {
        let Some(store) = &self.rules else {
            return;
        };
        let Ok(parsed) = Url::parse(page_url) else {
            return;
        };
        let Some(host) = parsed.host_str() else {
            return;
        };

        let mut rules = vec![DomainRule::for_path(host, parsed.path())];
        if let Some(signature) = layout_signature(html) {
            rules.push(DomainRule::for_signature(&signature));
        }
        for rule in rules {
            let key = rule.path_pattern.clone();
            match store.upsert(rule) {
                Ok(written) => tracing::info!(host, rule = %key, written, "learned rule promoted"),
                Err(error) => tracing::warn!(host, %error, "failed to store learned rule"),
            }
        }
    }
}

fn classify_failure(status: u16, body: String) -> LlmError {
    let lowered = body.to_lowercase();
    if lowered.contains("quota") {
        LlmError::QuotaExceeded
    } else if status == 429 || lowered.contains("rate limit") {
        LlmError::RateLimited
    } else {
        LlmError::ApiStatus { status, body }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(enabled: bool, key: Option<&str>) -> LlmSettings {
        LlmSettings {
            enabled,
            api_key: key.map(str::to_string),
            model: "gpt-4o-mini".to_string(),
            base_url: "http://127.0.0.1:9".to_string(),
            max_chars: 8000,
        }
    }

    #[test]
    fn failures_are_classified_by_status_and_body() {
        assert!(matches!(
            classify_failure(429, "You exceeded your current quota".to_string()),
            LlmError::QuotaExceeded
        ));
        assert!(matches!(classify_failure(429, String::new()), LlmError::RateLimited));
        assert!(matches!(
            classify_failure(503, "Rate limit reached for requests".to_string()),
            LlmError::RateLimited
        ));
        assert!(matches!(
            classify_failure(500, "boom".to_string()),
            LlmError::ApiStatus { status: 500, .. }
        ));
    }

    #[tokio::test]
    async fn disabled_or_keyless_extractors_do_nothing() {
        let off = LlmExtractor::new(reqwest::Client::new(), settings(false, Some("k")));
        assert!(matches!(off.try_extract("<p>x</p>", "https://a.com").await, Err(LlmError::Disabled)));
        assert!(off.extract("<p>x</p>", "https://a.com").await.is_empty());

        let keyless = LlmExtractor::new(reqwest::Client::new(), settings(true, None));
        assert!(!keyless.is_available());
        assert!(matches!(
            keyless.try_extract("<p>x</p>", "https://a.com").await,
            Err(LlmError::MissingApiKey)
        ));
    }

    #[test]
    fn debug_redacts_the_key() {
        let rendered = format!("{:?}", settings(true, Some("sk-secret")));
        assert!(!rendered.contains("sk-secret"));
    }
}
