//! Fetch orchestration: static HTTP first, an alternate header profile
//! second, a headless browser last.
//!
//! Hosts on the blocked list and callers that force the browser skip the
//! static stages. A static body that is only a client-rendered shell is kept
//! as a fallback while the browser is tried.

pub mod batch;
pub mod browser;
pub mod chromium;
pub mod directory;
pub mod http;
pub mod sitemap;

use std::sync::Arc;
use std::time::Duration;

use dealer_core::AppConfig;
use url::Url;

pub use batch::{fetch_and_extract_all, BatchFetch};
pub use browser::{render_page, NoopRenderer, RenderContext, RenderOptions, Renderer};
pub use chromium::{find_chromium, ChromiumRenderer};
pub use directory::find_directory_links;
pub use http::{fetch_html, fetch_text, HeaderProfile};
pub use sitemap::{discover_location_pages, looks_like_locations_path, parse_sitemap_locs};

use crate::error::ScraperError;

/// Which stage produced a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStage {
    Static,
    AlternateStatic,
    Browser,
}

impl FetchStage {
    /// `true` for either static attempt.
    #[must_use]
    pub fn is_static(self) -> bool {
        matches!(self, Self::Static | Self::AlternateStatic)
    }
}

#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub html: String,
    pub stage: FetchStage,
}

/// Knobs the orchestrator reads on every fetch.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub user_agent: String,
    pub alternate_user_agent: String,
    pub alternate_delay_ms: u64,
    pub blocked_domains: Vec<String>,
    pub render: RenderOptions,
}

impl FetchSettings {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            alternate_user_agent: config.alternate_user_agent.clone(),
            alternate_delay_ms: config.alternate_delay_ms,
            blocked_domains: config
                .blocked_domains
                .iter()
                .map(|d| d.trim().to_ascii_lowercase())
                .filter(|d| !d.is_empty())
                .collect(),
            render: RenderOptions {
                navigation_timeout_ms: config.navigation_timeout_ms,
                selector_timeout_ms: config.selector_timeout_ms,
                ..RenderOptions::default()
            },
        }
    }
}

pub struct FetchOrchestrator {
    client: reqwest::Client,
    renderer: Arc<dyn Renderer>,
    settings: FetchSettings,
}

impl std::fmt::Debug for FetchOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchOrchestrator")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl FetchOrchestrator {
    #[must_use]
    pub fn new(client: reqwest::Client, renderer: Arc<dyn Renderer>, settings: FetchSettings) -> Self {
        Self {
            client,
            renderer,
            settings,
        }
    }

    #[must_use]
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    #[must_use]
    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }

    /// Whether `host` is on, or a subdomain of an entry on, the blocked list.
    #[must_use]
    pub fn is_blocked(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        self.settings
            .blocked_domains
            .iter()
            .any(|blocked| {
                host == *blocked
                    || host
                        .strip_suffix(blocked.as_str())
                        .is_some_and(|prefix| prefix.ends_with('.'))
            })
    }

    /// Render `url` in the browser.
    ///
    /// # Errors
    ///
    /// Returns the renderer's [`crate::error::BrowserError`] wrapped in
    /// [`ScraperError::Browser`].
    pub async fn render(&self, url: &str) -> Result<FetchedPage, ScraperError> {
        let html = render_page(self.renderer.as_ref(), url, &self.settings.render).await?;
        tracing::debug!(url, bytes = html.len(), "browser render succeeded");
        Ok(FetchedPage {
            url: url.to_string(),
            html,
            stage: FetchStage::Browser,
        })
    }

    async fn fetch_static(&self, url: &str, profile: HeaderProfile) -> Result<FetchedPage, ScraperError> {
        let (user_agent, stage) = match profile {
            HeaderProfile::Primary => (&self.settings.user_agent, FetchStage::Static),
            HeaderProfile::Alternate => (&self.settings.alternate_user_agent, FetchStage::AlternateStatic),
        };
        let html = fetch_html(&self.client, url, user_agent, profile).await?;
        Ok(FetchedPage {
            url: url.to_string(),
            html,
            stage,
        })
    }

    /// Fetch `url`, escalating through the stages until one yields a page.
    ///
    /// # Errors
    ///
    /// - [`ScraperError::InvalidUrl`] when `url` is not an absolute http(s) URL.
    /// - The browser error when `force_browser` is set and rendering fails.
    /// - [`ScraperError::AllStagesFailed`] when no stage produced a page.
    pub async fn fetch(&self, url: &str, force_browser: bool) -> Result<FetchedPage, ScraperError> {
        let parsed = validate_url(url)?;
        let host = parsed.host_str().unwrap_or_default();
        let blocked = self.is_blocked(host);

        if force_browser || blocked {
            tracing::info!(url, force_browser, blocked, "going straight to the browser");
            match self.render(url).await {
                Ok(page) => return Ok(page),
                Err(error) if force_browser => return Err(error),
                Err(error) => {
                    tracing::warn!(url, %error, "browser failed for blocked host; trying static fetch");
                }
            }
        }

        let mut shell: Option<FetchedPage> = None;
        let mut last_error = String::from("no stage attempted");

        for profile in [HeaderProfile::Primary, HeaderProfile::Alternate] {
            if profile == HeaderProfile::Alternate {
                tokio::time::sleep(Duration::from_millis(self.settings.alternate_delay_ms)).await;
            }
            match self.fetch_static(url, profile).await {
                Ok(page) if http::requires_javascript(&page.html) => {
                    tracing::info!(url, ?profile, "static page needs javascript; escalating to browser");
                    shell = Some(page);
                    break;
                }
                Ok(page) => return Ok(page),
                Err(error) => {
                    tracing::warn!(url, ?profile, %error, "static fetch failed");
                    last_error = error.to_string();
                }
            }
        }

        if !blocked {
            match self.render(url).await {
                Ok(page) => return Ok(page),
                Err(error) => {
                    tracing::warn!(url, %error, "browser render failed");
                    last_error = error.to_string();
                }
            }
        }

        if let Some(page) = shell {
            tracing::debug!(url, "falling back to the static shell");
            return Ok(page);
        }
        Err(ScraperError::AllStagesFailed {
            url: url.to_string(),
            last_error,
        })
    }
}

/// Parse `url`, requiring an http(s) scheme and a host.
///
/// # Errors
///
/// Returns [`ScraperError::InvalidUrl`] otherwise.
pub fn validate_url(url: &str) -> Result<Url, ScraperError> {
    let invalid = |reason: &str| ScraperError::InvalidUrl {
        url: url.to_string(),
        reason: reason.to_string(),
    };
    let parsed = Url::parse(url.trim()).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(invalid("missing host"));
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orchestrator(blocked: &[&str]) -> FetchOrchestrator {
        FetchOrchestrator::new(
            reqwest::Client::new(),
            Arc::new(NoopRenderer),
            FetchSettings {
                user_agent: "ua".to_string(),
                alternate_user_agent: "alt".to_string(),
                alternate_delay_ms: 0,
                blocked_domains: blocked.iter().map(|d| (*d).to_string()).collect(),
                render: RenderOptions::default(),
            },
        )
    }

    #[test]
    fn blocked_domains_match_subdomains() {
        let orch = orchestrator(&["hostiledealer.com"]);
        assert!(orch.is_blocked("www.hostiledealer.com"));
        assert!(orch.is_blocked("HostileDealer.com"));
        assert!(!orch.is_blocked("friendlydealer.com"));
        assert!(!orch.is_blocked("nothostiledealer.com"));
    }

    #[test]
    fn urls_must_be_absolute_http() {
        assert!(validate_url("https://dealer.com/locations").is_ok());
        assert!(matches!(
            validate_url("ftp://dealer.com"),
            Err(ScraperError::InvalidUrl { .. })
        ));
        assert!(validate_url("dealer.com/locations").is_err());
    }

    #[tokio::test]
    async fn forced_browser_failure_is_an_error() {
        let err = orchestrator(&[])
            .fetch("https://dealer.com/", true)
            .await
            .unwrap_err();
        assert!(matches!(err, ScraperError::Browser(_)));
    }
}
