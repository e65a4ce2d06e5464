//! Browser rendering abstraction.
//!
//! [`Renderer`] hands out [`RenderContext`]s (one tab each). The fetch
//! orchestrator only talks to these traits, so tests drive it with fakes and
//! the Chromium implementation lives in its own module.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::BrowserError;

/// Elements whose appearance means a dealer list has rendered.
pub const READY_SELECTORS: &[&str] = &[
    "div.panel-body",
    ".css-16af3dh li",
    "div.well.matchable-heights",
    "li.info-window",
    "div.dealerResults__listing",
    "ol#proximity-dealer-list",
    "div.dealer-card",
    "div.location",
    "div.dealer-info",
];

/// Rendered-markup substrings of JS widget vendors that serve different
/// markup to default automation fingerprints.
pub const STEALTH_VENDOR_MARKERS: &[&str] = &[
    "dealerinspire",
    "dealer inspire",
    "dealer-inspire",
    "loaddealercards",
    "dealerlocations",
];

/// A desktop Chrome user agent for the stealth re-render.
pub const STEALTH_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const SCROLL_PAUSE_MS: u64 = 750;

/// A browser engine that can open tabs.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Open a tab, optionally overriding the user agent.
    async fn new_context(
        &self,
        user_agent: Option<&str>,
    ) -> Result<Box<dyn RenderContext>, BrowserError>;
}

/// One browser tab.
#[async_trait]
pub trait RenderContext: Send + Sync {
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<(), BrowserError>;

    /// Whether `selector` matches an element right now.
    async fn has_element(&self, selector: &str) -> Result<bool, BrowserError>;

    async fn scroll_to_bottom(&self) -> Result<(), BrowserError>;

    /// Serialized DOM of the current document.
    async fn content(&self) -> Result<String, BrowserError>;

    async fn close(self: Box<Self>) -> Result<(), BrowserError>;
}

/// Stand-in when no browser is installed or browsing is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRenderer;

#[async_trait]
impl Renderer for NoopRenderer {
    async fn new_context(
        &self,
        _user_agent: Option<&str>,
    ) -> Result<Box<dyn RenderContext>, BrowserError> {
        Err(BrowserError::Unavailable(
            "browser rendering is disabled".to_string(),
        ))
    }
}

#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub navigation_timeout_ms: u64,
    /// Budget for the combined ready-selector wait.
    pub selector_timeout_ms: u64,
    pub scroll_passes: usize,
    pub stealth_user_agent: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            navigation_timeout_ms: 60_000,
            selector_timeout_ms: 5_000,
            scroll_passes: 2,
            stealth_user_agent: STEALTH_USER_AGENT.to_string(),
        }
    }
}

/// Poll until any ready selector matches or the budget runs out. Absence is
/// not an error; returns the selector that appeared.
pub async fn wait_for_any(
    ctx: &dyn RenderContext,
    selectors: &[&str],
    timeout_ms: u64,
) -> Option<String> {
    const POLL_MS: u64 = 250;
    let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
    loop {
        for selector in selectors {
            if matches!(ctx.has_element(selector).await, Ok(true)) {
                return Some((*selector).to_string());
            }
        }
        if tokio::time::Instant::now() >= deadline {
            return None;
        }
        tokio::time::sleep(Duration::from_millis(POLL_MS)).await;
    }
}

/// Open a tab, load `url`, wait for a dealer list, scroll, and read the DOM.
async fn render_once(
    renderer: &dyn Renderer,
    url: &str,
    options: &RenderOptions,
    user_agent: Option<&str>,
) -> Result<String, BrowserError> {
    let mut ctx = renderer.new_context(user_agent).await?;
    let result = async {
        ctx.navigate(url, options.navigation_timeout_ms).await?;
        match wait_for_any(ctx.as_ref(), READY_SELECTORS, options.selector_timeout_ms).await {
            Some(selector) => tracing::debug!(url, selector, "ready selector appeared"),
            None => tracing::debug!(url, "no ready selector appeared; reading page anyway"),
        }
        for _ in 0..options.scroll_passes {
            ctx.scroll_to_bottom().await?;
            tokio::time::sleep(Duration::from_millis(SCROLL_PAUSE_MS)).await;
        }
        ctx.content().await
    }
    .await;

    if let Err(error) = ctx.close().await {
        tracing::debug!(url, %error, "closing browser tab failed");
    }
    result
}

#[must_use]
pub fn has_stealth_vendor_marker(html: &str) -> bool {
    let lowered = html.to_ascii_lowercase();
    STEALTH_VENDOR_MARKERS.iter().any(|m| lowered.contains(m))
}

/// Render `url`. When the rendered page belongs to a vendor that fingerprints
/// automation, render once more with a realistic user agent and prefer that
/// result when it succeeds.
///
/// # Errors
///
/// Returns the first render's [`BrowserError`].
pub async fn render_page(
    renderer: &dyn Renderer,
    url: &str,
    options: &RenderOptions,
) -> Result<String, BrowserError> {
    let html = render_once(renderer, url, options, None).await?;
    if !has_stealth_vendor_marker(&html) {
        return Ok(html);
    }

    tracing::info!(url, "widget vendor detected; re-rendering with stealth user agent");
    match render_once(renderer, url, options, Some(&options.stealth_user_agent)).await {
        Ok(stealth_html) => Ok(stealth_html),
        Err(error) => {
            tracing::warn!(url, %error, "stealth re-render failed; keeping first render");
            Ok(html)
        }
    }
}
