//! Headless Chromium via chromiumoxide. The browser process is launched on
//! the first render and shared by every tab afterwards.

use std::fmt::Display;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetUserAgentOverrideParams;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::sync::OnceCell;

use super::browser::{RenderContext, Renderer};
use crate::error::BrowserError;

/// Locate a Chromium binary: the configured path if it exists, else the
/// usual executable names on `PATH`.
#[must_use]
pub fn find_chromium(configured: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = configured {
        if path.exists() {
            return Some(path.to_path_buf());
        }
        tracing::warn!(path = %path.display(), "configured chromium path does not exist");
    }
    ["google-chrome", "chromium", "chromium-browser"]
        .iter()
        .find_map(|name| which::which(name).ok())
}

pub struct ChromiumRenderer {
    executable: PathBuf,
    browser: OnceCell<Browser>,
}

impl std::fmt::Debug for ChromiumRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChromiumRenderer")
            .field("executable", &self.executable)
            .field("launched", &self.browser.initialized())
            .finish()
    }
}

impl ChromiumRenderer {
    /// Resolve the binary now; launching is deferred until the first tab.
    ///
    /// # Errors
    ///
    /// Returns [`BrowserError::Unavailable`] when no Chromium binary is found.
    pub fn new(configured: Option<&Path>) -> Result<Self, BrowserError> {
        let executable = find_chromium(configured).ok_or_else(|| {
            BrowserError::Unavailable("no chromium executable found".to_string())
        })?;
        Ok(Self {
            executable,
            browser: OnceCell::new(),
        })
    }

    async fn browser(&self) -> Result<&Browser, BrowserError> {
        self.browser
            .get_or_try_init(|| async {
                let config = BrowserConfig::builder()
                    .chrome_executable(&self.executable)
                    .arg("--headless=new")
                    .arg("--disable-gpu")
                    .arg("--no-sandbox")
                    .arg("--disable-dev-shm-usage")
                    .arg("--disable-extensions")
                    .arg("--disable-blink-features=AutomationControlled")
                    .build()
                    .map_err(BrowserError::Launch)?;

                let (browser, mut handler) = Browser::launch(config)
                    .await
                    .map_err(|e| BrowserError::Launch(e.to_string()))?;

                tokio::spawn(async move {
                    while let Some(event) = handler.next().await {
                        if let Err(error) = event {
                            tracing::trace!(%error, "chromium handler event error");
                        }
                    }
                });

                tracing::info!(executable = %self.executable.display(), "chromium launched");
                Ok(browser)
            })
            .await
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn new_context(
        &self,
        user_agent: Option<&str>,
    ) -> Result<Box<dyn RenderContext>, BrowserError> {
        let page = self
            .browser()
            .await?
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::Launch(format!("failed to open tab: {e}")))?;

        if let Some(ua) = user_agent {
            page.execute(SetUserAgentOverrideParams::new(ua))
                .await
                .map_err(|e| BrowserError::Script(format!("user agent override failed: {e}")))?;
        }

        Ok(Box::new(ChromiumContext { page }))
    }
}

/// Run `navigation` (load plus settle) under one `timeout_ms` budget.
async fn navigate_within<F, E>(url: &str, timeout_ms: u64, navigation: F) -> Result<(), BrowserError>
where
    F: Future<Output = Result<(), E>>,
    E: Display,
{
    match tokio::time::timeout(Duration::from_millis(timeout_ms), navigation).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(BrowserError::Navigation {
            url: url.to_string(),
            reason: e.to_string(),
        }),
        Err(_) => Err(BrowserError::Timeout {
            url: url.to_string(),
            timeout_ms,
        }),
    }
}

struct ChromiumContext {
    page: Page,
}

impl ChromiumContext {
    async fn eval<T: serde::de::DeserializeOwned>(&self, script: &str) -> Result<T, BrowserError> {
        self.page
            .evaluate(script)
            .await
            .map_err(|e| BrowserError::Script(e.to_string()))?
            .into_value::<T>()
            .map_err(|e| BrowserError::Script(e.to_string()))
    }
}

#[async_trait]
impl RenderContext for ChromiumContext {
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<(), BrowserError> {
        let page = &self.page;
        navigate_within(url, timeout_ms, async move {
            page.goto(url).await?;
            if let Err(error) = page.wait_for_navigation().await {
                tracing::debug!(url, %error, "wait for navigation failed");
            }
            Ok::<(), CdpError>(())
        })
        .await
    }

    async fn has_element(&self, selector: &str) -> Result<bool, BrowserError> {
        let quoted = serde_json::to_string(selector)
            .map_err(|e| BrowserError::Script(e.to_string()))?;
        self.eval(&format!("document.querySelector({quoted}) !== null"))
            .await
    }

    async fn scroll_to_bottom(&self) -> Result<(), BrowserError> {
        self.page
            .evaluate("window.scrollTo(0, document.body.scrollHeight)")
            .await
            .map(|_| ())
            .map_err(|e| BrowserError::Script(e.to_string()))
    }

    async fn content(&self) -> Result<String, BrowserError> {
        self.eval("document.documentElement.outerHTML").await
    }

    async fn close(self: Box<Self>) -> Result<(), BrowserError> {
        self.page
            .close()
            .await
            .map_err(|e| BrowserError::Script(e.to_string()))
    }
}
