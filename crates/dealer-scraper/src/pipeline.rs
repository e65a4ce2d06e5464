//! The end-to-end scrape of one dealer-group URL.
//!
//! Stages, each tried only when everything before it produced no records:
//! fetch and extract, directory crawl (every subpage rendered), forced
//! browser render, LLM fallback, sitemap crawl. Whatever stage succeeds, its raw records are normalized
//! and tagged with the dealer group.

use std::sync::Arc;
use std::time::Duration;

use dealer_core::{normalize_records, AppConfig, CanonicalDealerRecord, RawDealerRecord};

use crate::coordinator::Coordinator;
use crate::error::ScraperError;
use crate::fetch::{
    discover_location_pages, fetch_and_extract_all, find_directory_links,
    looks_like_locations_path, validate_url, BatchFetch, ChromiumRenderer, FetchOrchestrator,
    FetchSettings, FetchedPage, NoopRenderer, Renderer,
};
use crate::llm::{LlmExtractor, LlmSettings};
use crate::rules::RuleStore;
use crate::strategies::default_registry;

/// Plausible reasons shown to the user alongside a "no data" result.
pub const NO_DATA_CAUSES: &[&str] = &[
    "the page layout is not one the extractor recognises",
    "the locations are only loaded by client-side scripts or a map widget",
    "the URL is not the group's locations page",
];

/// Which stage produced the records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapeSource {
    Static,
    Browser,
    Directory,
    Llm,
    Sitemap,
}

impl ScrapeSource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Browser => "browser",
            Self::Directory => "directory",
            Self::Llm => "llm",
            Self::Sitemap => "sitemap",
        }
    }
}

impl std::fmt::Display for ScrapeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub enum ScrapeOutcome {
    Found {
        records: Vec<CanonicalDealerRecord>,
        source: ScrapeSource,
    },
    /// Every stage ran and nothing usable came out.
    NoData { reason: String },
    /// The page could not be obtained at all.
    Failed { error: ScraperError },
}

#[derive(Debug, Clone, Copy)]
pub struct CrawlLimits {
    pub max_concurrent_fetches: usize,
    pub max_directory_links: usize,
    pub sitemap_page_cap: usize,
}

impl CrawlLimits {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_concurrent_fetches: config.max_concurrent_fetches,
            max_directory_links: config.max_directory_links,
            sitemap_page_cap: config.sitemap_page_cap,
        }
    }
}

impl Default for CrawlLimits {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: 5,
            max_directory_links: 100,
            sitemap_page_cap: 500,
        }
    }
}

#[derive(Debug)]
pub struct Scraper {
    orchestrator: FetchOrchestrator,
    coordinator: Coordinator,
    llm: LlmExtractor,
    limits: CrawlLimits,
}

impl Scraper {
    #[must_use]
    pub fn new(
        orchestrator: FetchOrchestrator,
        coordinator: Coordinator,
        llm: LlmExtractor,
        limits: CrawlLimits,
    ) -> Self {
        Self {
            orchestrator,
            coordinator,
            llm,
            limits,
        }
    }

    /// Wire up the production stack from configuration. A missing Chromium
    /// binary downgrades to static-only fetching.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the HTTP client cannot be built.
    pub fn from_config(config: &AppConfig) -> Result<Self, ScraperError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        let renderer: Arc<dyn Renderer> = if config.browser_enabled {
            match ChromiumRenderer::new(config.chromium_path.as_deref()) {
                Ok(chromium) => Arc::new(chromium),
                Err(error) => {
                    tracing::warn!(%error, "browser rendering unavailable; static fetches only");
                    Arc::new(NoopRenderer)
                }
            }
        } else {
            Arc::new(NoopRenderer)
        };

        let rules = Arc::new(RuleStore::open(config.rules_path.clone()));
        let registry = default_registry(Arc::clone(&rules), client.clone(), &config.user_agent);
        let orchestrator =
            FetchOrchestrator::new(client.clone(), renderer, FetchSettings::from_config(config));
        let llm = LlmExtractor::new(client, LlmSettings::from_config(config)).with_rules(rules);

        Ok(Self::new(
            orchestrator,
            Coordinator::new(registry),
            llm,
            CrawlLimits::from_config(config),
        ))
    }

    fn finish(
        raw: Vec<RawDealerRecord>,
        dealer_group: &str,
        source: ScrapeSource,
    ) -> Option<ScrapeOutcome> {
        if raw.is_empty() {
            return None;
        }
        let batch = normalize_records(raw, dealer_group);
        if batch.records.is_empty() {
            tracing::info!(%source, rejected = batch.rejected, "no records survived normalization");
            return None;
        }
        tracing::info!(
            %source,
            count = batch.records.len(),
            rejected = batch.rejected,
            duplicates = batch.duplicates,
            "scrape succeeded"
        );
        Some(ScrapeOutcome::Found {
            records: batch.records,
            source,
        })
    }

    /// Scrape `url` for `dealer_group`'s locations.
    pub async fn scrape(&self, dealer_group: &str, url: &str) -> ScrapeOutcome {
        if let Err(error) = validate_url(url) {
            return ScrapeOutcome::Failed { error };
        }

        let page = match self.orchestrator.fetch(url, false).await {
            Ok(page) => page,
            Err(error) => {
                tracing::error!(url, %error, "could not fetch page");
                return ScrapeOutcome::Failed { error };
            }
        };
        let source = if page.stage.is_static() {
            ScrapeSource::Static
        } else {
            ScrapeSource::Browser
        };

        let raw = self.coordinator.extract_raw(&page.html, &page.url).await;
        if let Some(found) = Self::finish(raw, dealer_group, source) {
            return found;
        }

        if let Some(found) = self.crawl_directory(&page, dealer_group).await {
            return found;
        }

        let mut best_html = page.html;
        if page.stage.is_static() {
            tracing::info!(url, "no records from static page; forcing browser render");
            match self.orchestrator.fetch(url, true).await {
                Ok(rendered) => {
                    let raw = self.coordinator.extract_raw(&rendered.html, &rendered.url).await;
                    if let Some(found) = Self::finish(raw, dealer_group, ScrapeSource::Browser) {
                        return found;
                    }
                    best_html = rendered.html;
                }
                Err(error) => tracing::warn!(url, %error, "forced browser render failed"),
            }
        }

        if self.llm.is_available() {
            tracing::info!(url, "pattern strategies found nothing; trying LLM fallback");
            let raw = self.llm.extract(&best_html, url).await;
            if let Some(found) = Self::finish(raw, dealer_group, ScrapeSource::Llm) {
                return found;
            }
        }

        if looks_like_locations_path(url) {
            if let Some(found) = self.crawl_sitemap(url, dealer_group).await {
                return found;
            }
        }

        ScrapeOutcome::NoData {
            reason: format!("no dealership locations found at {url}"),
        }
    }

    async fn crawl_directory(&self, page: &FetchedPage, dealer_group: &str) -> Option<ScrapeOutcome> {
        let links = find_directory_links(&page.html, &page.url, self.limits.max_directory_links)?;
        tracing::info!(url = %page.url, links = links.len(), "directory page detected; crawling subpages");
        let raw = fetch_and_extract_all(
            &self.orchestrator,
            &self.coordinator,
            &links,
            self.limits.max_concurrent_fetches,
            BatchFetch::Rendered,
        )
        .await;
        Self::finish(raw, dealer_group, ScrapeSource::Directory)
    }

    async fn crawl_sitemap(&self, url: &str, dealer_group: &str) -> Option<ScrapeOutcome> {
        let settings = self.orchestrator.settings();
        let pages = match discover_location_pages(
            self.orchestrator.client(),
            url,
            &settings.user_agent,
            self.limits.sitemap_page_cap,
        )
        .await
        {
            Ok(pages) if !pages.is_empty() => pages,
            Ok(_) => return None,
            Err(error) => {
                tracing::warn!(url, %error, "sitemap crawl failed");
                return None;
            }
        };
        let raw = fetch_and_extract_all(
            &self.orchestrator,
            &self.coordinator,
            &pages,
            self.limits.max_concurrent_fetches,
            BatchFetch::StaticFirst,
        )
        .await;
        Self::finish(raw, dealer_group, ScrapeSource::Sitemap)
    }
}

/// Build a [`Scraper`] from `config` and scrape `url` once.
pub async fn scrape_dealer_locations(
    config: &AppConfig,
    dealer_group: &str,
    url: &str,
) -> ScrapeOutcome {
    match Scraper::from_config(config) {
        Ok(scraper) => scraper.scrape(dealer_group, url).await,
        Err(error) => ScrapeOutcome::Failed { error },
    }
}
