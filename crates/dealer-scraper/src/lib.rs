//! Dealership-location extraction: fetch a dealer group's locations page,
//! run the strategy chain over it, fall back to browser rendering, directory
//! and sitemap crawls, and the LLM, then hand back normalized records.

pub mod coordinator;
pub(crate) mod dom;
pub mod error;
pub mod export;
pub mod fetch;
pub mod llm;
pub(crate) mod patterns;
pub mod pipeline;
pub mod rules;
pub mod strategies;

pub use coordinator::{Coordinator, StrategyRun};
pub use error::{BrowserError, ExtractionError, ScraperError};
pub use export::{export, export_to_path, ExportError, ExportFormat};
pub use fetch::{FetchOrchestrator, FetchSettings, FetchStage, FetchedPage};
pub use llm::{LlmError, LlmExtractor, LlmSettings};
pub use pipeline::{
    scrape_dealer_locations, CrawlLimits, ScrapeOutcome, ScrapeSource, Scraper, NO_DATA_CAUSES,
};
pub use rules::{DomainRule, FieldSelectors, RuleStore, RuleStoreError};
pub use strategies::{default_registry, PageInput, Strategy, StrategyRegistry, Tier};
