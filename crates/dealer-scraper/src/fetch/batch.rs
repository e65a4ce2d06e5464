//! Bounded-concurrency fetch and extract over a list of subpages.

use dealer_core::{dedupe_raw_records, RawDealerRecord};
use futures::stream::{self, StreamExt};

use super::{FetchOrchestrator, FetchedPage};
use crate::coordinator::Coordinator;
use crate::error::ScraperError;

/// How each page in a batch is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchFetch {
    /// Normal escalation: static first, browser only when static fails.
    StaticFirst,
    /// Render and scroll every page; static is used only if rendering fails.
    Rendered,
}

async fn fetch_one(
    orchestrator: &FetchOrchestrator,
    url: &str,
    mode: BatchFetch,
) -> Result<FetchedPage, ScraperError> {
    if mode == BatchFetch::Rendered {
        match orchestrator.fetch(url, true).await {
            Ok(page) => return Ok(page),
            Err(error) => {
                tracing::debug!(url, %error, "subpage render failed; fetching statically");
            }
        }
    }
    orchestrator.fetch(url, false).await
}

/// Fetch and extract every URL with at most `max_concurrent` in flight.
///
/// Each worker owns its page's records; a failed fetch contributes nothing.
/// The union is deduplicated once every worker has finished.
pub async fn fetch_and_extract_all(
    orchestrator: &FetchOrchestrator,
    coordinator: &Coordinator,
    urls: &[String],
    max_concurrent: usize,
    mode: BatchFetch,
) -> Vec<RawDealerRecord> {
    let per_page: Vec<Vec<RawDealerRecord>> = stream::iter(urls)
        .map(|url| async move {
            match fetch_one(orchestrator, url, mode).await {
                Ok(page) => coordinator.extract_raw(&page.html, &page.url).await,
                Err(error) => {
                    tracing::warn!(url = %url, %error, "batch fetch failed; skipping page");
                    Vec::new()
                }
            }
        })
        .buffer_unordered(max_concurrent.max(1))
        .collect()
        .await;

    let pages = per_page.len();
    let merged = dedupe_raw_records(per_page.into_iter().flatten().collect());
    tracing::info!(pages, records = merged.len(), ?mode, "batch extraction complete");
    merged
}
