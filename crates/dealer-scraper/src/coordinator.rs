//! Runs the strategy registry over one page.
//!
//! Every specific strategy that recognises the page runs; generic
//! strategies only run when the specific tier produced nothing. A failing
//! strategy is logged and skipped. The union is validated and deduplicated.

use dealer_core::{
    dedupe_raw_records, normalize_records, validate_record, CanonicalDealerRecord, RawDealerRecord,
};

use crate::error::ExtractionError;
use crate::strategies::{PageInput, StrategyRegistry, Tier};

/// Outcome of one strategy on one page.
#[derive(Debug)]
pub struct StrategyRun {
    pub name: &'static str,
    pub tier: Tier,
    pub result: Result<Vec<RawDealerRecord>, ExtractionError>,
}

impl StrategyRun {
    fn record_count(&self) -> usize {
        self.result.as_ref().map_or(0, Vec::len)
    }
}

#[derive(Debug)]
pub struct Coordinator {
    registry: StrategyRegistry,
}

impl Coordinator {
    #[must_use]
    pub fn new(registry: StrategyRegistry) -> Self {
        Self { registry }
    }

    #[must_use]
    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    /// Run every strategy of `tier` whose probe accepts the page, in
    /// registration order.
    pub async fn run_tier(&self, tier: Tier, page: &PageInput<'_>) -> Vec<StrategyRun> {
        let mut runs = Vec::new();
        for strategy in self.registry.tier(tier) {
            if !strategy.can_handle(page) {
                continue;
            }
            let result = strategy.extract(page).await;
            match &result {
                Ok(records) => tracing::debug!(
                    strategy = strategy.name(),
                    url = page.url,
                    count = records.len(),
                    "strategy finished"
                ),
                Err(error) => tracing::warn!(
                    strategy = strategy.name(),
                    url = page.url,
                    %error,
                    "strategy failed; continuing with the rest"
                ),
            }
            runs.push(StrategyRun {
                name: strategy.name(),
                tier,
                result,
            });
        }
        runs
    }

    /// Validated, deduplicated raw records for one page.
    pub async fn extract_raw(&self, html: &str, url: &str) -> Vec<RawDealerRecord> {
        let page = PageInput::new(html, url);

        let mut runs = self.run_tier(Tier::Specific, &page).await;
        let specific_total: usize = runs.iter().map(StrategyRun::record_count).sum();
        if specific_total == 0 {
            tracing::debug!(url, "no specific strategy produced records; trying generic tier");
            runs.extend(self.run_tier(Tier::Generic, &page).await);
        }

        let raw: Vec<RawDealerRecord> = runs
            .into_iter()
            .filter_map(|run| run.result.ok())
            .flatten()
            .map(RawDealerRecord::trimmed)
            .collect();
        let total = raw.len();
        let valid: Vec<RawDealerRecord> = raw
            .into_iter()
            .filter(|record| validate_record(record).is_ok())
            .collect();
        let unique = dedupe_raw_records(valid);

        tracing::info!(url, raw = total, kept = unique.len(), "page extraction complete");
        unique
    }

    /// Canonical records for one page, tagged with `dealer_group`.
    pub async fn extract_all(
        &self,
        html: &str,
        url: &str,
        dealer_group: &str,
    ) -> Vec<CanonicalDealerRecord> {
        normalize_records(self.extract_raw(html, url).await, dealer_group).records
    }
}
