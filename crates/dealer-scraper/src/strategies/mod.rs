//! Extraction strategies and the registry that orders them.
//!
//! A strategy recognises one HTML/JS shape. `can_handle` is a cheap,
//! side-effect-free probe; `extract` may assume the probe passed. A card
//! that fails to parse is skipped without affecting the rest of the page.

mod action_links;
mod agile_store_locator;
mod autocanada;
mod card_layouts;
mod content_blocks;
mod dealer_dot_com;
mod group1;
mod heading_blocks;
mod javascript;
mod jsonld;
mod learned_rule;
mod lithia;
mod overfuel;

use std::sync::Arc;

use async_trait::async_trait;
use dealer_core::RawDealerRecord;

use crate::error::ExtractionError;
use crate::rules::RuleStore;

pub use action_links::ActionLinksStrategy;
pub use agile_store_locator::AgileStoreLocatorStrategy;
pub use autocanada::AutoCanadaStrategy;
pub use card_layouts::CardLayoutsStrategy;
pub use content_blocks::ContentBlocksStrategy;
pub use dealer_dot_com::DealerDotComStrategy;
pub use group1::Group1Strategy;
pub use heading_blocks::HeadingBlocksStrategy;
pub use javascript::JavaScriptArrayStrategy;
pub use jsonld::JsonLdStrategy;
pub use learned_rule::LearnedRuleStrategy;
pub use lithia::LithiaStrategy;
pub use overfuel::OverfuelStrategy;

/// Which pass of the coordinator a strategy belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    /// Tied to a known platform or structured-data shape.
    Specific,
    /// Heuristic; only consulted when every specific strategy came up empty.
    Generic,
}

/// The page a strategy is asked to read.
#[derive(Debug, Clone, Copy)]
pub struct PageInput<'a> {
    pub html: &'a str,
    pub url: &'a str,
}

impl<'a> PageInput<'a> {
    #[must_use]
    pub fn new(html: &'a str, url: &'a str) -> Self {
        Self { html, url }
    }
}

#[async_trait]
pub trait Strategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn tier(&self) -> Tier;

    fn can_handle(&self, page: &PageInput<'_>) -> bool;

    async fn extract(
        &self,
        page: &PageInput<'_>,
    ) -> Result<Vec<RawDealerRecord>, ExtractionError>;
}

/// Ordered set of strategies, built once and shared by reference.
#[derive(Default)]
pub struct StrategyRegistry {
    strategies: Vec<Box<dyn Strategy>>,
}

impl StrategyRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a strategy; registration order is run order within a tier.
    #[must_use]
    pub fn with(mut self, strategy: impl Strategy + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    pub fn register(&mut self, strategy: Box<dyn Strategy>) {
        self.strategies.push(strategy);
    }

    /// Strategies of one tier, in registration order.
    pub fn tier(&self, tier: Tier) -> impl Iterator<Item = &dyn Strategy> {
        self.strategies
            .iter()
            .map(AsRef::as_ref)
            .filter(move |s| s.tier() == tier)
    }

    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("strategies", &self.names())
            .finish()
    }
}

/// The full production strategy set in run order.
///
/// `rules` backs the learned-rule strategy; `http` is used by strategies
/// that make follow-up requests (Agile Store Locator).
#[must_use]
pub fn default_registry(
    rules: Arc<RuleStore>,
    http: reqwest::Client,
    user_agent: &str,
) -> StrategyRegistry {
    StrategyRegistry::new()
        .with(LithiaStrategy)
        .with(Group1Strategy)
        .with(AutoCanadaStrategy)
        .with(DealerDotComStrategy)
        .with(ContentBlocksStrategy)
        .with(OverfuelStrategy)
        .with(LearnedRuleStrategy::new(rules))
        .with(JsonLdStrategy)
        .with(JavaScriptArrayStrategy)
        .with(AgileStoreLocatorStrategy::new(http, user_agent))
        .with(CardLayoutsStrategy)
        .with(ActionLinksStrategy)
        .with(HeadingBlocksStrategy)
}
