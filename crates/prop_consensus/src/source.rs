//! Seams to the upstream collaborators.

use crate::quote::{RawQuote, TargetMarket};
use anyhow::Result;
use async_trait::async_trait;

/// One upstream odds provider. Transport, retries and auth live behind it.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &str;

    /// Raw quotes for one target market. An error drops this source for the
    /// current cycle only.
    async fn fetch(&self, target: &TargetMarket) -> Result<Vec<RawQuote>>;
}

/// Supplies the markets to sync each cycle.
#[async_trait]
pub trait MarketTargets: Send + Sync {
    async fn targets(&self) -> Result<Vec<TargetMarket>>;
}

/// Fixed target list, for callers that compute targets up front.
pub struct StaticTargets(pub Vec<TargetMarket>);

#[async_trait]
impl MarketTargets for StaticTargets {
    async fn targets(&self) -> Result<Vec<TargetMarket>> {
        Ok(self.0.clone())
    }
}
