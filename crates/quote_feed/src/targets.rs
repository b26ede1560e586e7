use anyhow::{Context, Result};
use async_trait::async_trait;
use prop_consensus::{MarketTargets, TargetMarket};
use std::path::PathBuf;

/// Target list kept in a JSON file, re-read every cycle so edits apply live.
///
/// `[{"sport":"nba","game_id":"EVT123","game_start":"2026-10-17T00:00:00Z",
///   "provider_ids":{"sportsgameodds":"EVT123","the-odds-api":"e912.."}}]`
pub struct JsonFileTargets {
    path: PathBuf,
}

impl JsonFileTargets {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl MarketTargets for JsonFileTargets {
    async fn targets(&self) -> Result<Vec<TargetMarket>> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("read targets file {}", self.path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("parse targets file {}", self.path.display()))
    }
}
