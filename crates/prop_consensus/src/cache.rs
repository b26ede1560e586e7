//! Process-lifetime store of the latest consensus per market id.

use crate::aggregate::ConsensusMarket;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Entries are whole `Arc`s: a writer swaps the pointer, readers holding an
/// older `Arc` keep a consistent value.
#[derive(Clone, Default)]
pub struct ConsensusCache {
    markets: Arc<RwLock<HashMap<String, Arc<ConsensusMarket>>>>,
}

impl ConsensusCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, market_id: &str) -> Option<Arc<ConsensusMarket>> {
        self.markets.read().await.get(market_id).cloned()
    }

    /// Like `get`, but only when the entry synced within `max_age` of `now`.
    pub async fn get_fresh(
        &self,
        market_id: &str,
        max_age: Duration,
        now: DateTime<Utc>,
    ) -> Option<Arc<ConsensusMarket>> {
        self.get(market_id)
            .await
            .filter(|m| now.signed_duration_since(m.last_sync) <= max_age)
    }

    pub async fn list_by_sport(&self, sport: &str) -> Vec<Arc<ConsensusMarket>> {
        let sport = sport.trim().to_ascii_lowercase();
        self.filtered(|m| m.sport == sport).await
    }

    /// Case- and accent-insensitive substring match on the display name.
    pub async fn list_by_player(&self, name: &str) -> Vec<Arc<ConsensusMarket>> {
        let needle = fold_name(name);
        if needle.is_empty() {
            return Vec::new();
        }
        self.filtered(|m| {
            m.player_name
                .as_deref()
                .map_or(false, |p| fold_name(p).contains(&needle))
        })
        .await
    }

    pub async fn list_by_game(&self, game_id: &str) -> Vec<Arc<ConsensusMarket>> {
        self.filtered(|m| m.market.game_id.as_deref() == Some(game_id)).await
    }

    pub async fn all(&self) -> Vec<Arc<ConsensusMarket>> {
        self.filtered(|_| true).await
    }

    pub async fn len(&self) -> usize {
        self.markets.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.markets.read().await.is_empty()
    }

    /// Replace every given entry in one write section.
    pub async fn replace_all(&self, markets: Vec<ConsensusMarket>) {
        let mut map = self.markets.write().await;
        for market in markets {
            map.insert(market.market_id.clone(), Arc::new(market));
        }
    }

    /// Drop entries whose game started before `cutoff`. Returns how many went.
    pub async fn evict_started_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut map = self.markets.write().await;
        let before = map.len();
        map.retain(|_, m| m.game_start >= cutoff);
        before - map.len()
    }

    async fn filtered<F>(&self, keep: F) -> Vec<Arc<ConsensusMarket>>
    where
        F: Fn(&ConsensusMarket) -> bool,
    {
        let mut out: Vec<Arc<ConsensusMarket>> = self
            .markets
            .read()
            .await
            .values()
            .filter(|&m| keep(m))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.market_id.cmp(&b.market_id));
        out
    }
}

fn fold_name(raw: &str) -> String {
    raw.nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
