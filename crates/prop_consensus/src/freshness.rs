//! Sync status from recency and bookmaker coverage.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Synced,
    Partial,
    Outdated,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FreshnessPolicy {
    pub staleness_threshold: Duration,
    pub synced_coverage: f64,
    pub partial_coverage: f64,
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        Self {
            staleness_threshold: Duration::minutes(5),
            synced_coverage: 0.8,
            partial_coverage: 0.5,
        }
    }
}

impl FreshnessPolicy {
    /// Recomputed from scratch on every cycle; nothing carries over.
    pub fn classify(
        &self,
        last_sync: DateTime<Utc>,
        now: DateTime<Utc>,
        bookmaker_count: usize,
        tracked_bookmakers: usize,
    ) -> SyncStatus {
        if now.signed_duration_since(last_sync) > self.staleness_threshold {
            return SyncStatus::Outdated;
        }
        if tracked_bookmakers == 0 {
            return SyncStatus::Outdated;
        }

        let tracked = tracked_bookmakers as f64;
        let count = bookmaker_count as f64;
        if count >= self.synced_coverage * tracked {
            SyncStatus::Synced
        } else if count >= self.partial_coverage * tracked {
            SyncStatus::Partial
        } else {
            SyncStatus::Outdated
        }
    }
}
