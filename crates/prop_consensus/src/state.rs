//! Engine-wide snapshot, replaced wholesale after every cycle.

use crate::aggregate::ConsensusMarket;
use crate::freshness::SyncStatus;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;

/// Cycles kept for the mean latency figure.
pub const LATENCY_WINDOW: usize = 20;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncState {
    pub total_markets: usize,
    pub synced: usize,
    pub partial: usize,
    pub outdated: usize,
    pub insufficient: usize,
    pub active_bookmakers: Vec<String>,
    pub mean_cycle_latency_ms: u64,
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub cycles_run: u64,
    pub last_error: Option<String>,
}

/// Status counts over the cache contents after a swap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub total: usize,
    pub synced: usize,
    pub partial: usize,
    pub outdated: usize,
    pub insufficient: usize,
}

impl StatusCounts {
    pub fn tally(markets: &[Arc<ConsensusMarket>]) -> Self {
        let mut counts = StatusCounts {
            total: markets.len(),
            ..Default::default()
        };
        for m in markets {
            match m.sync_status {
                SyncStatus::Synced => counts.synced += 1,
                SyncStatus::Partial => counts.partial += 1,
                SyncStatus::Outdated => counts.outdated += 1,
            }
            if m.is_insufficient() {
                counts.insufficient += 1;
            }
        }
        counts
    }
}

/// Rolling window of recent cycle latencies.
#[derive(Debug, Default)]
pub struct LatencyWindow {
    samples: VecDeque<u64>,
}

impl LatencyWindow {
    pub fn push(&mut self, ms: u64) -> u64 {
        if self.samples.len() == LATENCY_WINDOW {
            self.samples.pop_front();
        }
        self.samples.push_back(ms);
        self.mean()
    }

    pub fn mean(&self) -> u64 {
        if self.samples.is_empty() {
            return 0;
        }
        self.samples.iter().sum::<u64>() / self.samples.len() as u64
    }
}

impl SyncState {
    pub fn after_cycle(
        &self,
        counts: StatusCounts,
        active_bookmakers: Vec<String>,
        mean_cycle_latency_ms: u64,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            total_markets: counts.total,
            synced: counts.synced,
            partial: counts.partial,
            outdated: counts.outdated,
            insufficient: counts.insufficient,
            active_bookmakers,
            mean_cycle_latency_ms,
            last_cycle_at: Some(at),
            cycles_run: self.cycles_run + 1,
            last_error: None,
        }
    }

    /// Counts stay as they were; the cache was not touched.
    pub fn after_failure(&self, reason: String, at: DateTime<Utc>) -> Self {
        Self {
            last_cycle_at: Some(at),
            cycles_run: self.cycles_run + 1,
            last_error: Some(reason),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latency_window_drops_oldest_samples() {
        let mut w = LatencyWindow::default();
        assert_eq!(w.mean(), 0);
        for _ in 0..LATENCY_WINDOW {
            w.push(100);
        }
        assert_eq!(w.mean(), 100);
        for _ in 0..LATENCY_WINDOW {
            w.push(10);
        }
        assert_eq!(w.mean(), 10);
    }

    #[test]
    fn failure_keeps_counts_and_records_error() {
        let ok = SyncState::default().after_cycle(
            StatusCounts {
                total: 4,
                synced: 3,
                partial: 1,
                outdated: 0,
                insufficient: 0,
            },
            vec!["fanduel".into()],
            40,
            Utc::now(),
        );
        let failed = ok.after_failure("boom".into(), Utc::now());
        assert_eq!(failed.total_markets, 4);
        assert_eq!(failed.cycles_run, 2);
        assert_eq!(failed.last_error.as_deref(), Some("boom"));
        assert_eq!(failed.active_bookmakers, vec!["fanduel".to_string()]);
    }
}
