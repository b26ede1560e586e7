//! Sync engine configuration. Every option is named and has a default.

use crate::bookmakers::canonical_id;
use crate::freshness::FreshnessPolicy;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BOOKMAKERS: &[&str] = &[
    "fanduel",
    "draftkings",
    "betmgm",
    "caesars",
    "pointsbet",
    "espnbet",
    "hardrock",
];

#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// Time between cycle starts.
    pub poll_interval: Duration,
    /// Bookmakers that count toward coverage. Empty = accept every bookmaker seen.
    pub bookmakers: Vec<String>,
    pub staleness_threshold: Duration,
    pub synced_coverage: f64,
    pub partial_coverage: f64,
    /// Per (source, target) fetch.
    pub fetch_timeout: Duration,
    pub max_in_flight: usize,
    /// Markets whose game started longer ago than this are evicted.
    pub eviction_window: Duration,
    /// JSONL cycle events.
    pub log_dir: PathBuf,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            bookmakers: DEFAULT_BOOKMAKERS.iter().map(|b| b.to_string()).collect(),
            staleness_threshold: Duration::from_secs(5 * 60),
            synced_coverage: 0.8,
            partial_coverage: 0.5,
            fetch_timeout: Duration::from_secs(12),
            max_in_flight: 8,
            eviction_window: Duration::from_secs(24 * 60 * 60),
            log_dir: PathBuf::from("logs"),
        }
    }
}

impl SyncConfig {
    /// Defaults overridden by `PROP_SYNC_*` environment variables.
    pub fn from_env() -> Self {
        let d = Self::default();

        let bookmakers = env::var("PROP_SYNC_BOOKMAKERS")
            .ok()
            .map(|v| parse_bookmakers(&v))
            .unwrap_or(d.bookmakers);

        Self {
            poll_interval: env_millis("PROP_SYNC_INTERVAL_MS").unwrap_or(d.poll_interval),
            bookmakers,
            staleness_threshold: env_millis("PROP_SYNC_STALENESS_MS")
                .unwrap_or(d.staleness_threshold),
            synced_coverage: env_fraction("PROP_SYNC_SYNCED_COVERAGE")
                .unwrap_or(d.synced_coverage),
            partial_coverage: env_fraction("PROP_SYNC_PARTIAL_COVERAGE")
                .unwrap_or(d.partial_coverage),
            fetch_timeout: env_millis("PROP_SYNC_FETCH_TIMEOUT_MS").unwrap_or(d.fetch_timeout),
            max_in_flight: env::var("PROP_SYNC_MAX_IN_FLIGHT")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .filter(|n| *n > 0)
                .unwrap_or(d.max_in_flight),
            eviction_window: env_millis("PROP_SYNC_EVICTION_MS").unwrap_or(d.eviction_window),
            log_dir: env::var("PROP_SYNC_LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or(d.log_dir),
        }
    }

    pub fn freshness_policy(&self) -> FreshnessPolicy {
        FreshnessPolicy {
            staleness_threshold: chrono::Duration::from_std(self.staleness_threshold)
                .unwrap_or_else(|_| chrono::Duration::minutes(5)),
            synced_coverage: self.synced_coverage,
            partial_coverage: self.partial_coverage,
        }
    }

    pub fn eviction_window_chrono(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.eviction_window)
            .unwrap_or_else(|_| chrono::Duration::hours(24))
    }

    /// Expects a canonical id; see `bookmakers::canonical_id`.
    pub fn tracks(&self, bookmaker: &str) -> bool {
        self.bookmakers.is_empty() || self.bookmakers.iter().any(|b| b == bookmaker)
    }
}

pub fn parse_bookmakers(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(canonical_id)
        .filter(|b| !b.is_empty())
        .collect()
}

fn env_millis(key: &str) -> Option<Duration> {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
}

fn env_fraction(key: &str) -> Option<f64> {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|f| (0.0..=1.0).contains(f))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = SyncConfig::default();
        assert_eq!(cfg.poll_interval, Duration::from_secs(30));
        assert_eq!(cfg.bookmakers.len(), 7);
        assert_eq!(cfg.max_in_flight, 8);
        let policy = cfg.freshness_policy();
        assert_eq!(policy.staleness_threshold, chrono::Duration::minutes(5));
        assert_eq!(policy.synced_coverage, 0.8);
    }

    #[test]
    fn bookmaker_list_parsing_and_tracking() {
        assert_eq!(
            parse_bookmakers(" FanDuel, ,draftkings "),
            vec!["fanduel".to_string(), "draftkings".to_string()]
        );
        assert_eq!(
            parse_bookmakers("williamhill_us,hardrockbet"),
            vec!["caesars".to_string(), "hardrock".to_string()]
        );
        let mut cfg = SyncConfig::default();
        assert!(cfg.tracks("fanduel"));
        assert!(!cfg.tracks("bovada"));
        cfg.bookmakers.clear();
        assert!(cfg.tracks("bovada"));
    }
}
