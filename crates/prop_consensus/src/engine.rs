//! One sync cycle: fetch, decode, pair, aggregate, classify, swap.
//!
//! Cycles are serialized by `cycle_lock`. The cache is written only by the
//! single `replace_all` at the end, so a cycle cancelled mid-way leaves the
//! cache as the last completed cycle wrote it.

use crate::aggregate::ConsensusMarket;
use crate::bookmakers;
use crate::cache::ConsensusCache;
use crate::config::SyncConfig;
use crate::error::{DecodeError, SyncError, SyncResult};
use crate::freshness::FreshnessPolicy;
use crate::market_key::MarketKey;
use crate::pairing::{self, PairedLeg};
use crate::quote::{self, Decoded, Quote, RawQuote, TargetMarket};
use crate::source::{MarketTargets, QuoteSource};
use crate::state::{LatencyWindow, StatusCounts, SyncState};
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use logger::{
    now_iso, CycleFailedEvent, EventLogger, SourceUnavailableEvent, SyncCycleEvent,
    SyncHeartbeatEvent,
};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, RwLock, Semaphore};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Counters for one completed cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub cycle: u64,
    pub targets: usize,
    pub fetches_ok: usize,
    pub fetches_failed: usize,
    pub quotes: usize,
    pub decode_errors: usize,
    pub markets_written: usize,
    pub insufficient: usize,
    pub evicted: usize,
    pub counts: StatusCounts,
    pub latency_ms: u64,
}

pub struct SyncEngine {
    config: SyncConfig,
    policy: FreshnessPolicy,
    cache: ConsensusCache,
    sources: Vec<Arc<dyn QuoteSource>>,
    targets: Arc<dyn MarketTargets>,
    events: EventLogger,
    state: RwLock<Arc<SyncState>>,
    latencies: Mutex<LatencyWindow>,
    cycle_lock: Mutex<()>,
    in_flight: AtomicBool,
    scheduled: AtomicBool,
    cycle_seq: AtomicU64,
}

/// Clears the in-flight flag however the cycle ends, unwinding included.
struct RunningFlag<'a>(&'a AtomicBool);

impl<'a> RunningFlag<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for RunningFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

struct Fetched<'t> {
    target: &'t TargetMarket,
    source: String,
    result: Result<Vec<RawQuote>, String>,
}

impl SyncEngine {
    pub fn new(
        config: SyncConfig,
        sources: Vec<Arc<dyn QuoteSource>>,
        targets: Arc<dyn MarketTargets>,
    ) -> Self {
        Self {
            policy: config.freshness_policy(),
            events: EventLogger::new(&config.log_dir),
            cache: ConsensusCache::new(),
            sources,
            targets,
            state: RwLock::new(Arc::new(SyncState::default())),
            latencies: Mutex::new(LatencyWindow::default()),
            cycle_lock: Mutex::new(()),
            in_flight: AtomicBool::new(false),
            scheduled: AtomicBool::new(false),
            cycle_seq: AtomicU64::new(0),
            config,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn cache(&self) -> &ConsensusCache {
        &self.cache
    }

    // ── Read side ────────────────────────────────────────────────────────────

    pub async fn get_consensus(&self, market_id: &str) -> Option<Arc<ConsensusMarket>> {
        self.cache.get(market_id).await
    }

    pub async fn list_by_sport(&self, sport: &str) -> Vec<Arc<ConsensusMarket>> {
        self.cache.list_by_sport(sport).await
    }

    pub async fn list_by_player(&self, name: &str) -> Vec<Arc<ConsensusMarket>> {
        self.cache.list_by_player(name).await
    }

    pub async fn list_by_game(&self, game_id: &str) -> Vec<Arc<ConsensusMarket>> {
        self.cache.list_by_game(game_id).await
    }

    pub async fn get_sync_state(&self) -> SyncState {
        self.state.read().await.as_ref().clone()
    }

    /// The periodic scheduler has been started and not yet stopped.
    pub fn is_running(&self) -> bool {
        self.scheduled.load(Ordering::SeqCst)
    }

    /// A cycle is executing right now, scheduled or forced.
    pub fn cycle_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub(crate) fn set_scheduled(&self, on: bool) {
        self.scheduled.store(on, Ordering::SeqCst);
    }

    // ── Write side ───────────────────────────────────────────────────────────

    /// Run one cycle now, queued behind any cycle already in flight.
    pub async fn force_sync(self: &Arc<Self>) -> SyncResult<CycleReport> {
        let joined = self.spawn_cycle().await;
        self.settle(joined).await
    }

    /// Cycle on its own task, so a panic in the merge stage ends only that cycle.
    pub fn spawn_cycle(self: &Arc<Self>) -> JoinHandle<SyncResult<CycleReport>> {
        let engine = Arc::clone(self);
        tokio::spawn(async move { engine.run_cycle().await })
    }

    /// Fold a joined cycle task into a result, recording a panic as a failed cycle.
    pub async fn settle(
        &self,
        joined: Result<SyncResult<CycleReport>, JoinError>,
    ) -> SyncResult<CycleReport> {
        match joined {
            Ok(result) => result,
            Err(join) => {
                let reason = if join.is_panic() {
                    "merge stage panicked".to_string()
                } else {
                    join.to_string()
                };
                let err = SyncError::CycleAborted(reason);
                let cycle = self.cycle_seq.load(Ordering::SeqCst);
                self.record_failure(cycle, &err).await;
                Err(err)
            }
        }
    }

    pub async fn run_cycle(&self) -> SyncResult<CycleReport> {
        let _serial = self.cycle_lock.lock().await;
        let _in_flight = RunningFlag::raise(&self.in_flight);
        let cycle = self.cycle_seq.fetch_add(1, Ordering::SeqCst) + 1;

        match self.execute(cycle, Utc::now(), Instant::now()).await {
            Ok(report) => Ok(report),
            Err(e) => {
                self.record_failure(cycle, &e).await;
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        cycle: u64,
        now: DateTime<Utc>,
        started: Instant,
    ) -> SyncResult<CycleReport> {
        let cutoff = now - self.config.eviction_window_chrono();
        let evicted = self.cache.evict_started_before(cutoff).await;
        if evicted > 0 {
            info!("cycle {cycle}: evicted {evicted} markets whose game started before {cutoff}");
        }

        let mut targets = self
            .targets
            .targets()
            .await
            .map_err(|e| SyncError::CycleAborted(format!("target list unavailable: {e:#}")))?;
        targets.retain(|t| t.game_start >= cutoff);

        // Fetch
        let mut batches: Vec<(&TargetMarket, Vec<RawQuote>)> = Vec::new();
        let mut fetches_failed = 0;
        for fetched in self.fetch_all(&targets).await {
            match fetched.result {
                Ok(raws) => batches.push((fetched.target, raws)),
                Err(reason) => {
                    fetches_failed += 1;
                    self.source_unavailable(&fetched.source, fetched.target, reason);
                }
            }
        }
        let fetches_ok = batches.len();

        // Decode
        let mut registry: HashMap<String, (MarketKey, &TargetMarket)> = HashMap::new();
        let mut quotes: Vec<Quote> = Vec::new();
        let mut decode_errors = 0;
        for (target, raws) in &batches {
            for raw in raws {
                if !self.config.tracks(&bookmakers::canonical_id(raw.bookmaker())) {
                    continue;
                }
                match quote::decode_raw(raw, target) {
                    Ok(decoded) => {
                        let key = decoded.market().clone();
                        registry.entry(key.market_id()).or_insert((key, *target));
                        if let Decoded::Open(q) = decoded {
                            quotes.push(q);
                        }
                    }
                    Err(DecodeError::NotPlayerProp(_)) => {}
                    Err(e) => {
                        decode_errors += 1;
                        debug!("skip quote from {}: {}", raw.bookmaker(), SyncError::from(e));
                    }
                }
            }
        }
        let quote_count = quotes.len();
        let active: BTreeSet<String> = quotes.iter().map(|q| q.bookmaker.clone()).collect();
        let tracked = if self.config.bookmakers.is_empty() {
            active.len()
        } else {
            self.config.bookmakers.len()
        };

        // Pair
        let mut by_market: HashMap<String, Vec<PairedLeg>> = HashMap::new();
        for leg in pairing::group(quotes) {
            by_market.entry(leg.market.market_id()).or_default().push(leg);
        }

        // Aggregate + classify
        let mut written: Vec<ConsensusMarket> = Vec::with_capacity(registry.len());
        let mut fresh_ids: HashSet<String> = HashSet::new();
        let mut insufficient = 0;
        for (market_id, (key, target)) in registry {
            let mut legs = by_market.remove(&market_id).unwrap_or_default();
            legs.sort_by(|a, b| a.bookmaker.cmp(&b.bookmaker));
            if legs.is_empty() {
                insufficient += 1;
                debug!("{}", SyncError::InsufficientData { market_id: market_id.clone() });
                if let Some(prev) = self.cache.get(&market_id).await {
                    if !prev.is_insufficient() {
                        continue;
                    }
                }
            }
            let built = ConsensusMarket::build(key, &target.sport, target.game_start, legs, now);
            let status = self
                .policy
                .classify(built.last_sync, now, built.bookmaker_count(), tracked);
            fresh_ids.insert(market_id);
            written.push(ConsensusMarket {
                sync_status: status,
                ..built
            });
        }
        let markets_written = written.len();

        // Every other cached market is reclassified against this cycle's clock.
        let carried: Vec<ConsensusMarket> = self
            .cache
            .all()
            .await
            .into_iter()
            .filter(|m| !fresh_ids.contains(&m.market_id))
            .map(|m| {
                let status = self
                    .policy
                    .classify(m.last_sync, now, m.bookmaker_count(), tracked);
                m.with_status(status)
            })
            .collect();

        written.extend(carried);
        self.cache.replace_all(written).await;

        let counts = StatusCounts::tally(&self.cache.all().await);
        let latency_ms = started.elapsed().as_millis() as u64;
        let mean_latency = self.latencies.lock().await.push(latency_ms);
        {
            let mut state = self.state.write().await;
            let next = state.after_cycle(counts, active.into_iter().collect(), mean_latency, now);
            *state = Arc::new(next);
        }

        let report = CycleReport {
            cycle,
            targets: targets.len(),
            fetches_ok,
            fetches_failed,
            quotes: quote_count,
            decode_errors,
            markets_written,
            insufficient,
            evicted,
            counts,
            latency_ms,
        };
        self.log_cycle(&report);
        Ok(report)
    }

    /// Every (target, source) pair, bounded by `max_in_flight` and `fetch_timeout`.
    async fn fetch_all<'t>(&self, targets: &'t [TargetMarket]) -> Vec<Fetched<'t>> {
        let permits = Semaphore::new(self.config.max_in_flight.max(1));
        let permits = &permits;
        let sources = &self.sources;
        let fetch_timeout = self.config.fetch_timeout;
        let jobs = targets
            .iter()
            .flat_map(move |target| sources.iter().map(move |source| (target, source)));

        join_all(jobs.map(move |(target, source)| async move {
            let _permit = permits.acquire().await.ok();
            let result = match timeout(fetch_timeout, source.fetch(target)).await {
                Ok(Ok(raws)) => Ok(raws),
                Ok(Err(e)) => Err(format!("{e:#}")),
                Err(_) => Err("timeout".to_string()),
            };
            Fetched {
                target,
                source: source.name().to_string(),
                result,
            }
        }))
        .await
    }

    fn source_unavailable(&self, source: &str, target: &TargetMarket, reason: String) {
        warn!(
            "{}",
            SyncError::SourceUnavailable {
                source_name: source.to_string(),
                target: target.label(),
                reason: reason.clone(),
            }
        );
        let ev = SourceUnavailableEvent {
            ts: now_iso(),
            event: "SOURCE_UNAVAILABLE",
            source: source.to_string(),
            target: target.label(),
            reason,
        };
        if let Err(e) = self.events.log(&ev) {
            debug!("event log write failed: {e}");
        }
    }

    async fn record_failure(&self, cycle: u64, err: &SyncError) {
        error!("cycle {cycle} failed: {err}");
        {
            let mut state = self.state.write().await;
            let next = state.after_failure(err.to_string(), Utc::now());
            *state = Arc::new(next);
        }
        let ev = CycleFailedEvent {
            ts: now_iso(),
            event: "SYNC_CYCLE_FAILED",
            cycle,
            reason: err.to_string(),
        };
        if let Err(e) = self.events.log(&ev) {
            debug!("event log write failed: {e}");
        }
    }

    fn log_cycle(&self, r: &CycleReport) {
        info!(
            "cycle {}: targets={} fetches={}/{} quotes={} written={} insufficient={} synced={} partial={} outdated={} ({} ms)",
            r.cycle,
            r.targets,
            r.fetches_ok,
            r.fetches_ok + r.fetches_failed,
            r.quotes,
            r.markets_written,
            r.insufficient,
            r.counts.synced,
            r.counts.partial,
            r.counts.outdated,
            r.latency_ms,
        );
        let ev = SyncCycleEvent {
            ts: now_iso(),
            event: "SYNC_CYCLE",
            cycle: r.cycle,
            targets: r.targets,
            fetches_ok: r.fetches_ok,
            fetches_failed: r.fetches_failed,
            quotes: r.quotes,
            decode_errors: r.decode_errors,
            markets_written: r.markets_written,
            insufficient: r.insufficient,
            evicted: r.evicted,
            synced: r.counts.synced,
            partial: r.counts.partial,
            outdated: r.counts.outdated,
            latency_ms: r.latency_ms,
        };
        if let Err(e) = self.events.log(&ev) {
            debug!("event log write failed: {e}");
        }
    }

    /// Periodic summary line for the JSONL log.
    pub async fn log_heartbeat(&self) {
        let state = self.get_sync_state().await;
        let hb = SyncHeartbeatEvent {
            ts: now_iso(),
            event: "SYNC_HEARTBEAT",
            cached_markets: state.total_markets,
            synced: state.synced,
            partial: state.partial,
            outdated: state.outdated,
            active_bookmakers: state.active_bookmakers.clone(),
            mean_latency_ms: state.mean_cycle_latency_ms,
        };
        if let Err(e) = self.events.log(&hb) {
            debug!("event log write failed: {e}");
        }
        info!(
            "HB: markets={}, synced={}, partial={}, outdated={}, books={}",
            state.total_markets,
            state.synced,
            state.partial,
            state.outdated,
            state.active_bookmakers.len()
        );
    }
}
