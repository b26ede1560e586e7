use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use prop_consensus::{
    QuoteSource, RawPrice, RawQuote, StaticTargets, SyncConfig, SyncEngine, SyncScheduler,
    TargetMarket,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct CountingSource {
    calls: AtomicUsize,
}

/// Answers the first fetch, then hangs on every later one.
#[derive(Default)]
struct StallingSource {
    calls: AtomicUsize,
    stalled: AtomicBool,
}

fn jokic(side: &str, price: &str) -> RawQuote {
    RawQuote::ByBookmaker {
        odd_id: format!("rebounds-NIKOLA_JOKIC_1_NBA-game-ou-{side}"),
        bookmaker: "fanduel".into(),
        available: true,
        line: Some(12.5),
        price: RawPrice::Text(price.into()),
        observed_at: Utc::now().to_rfc3339(),
    }
}

#[async_trait]
impl QuoteSource for StallingSource {
    fn name(&self) -> &str {
        "stalling"
    }

    async fn fetch(&self, _target: &TargetMarket) -> Result<Vec<RawQuote>> {
        if self.calls.fetch_add(1, Ordering::SeqCst) > 0 {
            self.stalled.store(true, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(5)).await;
            return Ok(vec![jokic("over", "-140"), jokic("under", "+120")]);
        }
        Ok(vec![jokic("over", "-105"), jokic("under", "-115")])
    }
}

#[async_trait]
impl QuoteSource for CountingSource {
    fn name(&self) -> &str {
        "counting"
    }

    async fn fetch(&self, _target: &TargetMarket) -> Result<Vec<RawQuote>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![
            RawQuote::ByBookmaker {
                odd_id: "rebounds-NIKOLA_JOKIC_1_NBA-game-ou-over".into(),
                bookmaker: "fanduel".into(),
                available: true,
                line: Some(12.5),
                price: RawPrice::Text("-105".into()),
                observed_at: Utc::now().to_rfc3339(),
            },
            RawQuote::ByBookmaker {
                odd_id: "rebounds-NIKOLA_JOKIC_1_NBA-game-ou-under".into(),
                bookmaker: "fanduel".into(),
                available: true,
                line: Some(12.5),
                price: RawPrice::Text("-115".into()),
                observed_at: Utc::now().to_rfc3339(),
            },
        ])
    }
}

fn engine(dir: &std::path::Path, source: Arc<dyn QuoteSource>) -> Arc<SyncEngine> {
    let cfg = SyncConfig {
        poll_interval: Duration::from_millis(50),
        bookmakers: vec!["fanduel".into()],
        log_dir: dir.to_path_buf(),
        ..SyncConfig::default()
    };
    let target = TargetMarket {
        sport: "nba".into(),
        game_id: "den-lal".into(),
        game_start: Utc::now() + ChronoDuration::hours(3),
        odd_ids: None,
        ..TargetMarket::default()
    };
    Arc::new(SyncEngine::new(
        cfg,
        vec![source],
        Arc::new(StaticTargets(vec![target])),
    ))
}

#[tokio::test]
async fn test_scheduler_ticks_until_stopped() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(CountingSource {
        calls: AtomicUsize::new(0),
    });
    let engine = engine(dir.path(), source.clone());

    let handle = SyncScheduler::spawn(engine.clone());
    assert!(engine.is_running());
    tokio::time::sleep(Duration::from_millis(180)).await;
    handle.stop().await;

    let state = engine.get_sync_state().await;
    assert!(state.cycles_run >= 2, "ran {} cycles", state.cycles_run);
    assert_eq!(state.total_markets, 1);
    assert_eq!(state.synced, 1);

    let calls = source.calls.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(source.calls.load(Ordering::SeqCst), calls);
    assert!(!engine.is_running());
    assert!(!engine.cycle_in_flight());

    let m = engine
        .get_consensus("den-lal:rebounds-NIKOLA_JOKIC_1_NBA-game")
        .await
        .unwrap();
    assert_eq!(m.prop_type, "Rebounds");
    assert_eq!(m.consensus.over_odds, -105);
}

#[tokio::test]
async fn test_stop_mid_cycle_keeps_last_completed_cache() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(StallingSource::default());
    let engine = engine(dir.path(), source.clone());
    let handle = SyncScheduler::spawn(engine.clone());

    // first cycle completes, second hangs inside the fetch
    tokio::time::timeout(Duration::from_secs(2), async {
        while !source.stalled.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    assert!(engine.cycle_in_flight());

    let id = "den-lal:rebounds-NIKOLA_JOKIC_1_NBA-game";
    let before = engine.get_consensus(id).await.unwrap();
    let state_before = engine.get_sync_state().await;
    assert_eq!(state_before.cycles_run, 1);

    tokio::time::timeout(Duration::from_secs(1), handle.stop())
        .await
        .unwrap();

    assert!(!engine.cycle_in_flight());
    assert!(!engine.is_running());
    let after = engine.get_consensus(id).await.unwrap();
    assert!(Arc::ptr_eq(&before, &after));
    assert_eq!(after.consensus.over_odds, -105);

    let state_after = engine.get_sync_state().await;
    assert_eq!(state_after.cycles_run, 1);
    assert_eq!(state_after.total_markets, state_before.total_markets);
    assert_eq!(state_after.last_cycle_at, state_before.last_cycle_at);
    assert!(state_after.last_error.is_none());
}
