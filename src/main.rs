/// prop-sync — Player-prop consensus sync
///
/// What it does:
///   1. Every 30s pulls player-prop prices from every configured source
///   2. Pairs over/under per bookmaker, computes consensus line + prices
///   3. Marks each market synced / partial / outdated by recency and coverage
///   4. Serves the cache over read-only HTTP (GET /health, /state, /consensus/..)
///
/// Run:
///   cargo run --bin prop-sync

mod state_http;

use anyhow::{bail, Context, Result};
use dotenv::dotenv;
use prop_consensus::{
    MarketTargets, QuoteSource, SyncConfig, SyncEngine, SyncScheduler,
};
use quote_feed::{JsonFileTargets, OddsApiSource, SportsGameOddsSource, SportsGameOddsTargets};
use std::env;
use std::fs::File;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    info!("=== prop-sync — player-prop consensus ===");

    // Single instance lock
    let lock_file_path = env::temp_dir().join("prop_sync.lock");
    let lock_file = match File::create(&lock_file_path) {
        Ok(f) => f,
        Err(e) => {
            warn!("Failed to create lock file at {:?}: {}", lock_file_path, e);
            return Ok(());
        }
    };

    let mut lock = fd_lock::RwLock::new(lock_file);
    let _write_guard = match lock.try_write() {
        Ok(guard) => {
            info!("Acquired single-instance lock.");
            guard
        }
        Err(_) => {
            warn!("Another instance of prop-sync is already running! Exiting.");
            return Ok(());
        }
    };

    let config = SyncConfig::from_env();
    info!(
        "interval={:?} bookmakers=[{}] staleness={:?} timeout={:?} in_flight={} logs={}",
        config.poll_interval,
        config.bookmakers.join(","),
        config.staleness_threshold,
        config.fetch_timeout,
        config.max_in_flight,
        config.log_dir.display(),
    );

    let sports: Vec<String> = env::var("PROP_SYNC_SPORTS")
        .unwrap_or_else(|_| "nba,nfl,mlb,nhl".to_string())
        .split(',')
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty())
        .collect();

    let sgo_key = env::var("SPORTSGAMEODDS_API_KEY").ok().filter(|k| !k.is_empty());
    let odds_api_key = env::var("ODDS_API_KEY").ok().filter(|k| !k.is_empty());

    let mut sources: Vec<Arc<dyn QuoteSource>> = Vec::new();
    if let Some(key) = &sgo_key {
        sources.push(Arc::new(SportsGameOddsSource::new(key.clone(), config.fetch_timeout)?));
        info!("source: sportsgameodds");
    }
    if let Some(key) = &odds_api_key {
        sources.push(Arc::new(OddsApiSource::new(
            key.clone(),
            config.bookmakers.clone(),
            config.fetch_timeout,
        )?));
        info!("source: the-odds-api");
    }
    if sources.is_empty() {
        bail!("no quote source configured (set SPORTSGAMEODDS_API_KEY and/or ODDS_API_KEY)");
    }

    let targets: Arc<dyn MarketTargets> = match env::var("PROP_SYNC_TARGETS_FILE") {
        Ok(path) => {
            info!("targets: file {path}");
            Arc::new(JsonFileTargets::new(path))
        }
        Err(_) => match &sgo_key {
            Some(key) => {
                info!("targets: SportsGameOdds discovery for [{}]", sports.join(","));
                let discovery = SportsGameOddsSource::new(key.clone(), config.fetch_timeout)?;
                Arc::new(SportsGameOddsTargets::new(discovery, sports))
            }
            None => bail!("PROP_SYNC_TARGETS_FILE is required without SPORTSGAMEODDS_API_KEY"),
        },
    };

    let engine = Arc::new(SyncEngine::new(config, sources, targets));

    // Read-only HTTP (optional)
    let http_bind = env::var("PROP_SYNC_HTTP_BIND").unwrap_or_else(|_| "127.0.0.1:8090".to_string());
    if !http_bind.trim().is_empty() {
        let http_addr: SocketAddr = http_bind.parse().context("Invalid PROP_SYNC_HTTP_BIND")?;
        let engine = engine.clone();
        tokio::spawn(async move {
            if let Err(e) = state_http::start_http_server(engine, http_addr).await {
                warn!("http server stopped: {e}");
            }
        });
    }

    let scheduler = SyncScheduler::spawn(engine.clone());

    tokio::signal::ctrl_c().await.context("ctrl_c handler")?;
    info!("shutdown requested");
    scheduler.stop().await;

    let state = engine.get_sync_state().await;
    info!(
        "final: markets={} synced={} partial={} outdated={} cycles={}",
        state.total_markets, state.synced, state.partial, state.outdated, state.cycles_run
    );
    Ok(())
}
