//! Fixed-interval driver for the sync engine.

use crate::engine::SyncEngine;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Completed cycles between heartbeat events.
pub const HEARTBEAT_EVERY: u64 = 10;

pub struct SyncScheduler;

impl SyncScheduler {
    /// Start ticking. The first cycle runs immediately.
    pub fn spawn(engine: Arc<SyncEngine>) -> SchedulerHandle {
        engine.set_scheduled(true);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(drive(engine, shutdown_rx));
        SchedulerHandle {
            shutdown: shutdown_tx,
            task,
        }
    }
}

pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop between ticks; a cycle still in flight is abandoned before its cache swap.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!("scheduler task ended abnormally: {e}");
        }
    }
}

async fn drive(engine: Arc<SyncEngine>, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = interval(engine.config().poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut completed: u64 = 0;

    info!(
        "sync scheduler started (interval {:?}, {} bookmakers tracked)",
        engine.config().poll_interval,
        engine.config().bookmakers.len()
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }
        if *shutdown.borrow() {
            break;
        }

        let mut cycle = engine.spawn_cycle();
        tokio::select! {
            joined = &mut cycle => {
                if let Err(e) = engine.settle(joined).await {
                    debug!("cycle ended without a swap: {e}");
                }
                completed += 1;
                if completed % HEARTBEAT_EVERY == 0 {
                    engine.log_heartbeat().await;
                }
            }
            _ = shutdown.changed() => {
                cycle.abort();
                // Wait for the abort so the cycle's lock and flag are released on return.
                let _ = cycle.await;
                break;
            }
        }
    }

    engine.set_scheduled(false);
    info!("sync scheduler stopped");
}
