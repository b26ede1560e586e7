/// prop-sync — Consensus engine
///
/// Collects player-prop quotes from several bookmakers, pairs over/under
/// sides per bookmaker, reduces them to one consensus line and price per
/// market, and keeps the result fresh on a fixed interval.
///
///   quotes → decode → pair → aggregate → classify → cache swap

pub mod aggregate;
pub mod bookmakers;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod freshness;
pub mod market_key;
pub mod odds;
pub mod pairing;
pub mod quote;
pub mod scheduler;
pub mod source;
pub mod state;

pub use aggregate::{Confidence, ConsensusAggregator, ConsensusMarket, ConsensusSummary};
pub use cache::ConsensusCache;
pub use config::SyncConfig;
pub use engine::{CycleReport, SyncEngine};
pub use error::{DecodeError, SyncError, SyncResult};
pub use freshness::{FreshnessPolicy, SyncStatus};
pub use market_key::{MarketKey, OddId, Side};
pub use odds::AmericanOdds;
pub use pairing::PairedLeg;
pub use quote::{Quote, RawPrice, RawQuote, TargetMarket};
pub use scheduler::{SchedulerHandle, SyncScheduler};
pub use source::{MarketTargets, QuoteSource, StaticTargets};
pub use state::SyncState;
