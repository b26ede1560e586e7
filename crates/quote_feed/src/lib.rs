/// prop-sync — Quote feeds
///
/// HTTP implementations of the engine's `QuoteSource` / `MarketTargets` seams:
///   A) SportsGameOdds v2 — odd-id keyed, per-bookmaker breakdown
///   B) The Odds API v4  — named outcomes ("LeBron James Over 25.5")
///   C) JSON file        — static target list, hot-reloaded

pub mod http;
pub mod odds_api;
pub mod sportsgameodds;
pub mod targets;

pub use odds_api::OddsApiSource;
pub use sportsgameodds::{SportsGameOddsSource, SportsGameOddsTargets};
pub use targets::JsonFileTargets;
