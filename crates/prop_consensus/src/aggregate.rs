//! Consensus line and prices across bookmakers for one market.

use crate::freshness::SyncStatus;
use crate::market_key::MarketKey;
use crate::pairing::PairedLeg;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const HIGH_SPREAD: i64 = 10;
const MEDIUM_SPREAD: i64 = 20;

/// How tightly a bookmaker's over/under prices bracket a fair line.
///
/// Thresholds on the raw price spread, not a no-vig probability model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn from_spread(over: i32, under: i32) -> Self {
        let spread = (over as i64 - under as i64).abs();
        if spread <= HIGH_SPREAD {
            Confidence::High
        } else if spread <= MEDIUM_SPREAD {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }

    pub fn weight(&self) -> u32 {
        match self {
            Confidence::High => 3,
            Confidence::Medium => 2,
            Confidence::Low => 1,
        }
    }
}

/// Numbers produced by one aggregation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusSummary {
    pub line: f64,
    pub over_odds: i32,
    pub under_odds: i32,
    /// No leg carried a line; `line` is a placeholder zero.
    pub no_line: bool,
    /// No legs at all; every number is a placeholder zero.
    pub insufficient_data: bool,
    /// At least one contributing price came from the normalizer fallback.
    pub has_default_odds: bool,
}

pub struct ConsensusAggregator;

impl ConsensusAggregator {
    pub fn aggregate(legs: &[PairedLeg]) -> ConsensusSummary {
        if legs.is_empty() {
            return ConsensusSummary {
                line: 0.0,
                over_odds: 0,
                under_odds: 0,
                no_line: true,
                insufficient_data: true,
                has_default_odds: false,
            };
        }

        let mut weighted_sum = 0.0;
        let mut weight_total = 0u32;
        for leg in legs {
            if let Some(line) = leg.line() {
                let w = leg.confidence().weight();
                weighted_sum += line * w as f64;
                weight_total += w;
            }
        }
        let (line, no_line) = if weight_total > 0 {
            (weighted_sum / weight_total as f64, false)
        } else {
            (0.0, true)
        };

        let overs: Vec<i32> = legs.iter().filter_map(|l| l.over_price()).map(|o| o.value).collect();
        let unders: Vec<i32> = legs.iter().filter_map(|l| l.under_price()).map(|o| o.value).collect();

        let has_default_odds = legs.iter().any(|l| {
            l.over_price().map_or(false, |o| o.is_default)
                || l.under_price().map_or(false, |u| u.is_default)
        });

        ConsensusSummary {
            line,
            over_odds: rounded_mean(&overs),
            under_odds: rounded_mean(&unders),
            no_line,
            insufficient_data: false,
            has_default_odds,
        }
    }
}

fn rounded_mean(values: &[i32]) -> i32 {
    if values.is_empty() {
        return 0;
    }
    let sum: i64 = values.iter().map(|&v| v as i64).sum();
    (sum as f64 / values.len() as f64).round() as i32
}

/// Latest consensus for one market, as held by the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusMarket {
    pub market_id: String,
    pub market: MarketKey,
    pub sport: String,
    pub game_start: DateTime<Utc>,
    pub player_name: Option<String>,
    pub prop_type: String,
    pub legs: Vec<PairedLeg>,
    pub consensus: ConsensusSummary,
    pub last_sync: DateTime<Utc>,
    pub sync_status: SyncStatus,
}

impl ConsensusMarket {
    pub fn build(
        market: MarketKey,
        sport: &str,
        game_start: DateTime<Utc>,
        legs: Vec<PairedLeg>,
        synced_at: DateTime<Utc>,
    ) -> Self {
        let consensus = ConsensusAggregator::aggregate(&legs);
        let player_name = legs
            .iter()
            .find_map(|l| l.player_name())
            .or_else(|| market.player_name());
        Self {
            market_id: market.market_id(),
            prop_type: market.prop_type(),
            sport: sport.to_ascii_lowercase(),
            game_start,
            player_name,
            market,
            legs,
            consensus,
            last_sync: synced_at,
            sync_status: SyncStatus::Outdated,
        }
    }

    pub fn bookmaker_count(&self) -> usize {
        self.legs.len()
    }

    pub fn is_insufficient(&self) -> bool {
        self.consensus.insufficient_data
    }

    /// Per-bookmaker confidence, recomputed from the legs.
    pub fn confidences(&self) -> BTreeMap<String, Confidence> {
        self.legs
            .iter()
            .map(|l| (l.bookmaker.clone(), l.confidence()))
            .collect()
    }

    pub fn with_status(&self, status: SyncStatus) -> Self {
        Self {
            sync_status: status,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_key::{decode, Side};
    use crate::odds::AmericanOdds;
    use crate::quote::Quote;

    fn market() -> MarketKey {
        decode("points-LEBRON_JAMES_1_NBA-game-ou-over")
            .unwrap()
            .market
            .with_game("g1")
    }

    fn side(side: Side, price: Option<i32>, line: Option<f64>) -> Option<Quote> {
        price.map(|p| Quote {
            market: market(),
            bookmaker: "book".into(),
            side,
            line,
            price: AmericanOdds::new(p),
            observed_at: Utc::now(),
            player_name: None,
        })
    }

    fn leg(book: &str, over: Option<i32>, under: Option<i32>, line: Option<f64>) -> PairedLeg {
        PairedLeg {
            market: market(),
            bookmaker: book.into(),
            over: side(Side::Over, over, line),
            under: side(Side::Under, under, line),
        }
    }

    #[test]
    fn confidence_thresholds() {
        assert_eq!(Confidence::from_spread(-110, -110), Confidence::High);
        assert_eq!(Confidence::from_spread(-110, -100), Confidence::High);
        assert_eq!(Confidence::from_spread(-115, -100), Confidence::Medium);
        assert_eq!(Confidence::from_spread(-120, -100), Confidence::Medium);
        assert_eq!(Confidence::from_spread(-105, 105), Confidence::Low);
        assert_eq!(Confidence::from_spread(i32::MIN, i32::MAX), Confidence::Low);
    }

    #[test]
    fn line_is_confidence_weighted_mean() {
        let legs = vec![
            leg("fanduel", Some(-110), Some(-110), Some(10.0)),
            leg("draftkings", Some(-105), Some(105), Some(12.0)),
        ];
        let summary = ConsensusAggregator::aggregate(&legs);
        assert!((summary.line - 10.5).abs() < 1e-9);
        assert!(!summary.no_line);
        assert_eq!(summary.over_odds, -108);
        assert_eq!(summary.under_odds, -3);
    }

    #[test]
    fn missing_sides_are_dropped_from_price_means() {
        let legs = vec![
            leg("fanduel", Some(-110), Some(-110), Some(25.5)),
            leg("draftkings", Some(-120), None, Some(25.5)),
        ];
        let summary = ConsensusAggregator::aggregate(&legs);
        assert_eq!(summary.over_odds, -115);
        assert_eq!(summary.under_odds, -110);
    }

    #[test]
    fn legs_without_lines_flag_no_line() {
        let legs = vec![leg("fanduel", Some(-110), Some(-110), None)];
        let summary = ConsensusAggregator::aggregate(&legs);
        assert_eq!(summary.line, 0.0);
        assert!(summary.no_line);
        assert!(!summary.insufficient_data);
    }

    #[test]
    fn empty_input_is_flagged_insufficient() {
        let summary = ConsensusAggregator::aggregate(&[]);
        assert_eq!(summary.line, 0.0);
        assert_eq!(summary.over_odds, 0);
        assert_eq!(summary.under_odds, 0);
        assert!(summary.insufficient_data);
    }

    #[test]
    fn fallback_prices_are_surfaced() {
        let mut l = leg("fanduel", Some(-110), Some(-110), Some(25.5));
        if let Some(q) = l.over.as_mut() {
            q.price = AmericanOdds::fallback();
        }
        assert!(ConsensusAggregator::aggregate(&[l]).has_default_odds);
    }

    #[test]
    fn built_market_exposes_confidences() {
        let built = ConsensusMarket::build(
            market(),
            "NBA",
            Utc::now(),
            vec![
                leg("fanduel", Some(-110), Some(-110), Some(25.5)),
                leg("draftkings", Some(-130), Some(100), Some(26.5)),
            ],
            Utc::now(),
        );
        assert_eq!(built.sport, "nba");
        assert_eq!(built.prop_type, "Points");
        assert_eq!(built.player_name.as_deref(), Some("Lebron James"));
        assert_eq!(built.bookmaker_count(), 2);
        let conf = built.confidences();
        assert_eq!(conf["fanduel"], Confidence::High);
        assert_eq!(conf["draftkings"], Confidence::Low);
    }
}
