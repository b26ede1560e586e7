//! Over/under leg pairing per market and bookmaker.

use crate::aggregate::Confidence;
use crate::market_key::{MarketKey, Side};
use crate::odds::{opposing_odds, AmericanOdds};
use crate::quote::Quote;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One bookmaker's two sides of a market. Either side may be missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairedLeg {
    pub market: MarketKey,
    pub bookmaker: String,
    pub over: Option<Quote>,
    pub under: Option<Quote>,
}

impl PairedLeg {
    pub fn is_matched(&self) -> bool {
        self.over.is_some() && self.under.is_some()
    }

    /// Line quoted by this bookmaker; the over side wins when both carry one.
    pub fn line(&self) -> Option<f64> {
        self.over
            .as_ref()
            .and_then(|q| q.line)
            .or_else(|| self.under.as_ref().and_then(|q| q.line))
    }

    pub fn over_price(&self) -> Option<AmericanOdds> {
        self.over.as_ref().map(|q| q.price)
    }

    pub fn under_price(&self) -> Option<AmericanOdds> {
        self.under.as_ref().map(|q| q.price)
    }

    /// Both prices, with the missing one synthesized by inversion.
    pub fn effective_prices(&self) -> Option<(AmericanOdds, AmericanOdds)> {
        match (self.over_price(), self.under_price()) {
            (Some(o), Some(u)) => Some((o, u)),
            (Some(o), None) => Some((o, opposing_odds(o))),
            (None, Some(u)) => Some((opposing_odds(u), u)),
            (None, None) => None,
        }
    }

    /// Derived on every call, never stored.
    pub fn confidence(&self) -> Confidence {
        match self.effective_prices() {
            Some((o, u)) => Confidence::from_spread(o.value, u.value),
            None => Confidence::Low,
        }
    }

    pub fn player_name(&self) -> Option<String> {
        self.over
            .as_ref()
            .or(self.under.as_ref())
            .and_then(|q| q.display_player())
    }
}

/// Bucket quotes by (market, bookmaker) and pair the two sides.
///
/// Within a bucket the latest quote per side supersedes older ones. Output
/// order is unspecified.
pub fn group(quotes: Vec<Quote>) -> Vec<PairedLeg> {
    let mut buckets: HashMap<(String, String), PairedLeg> = HashMap::new();

    for quote in quotes {
        let bucket = (quote.market.market_id(), quote.bookmaker.clone());
        let leg = buckets.entry(bucket).or_insert_with(|| PairedLeg {
            market: quote.market.clone(),
            bookmaker: quote.bookmaker.clone(),
            over: None,
            under: None,
        });

        let slot = if quote.side.is_over_slot() {
            &mut leg.over
        } else {
            &mut leg.under
        };
        let newer = slot
            .as_ref()
            .map_or(true, |existing| quote.observed_at >= existing.observed_at);
        if newer {
            *slot = Some(quote);
        }
    }

    buckets.into_values().collect()
}

/// Parsed `"<player> <Over|Under> <line>"` outcome name.
#[derive(Debug, Clone, PartialEq)]
pub struct OutcomeName {
    pub player: String,
    pub side: Side,
    pub line: f64,
}

/// Split an outcome name on whitespace. Needs at least three tokens; the
/// second-to-last token is the side marker, the last one the line.
pub fn split_outcome_name(name: &str) -> Option<OutcomeName> {
    let parts: Vec<&str> = name.split_whitespace().collect();
    if parts.len() < 3 {
        return None;
    }
    let side = match parts[parts.len() - 2].to_ascii_lowercase().as_str() {
        "over" => Side::Over,
        "under" => Side::Under,
        _ => return None,
    };
    let line = parts[parts.len() - 1]
        .parse::<f64>()
        .ok()
        .filter(|l| l.is_finite())?;
    let player = parts[..parts.len() - 2].join(" ");
    if player.is_empty() {
        return None;
    }
    Some(OutcomeName { player, side, line })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_key::decode;
    use chrono::{Duration, TimeZone, Utc};

    fn quote(odd_id: &str, bookmaker: &str, price: i32, line: f64, secs: i64) -> Quote {
        let odd = decode(odd_id).unwrap();
        Quote {
            market: odd.market.clone().with_game("g1"),
            bookmaker: bookmaker.into(),
            side: odd.side().unwrap(),
            line: Some(line),
            price: AmericanOdds::new(price),
            observed_at: Utc.with_ymd_and_hms(2026, 10, 16, 18, 0, 0).unwrap()
                + Duration::seconds(secs),
            player_name: None,
        }
    }

    const OVER: &str = "points-LEBRON_JAMES_1_NBA-game-ou-over";
    const UNDER: &str = "points-LEBRON_JAMES_1_NBA-game-ou-under";

    #[test]
    fn pairs_over_with_under_per_bookmaker() {
        let legs = group(vec![
            quote(OVER, "fanduel", -110, 25.5, 0),
            quote(UNDER, "fanduel", -110, 25.5, 1),
            quote(OVER, "draftkings", -115, 25.5, 0),
        ]);
        assert_eq!(legs.len(), 2);

        let fd = legs.iter().find(|l| l.bookmaker == "fanduel").unwrap();
        assert!(fd.is_matched());
        assert_eq!(fd.confidence(), Confidence::High);

        let dk = legs.iter().find(|l| l.bookmaker == "draftkings").unwrap();
        assert!(!dk.is_matched());
        assert!(dk.under.is_none());
        assert_eq!(dk.effective_prices().unwrap().1.value, 115);
    }

    #[test]
    fn later_quote_supersedes_earlier_one() {
        let legs = group(vec![
            quote(OVER, "fanduel", -120, 24.5, 10),
            quote(OVER, "fanduel", -110, 25.5, 0),
        ]);
        assert_eq!(legs.len(), 1);
        assert_eq!(legs[0].over_price().unwrap().value, -120);
        assert_eq!(legs[0].line(), Some(24.5));
    }

    #[test]
    fn different_players_never_share_a_leg() {
        let legs = group(vec![
            quote(OVER, "fanduel", -110, 25.5, 0),
            quote("points-ANTHONY_DAVIS_1_NBA-game-ou-under", "fanduel", -110, 22.5, 0),
        ]);
        assert_eq!(legs.len(), 2);
        assert!(legs.iter().all(|l| !l.is_matched()));
    }

    #[test]
    fn splits_outcome_names() {
        let parsed = split_outcome_name("Jayson Tatum Over 27.5").unwrap();
        assert_eq!(parsed.player, "Jayson Tatum");
        assert_eq!(parsed.side, Side::Over);
        assert_eq!(parsed.line, 27.5);

        let suffix = split_outcome_name("Kenneth Walker III Under 64.5").unwrap();
        assert_eq!(suffix.player, "Kenneth Walker III");
        assert_eq!(suffix.side, Side::Under);

        assert!(split_outcome_name("Over 27.5").is_none());
        assert!(split_outcome_name("Jayson Tatum 27.5 Over").is_none());
        assert!(split_outcome_name("Jayson Tatum Over many").is_none());
    }
}
