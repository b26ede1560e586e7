//! Raw provider quotes and their validated, decoded form.

use crate::bookmakers;
use crate::error::{DecodeError, SyncError};
use crate::market_key::{self, MarketKey, Side};
use crate::odds::{self, AmericanOdds};
use crate::pairing;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// A price as the provider sent it: a number in any encoding, or text like `"+110"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawPrice {
    Number(f64),
    Text(String),
}

impl RawPrice {
    /// Normalized odds. Unparseable text takes the flagged default.
    pub fn to_american(&self) -> AmericanOdds {
        let odds = match self {
            RawPrice::Number(n) => odds::normalize(*n),
            RawPrice::Text(t) => match odds::parse_odds_text(t) {
                Some(n) => odds::normalize(n),
                None => AmericanOdds::fallback(),
            },
        };
        if odds.is_default {
            debug!("{}, priced at {odds}", SyncError::InvalidOdds(self.as_text()));
        }
        odds
    }

    fn as_text(&self) -> String {
        match self {
            RawPrice::Number(n) => n.to_string(),
            RawPrice::Text(t) => t.clone(),
        }
    }
}

/// Provider response shapes, one variant per upstream layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawQuote {
    /// Odd-id keyed quote, one per bookmaker and side.
    #[serde(rename_all = "camelCase")]
    ByBookmaker {
        odd_id: String,
        bookmaker: String,
        available: bool,
        #[serde(default)]
        line: Option<f64>,
        price: RawPrice,
        observed_at: String,
    },
    /// Outcome-name quote: `"<player> Over 24.5"` under a `player_<stat>` market.
    #[serde(rename_all = "camelCase")]
    Outcome {
        bookmaker: String,
        market: String,
        name: String,
        price: RawPrice,
        #[serde(default)]
        point: Option<f64>,
        observed_at: String,
    },
}

impl RawQuote {
    pub fn bookmaker(&self) -> &str {
        match self {
            RawQuote::ByBookmaker { bookmaker, .. } | RawQuote::Outcome { bookmaker, .. } => {
                bookmaker
            }
        }
    }
}

/// One market the caller wants synced this cycle.
///
/// `game_id` is the cache identity. Each source looks up its own event id in
/// `provider_ids` (keyed by `QuoteSource::name`) and may fall back to matching
/// on start time and team names when it has none.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetMarket {
    pub sport: String,
    pub game_id: String,
    pub game_start: DateTime<Utc>,
    /// Restricts the fetch to these odd ids when set.
    #[serde(default)]
    pub odd_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub provider_ids: BTreeMap<String, String>,
    #[serde(default)]
    pub home_team: Option<String>,
    #[serde(default)]
    pub away_team: Option<String>,
}

impl TargetMarket {
    pub fn label(&self) -> String {
        format!("{}/{}", self.sport, self.game_id)
    }

    pub fn event_id_for(&self, source: &str) -> Option<&str> {
        self.provider_ids.get(source).map(String::as_str)
    }
}

/// One bookmaker's price for one side of one market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub market: MarketKey,
    pub bookmaker: String,
    pub side: Side,
    pub line: Option<f64>,
    pub price: AmericanOdds,
    pub observed_at: DateTime<Utc>,
    /// Set when the name came from the quote rather than the player id.
    pub player_name: Option<String>,
}

impl Quote {
    pub fn display_player(&self) -> Option<String> {
        self.player_name.clone().or_else(|| self.market.player_name())
    }
}

/// Result of decoding one raw quote.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Open(Quote),
    /// Market exists but the bookmaker has it closed right now.
    Closed(MarketKey),
}

impl Decoded {
    pub fn market(&self) -> &MarketKey {
        match self {
            Decoded::Open(q) => &q.market,
            Decoded::Closed(k) => k,
        }
    }
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, DecodeError> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| DecodeError::Timestamp(raw.to_string()))
}

/// Validate and decode a raw quote in the context of its target market.
pub fn decode_raw(raw: &RawQuote, target: &TargetMarket) -> Result<Decoded, DecodeError> {
    match raw {
        RawQuote::ByBookmaker {
            odd_id,
            bookmaker,
            available,
            line,
            price,
            observed_at,
        } => {
            let odd = market_key::decode(odd_id)?;
            let side = odd.side()?;
            if !market_key::is_player_prop_market(&odd.market, side) {
                return Err(DecodeError::NotPlayerProp(odd_id.clone()));
            }
            let market = odd.market.with_game(target.game_id.clone());
            if !available {
                return Ok(Decoded::Closed(market));
            }
            Ok(Decoded::Open(Quote {
                market,
                bookmaker: bookmakers::canonical_id(bookmaker),
                side,
                line: line.filter(|l| l.is_finite()),
                price: price.to_american(),
                observed_at: parse_timestamp(observed_at)?,
                player_name: None,
            }))
        }
        RawQuote::Outcome {
            bookmaker,
            market,
            name,
            price,
            point,
            observed_at,
        } => {
            let outcome = pairing::split_outcome_name(name)
                .ok_or_else(|| DecodeError::OutcomeName(name.clone()))?;
            let stat_id = market
                .trim()
                .trim_start_matches("player_")
                .trim_start_matches("pitcher_")
                .to_string();
            let key = MarketKey {
                stat_id,
                player_id: outcome_player_id(&outcome.player, &target.sport),
                period_id: "game".to_string(),
                bet_type_id: "ou".to_string(),
                game_id: Some(target.game_id.clone()),
            };
            Ok(Decoded::Open(Quote {
                market: key,
                bookmaker: bookmakers::canonical_id(bookmaker),
                side: outcome.side,
                line: point.or(Some(outcome.line)).filter(|l| l.is_finite()),
                price: price.to_american(),
                observed_at: parse_timestamp(observed_at)?,
                player_name: Some(outcome.player),
            }))
        }
    }
}

/// Synthesized `{NAME_TOKENS}_1_{LEAGUE}` id for providers that only send names.
fn outcome_player_id(player: &str, sport: &str) -> String {
    let tokens: Vec<String> = player
        .split_whitespace()
        .map(|t| {
            t.chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_uppercase()
        })
        .filter(|t| !t.is_empty())
        .collect();
    format!("{}_1_{}", tokens.join("_"), sport.to_uppercase())
}
