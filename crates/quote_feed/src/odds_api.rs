/// The Odds API v4 — per-event player props as named outcomes.
///
///   GET /v4/sports/{sport_key}/events?commenceTimeFrom=..&commenceTimeTo=..
///   GET /v4/sports/{sport_key}/events/{event_id}/odds?markets=player_points,..&oddsFormat=american
///   { "bookmakers": [ { "key", "last_update", "markets": [ { "key", "outcomes": [ { "name", "description", "price", "point" } ] } ] } ] }
///
/// Targets discovered elsewhere carry another provider's event id, so the
/// Odds API event is resolved by kickoff time and team names, then remembered.

use crate::http;
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use prop_consensus::bookmakers::canonical_id;
use prop_consensus::{QuoteSource, RawPrice, RawQuote, TargetMarket};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

pub const DEFAULT_BASE_URL: &str = "https://api.the-odds-api.com/v4";
pub const SOURCE_NAME: &str = "the-odds-api";

/// Kickoff times from two providers agree to within this many minutes.
const KICKOFF_TOLERANCE_MINUTES: i64 = 15;

/// Canonical bookmaker id → Odds API bookmaker key, where the two differ.
const BOOKMAKER_KEYS: &[(&str, &str)] = &[
    ("caesars", "williamhill_us"),
    ("hardrock", "hardrockbet"),
    ("pointsbet", "pointsbetus"),
];

/// Provider market key → canonical stat id.
const MARKET_STATS: &[(&str, &str)] = &[
    ("player_points", "points"),
    ("player_rebounds", "rebounds"),
    ("player_assists", "assists"),
    ("player_threes", "three_pointers_made"),
    ("player_steals", "steals"),
    ("player_blocks", "blocks"),
    ("player_turnovers", "turnovers"),
    ("player_pass_yds", "passing_yards"),
    ("player_pass_tds", "passing_touchdowns"),
    ("player_pass_completions", "passing_completions"),
    ("player_pass_attempts", "passing_attempts"),
    ("player_pass_interceptions", "passing_interceptions"),
    ("player_rush_yds", "rushing_yards"),
    ("player_rush_attempts", "rushing_attempts"),
    ("player_reception_yds", "receiving_yards"),
    ("player_receptions", "receptions"),
    ("batter_hits", "hits"),
    ("batter_runs_scored", "runs"),
    ("batter_rbis", "rbis"),
    ("batter_home_runs", "home_runs"),
    ("batter_total_bases", "total_bases"),
    ("pitcher_strikeouts", "strikeouts"),
    ("player_goals", "goals"),
    ("player_shots_on_goal", "shots_on_goal"),
    ("player_total_saves", "saves"),
];

#[derive(Deserialize, Debug)]
pub struct OddsApiEvent {
    pub id: String,
    #[serde(default)]
    pub bookmakers: Vec<OddsApiBookmaker>,
}

/// Listing entry from `/events`, without odds.
#[derive(Deserialize, Debug, Clone)]
pub struct OddsApiListedEvent {
    pub id: String,
    pub commence_time: DateTime<Utc>,
    #[serde(default)]
    pub home_team: Option<String>,
    #[serde(default)]
    pub away_team: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct OddsApiBookmaker {
    pub key: String,
    pub last_update: String,
    #[serde(default)]
    pub markets: Vec<OddsApiMarket>,
}

#[derive(Deserialize, Debug)]
pub struct OddsApiMarket {
    pub key: String,
    #[serde(default)]
    pub last_update: Option<String>,
    #[serde(default)]
    pub outcomes: Vec<OddsApiOutcome>,
}

#[derive(Deserialize, Debug)]
pub struct OddsApiOutcome {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: RawPrice,
    #[serde(default)]
    pub point: Option<f64>,
}

pub fn sport_key(sport: &str) -> Option<&'static str> {
    Some(match sport.trim().to_ascii_lowercase().as_str() {
        "nfl" => "americanfootball_nfl",
        "ncaaf" => "americanfootball_ncaaf",
        "nba" => "basketball_nba",
        "wnba" => "basketball_wnba",
        "ncaab" => "basketball_ncaab",
        "mlb" => "baseball_mlb",
        "nhl" => "icehockey_nhl",
        _ => return None,
    })
}

pub fn markets_for(sport: &str) -> Vec<&'static str> {
    let prefixes: &[&str] = match sport.trim().to_ascii_lowercase().as_str() {
        "nba" | "wnba" | "ncaab" => &["player_points", "player_rebounds", "player_assists",
                                      "player_threes", "player_steals", "player_blocks",
                                      "player_turnovers"],
        "nfl" | "ncaaf" => &["player_pass", "player_rush", "player_reception"],
        "mlb" => &["batter_", "pitcher_"],
        "nhl" => &["player_goals", "player_shots_on_goal", "player_total_saves"],
        _ => &[],
    };
    MARKET_STATS
        .iter()
        .map(|(k, _)| *k)
        .filter(|k| prefixes.iter().any(|p| k.starts_with(p)))
        .collect()
}

/// Flatten bookmakers × markets × outcomes into outcome-shaped raw quotes.
///
/// Outcomes with a separate `description` carry the player there and a bare
/// `Over`/`Under` in `name`; both layouts end up as `"<player> <side> <line>"`.
pub fn event_quotes(event: &OddsApiEvent) -> Vec<RawQuote> {
    let mut out = Vec::new();
    for book in &event.bookmakers {
        for market in &book.markets {
            let Some(stat) = canonical_stat(&market.key) else {
                debug!("OddsAPI market {} not mapped, skipped", market.key);
                continue;
            };
            let observed_at = market
                .last_update
                .clone()
                .unwrap_or_else(|| book.last_update.clone());
            for outcome in &market.outcomes {
                let name = match (&outcome.description, outcome.point) {
                    (Some(player), Some(point)) => format!("{player} {} {point}", outcome.name),
                    _ => outcome.name.clone(),
                };
                out.push(RawQuote::Outcome {
                    bookmaker: book.key.clone(),
                    market: format!("player_{stat}"),
                    name,
                    price: outcome.price.clone(),
                    point: outcome.point,
                    observed_at: observed_at.clone(),
                });
            }
        }
    }
    out
}

pub fn bookmaker_key(canonical: &str) -> String {
    BOOKMAKER_KEYS
        .iter()
        .find(|(id, _)| *id == canonical)
        .map(|(_, key)| key.to_string())
        .unwrap_or_else(|| canonical.to_string())
}

fn team_key(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

fn same_team(a: &str, b: &str) -> bool {
    let (a, b) = (team_key(a), team_key(b));
    !a.is_empty() && !b.is_empty() && (a == b || a.contains(&b) || b.contains(&a))
}

/// Pick the listed event for a target: kickoff within tolerance, and both
/// team names matching when the target carries them. Without team names a
/// single kickoff match is accepted, several are ambiguous.
pub fn match_event<'e>(
    events: &'e [OddsApiListedEvent],
    target: &TargetMarket,
) -> Option<&'e OddsApiListedEvent> {
    let tolerance = ChronoDuration::minutes(KICKOFF_TOLERANCE_MINUTES);
    let mut kickoff = events
        .iter()
        .filter(|e| {
            let drift = e.commence_time - target.game_start;
            drift <= tolerance && drift >= -tolerance
        });

    match (&target.home_team, &target.away_team) {
        (Some(home), Some(away)) => kickoff.find(|e| {
            let listed_home = e.home_team.as_deref().unwrap_or_default();
            let listed_away = e.away_team.as_deref().unwrap_or_default();
            same_team(home, listed_home) && same_team(away, listed_away)
        }),
        _ => {
            let first = kickoff.next()?;
            match kickoff.next() {
                Some(_) => None,
                None => Some(first),
            }
        }
    }
}

fn canonical_stat(market_key: &str) -> Option<&'static str> {
    MARKET_STATS
        .iter()
        .find(|(k, _)| *k == market_key)
        .map(|(_, stat)| *stat)
}

pub struct OddsApiSource {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    /// Provider keys, already mapped from canonical ids.
    bookmakers: Vec<String>,
    /// target label → resolved Odds API event id
    resolved: Mutex<HashMap<String, String>>,
}

impl OddsApiSource {
    pub fn new(api_key: impl Into<String>, bookmakers: Vec<String>, timeout: Duration) -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL, api_key, bookmakers, timeout)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        bookmakers: Vec<String>,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: http::client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            bookmakers: bookmakers
                .iter()
                .map(|b| bookmaker_key(&canonical_id(b)))
                .collect(),
            resolved: Mutex::new(HashMap::new()),
        })
    }

    /// The target's own id for this provider, a remembered match, or a fresh lookup.
    async fn event_id(&self, target: &TargetMarket, sport: &str) -> Result<String> {
        if let Some(id) = target.event_id_for(SOURCE_NAME) {
            return Ok(id.to_string());
        }
        if let Some(id) = self.resolved.lock().await.get(&target.label()) {
            return Ok(id.clone());
        }

        let window = ChronoDuration::minutes(KICKOFF_TOLERANCE_MINUTES);
        let fmt = "%Y-%m-%dT%H:%M:%SZ";
        let req = self
            .client
            .get(format!("{}/sports/{sport}/events", self.base_url))
            .query(&[
                ("apiKey", self.api_key.clone()),
                ("commenceTimeFrom", (target.game_start - window).format(fmt).to_string()),
                ("commenceTimeTo", (target.game_start + window).format(fmt).to_string()),
            ]);
        let events: Vec<OddsApiListedEvent> = http::get_json(req, "OddsAPI events").await?;

        let Some(event) = match_event(&events, target) else {
            bail!(
                "no OddsAPI event matches {} ({} listed near {})",
                target.label(),
                events.len(),
                target.game_start
            );
        };
        info!("OddsAPI {} resolved to event {}", target.label(), event.id);
        self.resolved
            .lock()
            .await
            .insert(target.label(), event.id.clone());
        Ok(event.id.clone())
    }
}

#[async_trait]
impl QuoteSource for OddsApiSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn fetch(&self, target: &TargetMarket) -> Result<Vec<RawQuote>> {
        let sport = sport_key(&target.sport)
            .ok_or_else(|| anyhow!("no Odds API sport key for `{}`", target.sport))?;
        let event_id = self.event_id(target, sport).await?;
        let markets = markets_for(&target.sport);

        let mut query = vec![
            ("apiKey", self.api_key.clone()),
            ("regions", "us".to_string()),
            ("markets", markets.join(",")),
            ("oddsFormat", "american".to_string()),
        ];
        if !self.bookmakers.is_empty() {
            query.push(("bookmakers", self.bookmakers.join(",")));
        }

        let req = self
            .client
            .get(format!(
                "{}/sports/{sport}/events/{event_id}/odds",
                self.base_url
            ))
            .query(&query);
        let event: OddsApiEvent = http::get_json(req, "OddsAPI").await?;

        let quotes = event_quotes(&event);
        debug!("OddsAPI {}: {} raw quotes", target.label(), quotes.len());
        Ok(quotes)
    }
}
