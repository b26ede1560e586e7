/// SportsGameOdds v2 — odd-id keyed events with a per-bookmaker breakdown.
///
///   GET /v2/events/?leagueID=NBA&eventIDs=..&oddsAvailable=true&oddsType=playerprops
///   { "data": [ { "eventID", "status": { "startsAt" }, "odds": { "<oddID>": { "byBookmaker": { .. } } } } ] }

use crate::http;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use prop_consensus::{MarketTargets, QuoteSource, RawPrice, RawQuote, TargetMarket};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_BASE_URL: &str = "https://api.sportsgameodds.com/v2";
pub const SOURCE_NAME: &str = "sportsgameodds";
const MAX_EVENTS: usize = 100;

// ── Wire structs ─────────────────────────────────────────────────────────────

#[derive(Deserialize, Debug)]
pub struct SgoResponse {
    #[serde(default)]
    pub data: Vec<SgoEvent>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SgoEvent {
    #[serde(rename = "eventID")]
    pub event_id: String,
    #[serde(rename = "leagueID", default)]
    pub league_id: Option<String>,
    #[serde(default)]
    pub status: Option<SgoStatus>,
    #[serde(default)]
    pub teams: Option<SgoTeams>,
    #[serde(default)]
    pub odds: HashMap<String, SgoOdd>,
}

#[derive(Deserialize, Debug)]
pub struct SgoTeams {
    #[serde(default)]
    pub home: Option<SgoTeam>,
    #[serde(default)]
    pub away: Option<SgoTeam>,
}

#[derive(Deserialize, Debug)]
pub struct SgoTeam {
    #[serde(default)]
    pub names: Option<SgoTeamNames>,
}

#[derive(Deserialize, Debug)]
pub struct SgoTeamNames {
    #[serde(default)]
    pub long: Option<String>,
}

impl SgoTeam {
    fn long_name(&self) -> Option<String> {
        self.names.as_ref().and_then(|n| n.long.clone())
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SgoStatus {
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SgoOdd {
    #[serde(default)]
    pub by_bookmaker: HashMap<String, SgoBookQuote>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SgoBookQuote {
    #[serde(default)]
    pub odds: Option<RawPrice>,
    #[serde(default)]
    pub over_under: Option<RawPrice>,
    #[serde(default = "default_available")]
    pub available: bool,
    #[serde(default)]
    pub last_updated_at: Option<String>,
}

fn default_available() -> bool {
    true
}

// ── Conversion ───────────────────────────────────────────────────────────────

/// Flatten one event into per-bookmaker raw quotes.
///
/// `odd_ids` restricts the output when the target names specific markets.
pub fn event_quotes(event: &SgoEvent, odd_ids: Option<&[String]>) -> Vec<RawQuote> {
    let mut out = Vec::new();
    for (odd_id, odd) in &event.odds {
        if let Some(wanted) = odd_ids {
            if !wanted.iter().any(|w| w == odd_id) {
                continue;
            }
        }
        for (bookmaker, q) in &odd.by_bookmaker {
            let Some(price) = q.odds.clone() else {
                debug!("SGO {odd_id}/{bookmaker}: no price, skipped");
                continue;
            };
            out.push(RawQuote::ByBookmaker {
                odd_id: odd_id.clone(),
                bookmaker: bookmaker.clone(),
                available: q.available,
                line: q.over_under.as_ref().and_then(line_value),
                price,
                observed_at: q.last_updated_at.clone().unwrap_or_default(),
            });
        }
    }
    out
}

fn line_value(raw: &RawPrice) -> Option<f64> {
    match raw {
        RawPrice::Number(n) => Some(*n),
        RawPrice::Text(t) => t.trim().parse::<f64>().ok(),
    }
    .filter(|l| l.is_finite())
}

pub fn league_id(sport: &str) -> String {
    match sport.trim().to_ascii_lowercase().as_str() {
        "football" => "NFL".to_string(),
        "basketball" => "NBA".to_string(),
        "baseball" => "MLB".to_string(),
        "hockey" => "NHL".to_string(),
        other => other.to_ascii_uppercase(),
    }
}

// ── Source ───────────────────────────────────────────────────────────────────

pub struct SportsGameOddsSource {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl SportsGameOddsSource {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL, api_key, timeout)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: http::client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    async fn events(&self, query: &[(&str, String)]) -> Result<Vec<SgoEvent>> {
        let req = self
            .client
            .get(format!("{}/events/", self.base_url))
            .header("x-api-key", &self.api_key)
            .query(query);
        let resp: SgoResponse = http::get_json(req, "SportsGameOdds").await?;
        Ok(resp.data)
    }
}

#[async_trait]
impl QuoteSource for SportsGameOddsSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn fetch(&self, target: &TargetMarket) -> Result<Vec<RawQuote>> {
        let event_id = target.event_id_for(SOURCE_NAME).unwrap_or(target.game_id.as_str());
        let events = self
            .events(&[
                ("leagueID", league_id(&target.sport)),
                ("eventIDs", event_id.to_string()),
                ("oddsAvailable", "true".to_string()),
                ("oddsType", "playerprops".to_string()),
            ])
            .await?;

        let quotes: Vec<RawQuote> = events
            .iter()
            .filter(|e| e.event_id == event_id)
            .flat_map(|e| event_quotes(e, target.odd_ids.as_deref()))
            .collect();
        debug!("SGO {}: {} raw quotes", target.label(), quotes.len());
        Ok(quotes)
    }
}

/// Upcoming events with player-prop odds, one league at a time.
pub struct SportsGameOddsTargets {
    source: SportsGameOddsSource,
    sports: Vec<String>,
}

impl SportsGameOddsTargets {
    pub fn new(source: SportsGameOddsSource, sports: Vec<String>) -> Self {
        Self { source, sports }
    }
}

#[async_trait]
impl MarketTargets for SportsGameOddsTargets {
    async fn targets(&self) -> Result<Vec<TargetMarket>> {
        let mut targets = Vec::new();
        for sport in &self.sports {
            let events = self
                .source
                .events(&[
                    ("leagueID", league_id(sport)),
                    ("oddsAvailable", "true".to_string()),
                    ("limit", MAX_EVENTS.to_string()),
                ])
                .await?;
            let before = targets.len();
            targets.extend(events.into_iter().filter_map(|e| event_target(sport, e)));
            info!("SGO {sport}: {} target games", targets.len() - before);
        }
        Ok(targets)
    }
}

fn event_target(sport: &str, event: SgoEvent) -> Option<TargetMarket> {
    let starts_at = event.status.and_then(|s| s.starts_at)?;
    let (home_team, away_team) = match &event.teams {
        Some(t) => (
            t.home.as_ref().and_then(SgoTeam::long_name),
            t.away.as_ref().and_then(SgoTeam::long_name),
        ),
        None => (None, None),
    };
    Some(TargetMarket {
        sport: sport.to_ascii_lowercase(),
        provider_ids: [(SOURCE_NAME.to_string(), event.event_id.clone())].into(),
        game_id: event.event_id,
        game_start: starts_at,
        odd_ids: None,
        home_team,
        away_team,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"{
      "success": true,
      "data": [{
        "eventID": "EVT123",
        "leagueID": "NBA",
        "status": { "startsAt": "2026-10-17T00:00:00Z" },
        "teams": {
          "home": { "teamID": "LOS_ANGELES_LAKERS_NBA", "names": { "long": "Los Angeles Lakers", "short": "LAL" } },
          "away": { "teamID": "GOLDEN_STATE_WARRIORS_NBA", "names": { "long": "Golden State Warriors" } }
        },
        "odds": {
          "points-LEBRON_JAMES_1_NBA-game-ou-over": {
            "oddID": "points-LEBRON_JAMES_1_NBA-game-ou-over",
            "byBookmaker": {
              "fanduel":    { "odds": "-115", "overUnder": "25.5", "available": true,
                              "lastUpdatedAt": "2026-10-16T18:00:00Z" },
              "draftkings": { "odds": -110, "overUnder": 26, "available": false,
                              "lastUpdatedAt": "2026-10-16T18:01:00Z" },
              "caesars":    { "overUnder": "25.5" }
            }
          }
        }
      }]
    }"#;

    #[test]
    fn flattens_by_bookmaker_breakdown() {
        let resp: SgoResponse = serde_json::from_str(FIXTURE).unwrap();
        let mut quotes = event_quotes(&resp.data[0], None);
        quotes.sort_by(|a, b| a.bookmaker().cmp(b.bookmaker()));
        assert_eq!(quotes.len(), 2);

        match &quotes[0] {
            RawQuote::ByBookmaker { bookmaker, available, line, price, .. } => {
                assert_eq!(bookmaker, "draftkings");
                assert!(!available);
                assert_eq!(*line, Some(26.0));
                assert_eq!(*price, RawPrice::Number(-110.0));
            }
            other => panic!("unexpected shape {other:?}"),
        }
        match &quotes[1] {
            RawQuote::ByBookmaker { line, price, observed_at, .. } => {
                assert_eq!(*line, Some(25.5));
                assert_eq!(*price, RawPrice::Text("-115".into()));
                assert_eq!(observed_at, "2026-10-16T18:00:00Z");
            }
            other => panic!("unexpected shape {other:?}"),
        }
    }

    #[test]
    fn odd_id_filter_limits_output() {
        let resp: SgoResponse = serde_json::from_str(FIXTURE).unwrap();
        let wanted = vec!["rebounds-LEBRON_JAMES_1_NBA-game-ou-over".to_string()];
        assert!(event_quotes(&resp.data[0], Some(&wanted)).is_empty());
    }

    #[test]
    fn events_become_targets() {
        let resp: SgoResponse = serde_json::from_str(FIXTURE).unwrap();
        let event = resp.data.into_iter().next().unwrap();
        let t = event_target("NBA", event).unwrap();
        assert_eq!(t.game_id, "EVT123");
        assert_eq!(t.sport, "nba");
        assert_eq!(t.event_id_for(SOURCE_NAME), Some("EVT123"));
        assert_eq!(t.home_team.as_deref(), Some("Los Angeles Lakers"));
        assert_eq!(t.away_team.as_deref(), Some("Golden State Warriors"));
        assert_eq!(league_id("basketball"), "NBA");
        assert_eq!(league_id("wnba"), "WNBA");
    }
}
