//! Market identity codec for `{statID}-{playerID}-{periodID}-{betTypeID}-{sideID}` odd ids.

use crate::error::DecodeError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

const SEGMENTS: usize = 5;

/// Player-level stat categories. The upstream feed mixes team and player
/// markets in one collection, this list keeps only the player ones.
pub const PLAYER_STAT_IDS: &[&str] = &[
    "passing_yards",
    "rushing_yards",
    "receiving_yards",
    "receptions",
    "passing_touchdowns",
    "rushing_touchdowns",
    "receiving_touchdowns",
    "passing_interceptions",
    "passing_completions",
    "passing_attempts",
    "rushing_attempts",
    "points",
    "assists",
    "rebounds",
    "steals",
    "blocks",
    "three_pointers_made",
    "turnovers",
    "hits",
    "runs",
    "rbis",
    "home_runs",
    "total_bases",
    "strikeouts",
    "goals",
    "shots_on_goal",
    "saves",
];

const PROP_TYPE_LABELS: &[(&str, &str)] = &[
    ("passing_yards", "Passing Yards"),
    ("passing_completions", "Passing Completions"),
    ("passing_touchdowns", "Passing TDs"),
    ("passing_interceptions", "Interceptions"),
    ("passing_attempts", "Passing Attempts"),
    ("rushing_yards", "Rushing Yards"),
    ("rushing_attempts", "Rushing Attempts"),
    ("rushing_touchdowns", "Rushing TDs"),
    ("receiving_yards", "Receiving Yards"),
    ("receptions", "Receptions"),
    ("receiving_touchdowns", "Receiving TDs"),
    ("points", "Points"),
    ("assists", "Assists"),
    ("rebounds", "Rebounds"),
    ("three_pointers_made", "3PM"),
    ("steals", "Steals"),
    ("blocks", "Blocks"),
    ("turnovers", "Turnovers"),
    ("pra", "PRA"),
    ("double_double", "Double Double"),
    ("triple_double", "Triple Double"),
    ("hits", "Hits"),
    ("runs", "Runs"),
    ("rbis", "RBIs"),
    ("home_runs", "Home Runs"),
    ("total_bases", "Total Bases"),
    ("stolen_bases", "Stolen Bases"),
    ("strikeouts", "Pitcher Ks"),
    ("outs", "Pitcher Outs"),
    ("earned_runs", "ER Allowed"),
    ("goals", "Goals"),
    ("shots_on_goal", "Shots"),
    ("power_play_points", "PPP"),
    ("saves", "Saves"),
    ("shots", "Shots"),
    ("shots_on_target", "Shots on Target"),
    ("passes", "Passes"),
    ("tackles", "Tackles"),
];

const TEAM_PLACEHOLDERS: &[&str] = &["all", "home", "away", "team", "game"];

/// Which slot of a two-way market a quote fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Over,
    Under,
    Yes,
    No,
}

impl Side {
    pub fn parse(token: &str) -> Result<Self, DecodeError> {
        match token.trim().to_ascii_lowercase().as_str() {
            "over" | "o" => Ok(Side::Over),
            "under" | "u" => Ok(Side::Under),
            "yes" => Ok(Side::Yes),
            "no" => Ok(Side::No),
            other => Err(DecodeError::UnknownSide(other.to_string())),
        }
    }

    /// `over`/`yes` fill the first slot of a leg, `under`/`no` the second.
    pub fn is_over_slot(&self) -> bool {
        matches!(self, Side::Over | Side::Yes)
    }
}

/// Identity of one logical market. Side and bookmaker are not part of it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarketKey {
    pub stat_id: String,
    pub player_id: String,
    pub period_id: String,
    pub bet_type_id: String,
    /// Stamped from the target market, the odd id itself does not carry it.
    pub game_id: Option<String>,
}

impl MarketKey {
    pub fn with_game(mut self, game_id: impl Into<String>) -> Self {
        self.game_id = Some(game_id.into());
        self
    }

    /// Cache key: `{gameID}:{statID}-{playerID}-{periodID}`.
    pub fn market_id(&self) -> String {
        format!(
            "{}:{}-{}-{}",
            self.game_id.as_deref().unwrap_or("-"),
            self.stat_id,
            self.player_id,
            self.period_id
        )
    }

    pub fn prop_type(&self) -> String {
        prop_type_label(&self.stat_id)
    }

    pub fn player_name(&self) -> Option<String> {
        player_name(&self.player_id)
    }

    pub fn is_over_under(&self) -> bool {
        matches!(self.bet_type_id.as_str(), "ou" | "over_under")
    }
}

/// A decoded odd id: the market plus the side token it was quoted on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OddId {
    pub market: MarketKey,
    pub side_id: String,
}

impl OddId {
    pub fn encode(&self) -> String {
        format!(
            "{}-{}-{}-{}-{}",
            self.market.stat_id,
            self.market.player_id,
            self.market.period_id,
            self.market.bet_type_id,
            self.side_id
        )
    }

    pub fn side(&self) -> Result<Side, DecodeError> {
        Side::parse(&self.side_id)
    }
}

pub fn decode(odd_id: &str) -> Result<OddId, DecodeError> {
    let parts: Vec<&str> = odd_id.trim().split('-').collect();
    if parts.len() < SEGMENTS {
        return Err(DecodeError::TooFewSegments {
            odd_id: odd_id.to_string(),
            found: parts.len(),
        });
    }
    if let Some(position) = parts.iter().take(SEGMENTS).position(|p| p.is_empty()) {
        return Err(DecodeError::EmptySegment {
            odd_id: odd_id.to_string(),
            position,
        });
    }

    Ok(OddId {
        market: MarketKey {
            stat_id: parts[0].to_string(),
            player_id: parts[1].to_string(),
            period_id: parts[2].to_string(),
            bet_type_id: parts[3].to_string(),
            game_id: None,
        },
        side_id: parts[4].to_string(),
    })
}

/// Display name from a `{FIRST}_{LAST}_{NUM}_{LEAGUE}` player id.
pub fn player_name(player_id: &str) -> Option<String> {
    let parts: Vec<&str> = player_id.split('_').collect();
    if parts.len() < 4 || parts[0].is_empty() || parts[1].is_empty() {
        return None;
    }
    Some(format!("{} {}", title_case(parts[0]), title_case(parts[1])))
}

pub fn player_league(player_id: &str) -> Option<&str> {
    let parts: Vec<&str> = player_id.split('_').collect();
    if parts.len() < 4 {
        return None;
    }
    parts.last().copied().filter(|s| !s.is_empty())
}

fn player_id_shape() -> &'static Regex {
    static SHAPE: OnceLock<Regex> = OnceLock::new();
    SHAPE.get_or_init(|| Regex::new(r"^[A-Z_]+_[A-Z_]+_\d+_[A-Z]+$").expect("static regex"))
}

fn is_entity_token(player_id: &str) -> bool {
    if player_id_shape().is_match(player_id) {
        return true;
    }
    let token = player_id.trim();
    token.chars().count() >= 3
        && !token.chars().all(|c| c.is_ascii_digit())
        && !TEAM_PLACEHOLDERS.contains(&token.to_ascii_lowercase().as_str())
}

/// True when the market is an over/under on a player-level stat.
pub fn is_player_prop_market(key: &MarketKey, side: Side) -> bool {
    let over_under = key.is_over_under() && matches!(side, Side::Over | Side::Under);
    let player_stat = PLAYER_STAT_IDS.contains(&key.stat_id.to_ascii_lowercase().as_str());
    over_under && is_entity_token(&key.player_id) && player_stat
}

pub fn prop_type_label(stat_id: &str) -> String {
    let lookup = stat_id.trim().to_ascii_lowercase();
    PROP_TYPE_LABELS
        .iter()
        .find(|(id, _)| *id == lookup)
        .map(|(_, label)| label.to_string())
        .unwrap_or_else(|| humanize(stat_id))
}

fn humanize(raw: &str) -> String {
    raw.split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .map(title_case)
        .collect::<Vec<_>>()
        .join(" ")
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(|c| c.to_lowercase()))
            .collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_five_segment_odd_id() {
        let odd = decode("points-LEBRON_JAMES_1_NBA-game-ou-over").unwrap();
        assert_eq!(odd.market.stat_id, "points");
        assert_eq!(odd.market.player_id, "LEBRON_JAMES_1_NBA");
        assert_eq!(odd.market.period_id, "game");
        assert_eq!(odd.market.bet_type_id, "ou");
        assert_eq!(odd.side().unwrap(), Side::Over);
        assert_eq!(odd.market.player_name().as_deref(), Some("Lebron James"));
    }

    #[test]
    fn three_segments_is_an_error() {
        let err = decode("a-b-c").unwrap_err();
        assert_eq!(
            err,
            DecodeError::TooFewSegments { odd_id: "a-b-c".into(), found: 3 }
        );
    }

    #[test]
    fn empty_segment_is_an_error() {
        assert!(matches!(
            decode("points--game-ou-over"),
            Err(DecodeError::EmptySegment { position: 1, .. })
        ));
    }

    #[test]
    fn encode_decode_round_trip() {
        let odd = OddId {
            market: MarketKey {
                stat_id: "passing_yards".into(),
                player_id: "PATRICK_MAHOMES_1_NFL".into(),
                period_id: "1h".into(),
                bet_type_id: "ou".into(),
                game_id: None,
            },
            side_id: "under".into(),
        };
        assert_eq!(decode(&odd.encode()).unwrap(), odd);
    }

    #[test]
    fn short_player_id_keeps_key_but_has_no_name() {
        let odd = decode("points-LEBRON_JAMES-game-ou-over").unwrap();
        assert_eq!(odd.market.player_name(), None);
        assert_eq!(player_league("NICHOLAS_VATTIATO_1_NCAAF"), Some("NCAAF"));
    }

    #[test]
    fn market_id_ignores_side_and_bet_type() {
        let over = decode("points-LEBRON_JAMES_1_NBA-game-ou-over").unwrap();
        let under = decode("points-LEBRON_JAMES_1_NBA-game-ou-under").unwrap();
        assert_eq!(
            over.market.clone().with_game("g1").market_id(),
            under.market.with_game("g1").market_id()
        );
        assert_eq!(
            over.market.with_game("g1").market_id(),
            "g1:points-LEBRON_JAMES_1_NBA-game"
        );
    }

    #[test]
    fn player_prop_filter_needs_all_three_conditions() {
        let prop = decode("points-LEBRON_JAMES_1_NBA-game-ou-over").unwrap();
        assert!(is_player_prop_market(&prop.market, Side::Over));

        let team = decode("points-all-game-ou-over").unwrap();
        assert!(!is_player_prop_market(&team.market, Side::Over));

        let spread = decode("points-LEBRON_JAMES_1_NBA-game-sp-home").unwrap();
        assert!(!is_player_prop_market(&spread.market, Side::Over));

        let unknown_stat = decode("fantasy_score-LEBRON_JAMES_1_NBA-game-ou-over").unwrap();
        assert!(!is_player_prop_market(&unknown_stat.market, Side::Over));

        let opaque = decode("goals-mbappe7-game-ou-under").unwrap();
        assert!(is_player_prop_market(&opaque.market, Side::Under));

        let numeric = decode("goals-12345-game-ou-under").unwrap();
        assert!(!is_player_prop_market(&numeric.market, Side::Under));
    }

    #[test]
    fn prop_labels_use_table_then_humanize() {
        assert_eq!(prop_type_label("passing_yards"), "Passing Yards");
        assert_eq!(prop_type_label("three_pointers_made"), "3PM");
        assert_eq!(prop_type_label("batting_stolen-bases"), "Batting Stolen Bases");
    }

    #[test]
    fn side_tokens() {
        assert_eq!(Side::parse("Under").unwrap(), Side::Under);
        assert!(Side::parse("home").is_err());
        assert!(Side::Yes.is_over_slot());
        assert!(!Side::No.is_over_slot());
    }
}
