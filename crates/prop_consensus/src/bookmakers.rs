//! Canonical bookmaker ids and their display names.

/// Provider spellings (compacted to `[a-z0-9]`) → canonical id.
const ALIASES: &[(&str, &str)] = &[
    ("fanduelsportsbook", "fanduel"),
    ("draftking", "draftkings"),
    ("mgm", "betmgm"),
    ("williamhill", "caesars"),
    ("williamhillus", "caesars"),
    ("caesarssportsbook", "caesars"),
    ("espn", "espnbet"),
    ("hardrockbet", "hardrock"),
    ("pointsbetus", "pointsbet"),
];

const DISPLAY_NAMES: &[(&str, &str)] = &[
    ("fanduel", "FanDuel"),
    ("draftkings", "Draft Kings"),
    ("betmgm", "BetMGM"),
    ("caesars", "Caesars"),
    ("pointsbet", "PointsBet"),
    ("espnbet", "ESPN BET"),
    ("hardrock", "Hard Rock"),
    ("betrivers", "BetRivers"),
    ("bet365", "Bet365"),
    ("pinnacle", "Pinnacle"),
    ("bovada", "Bovada"),
    ("wynnbet", "WynnBET"),
    ("unibet", "Unibet"),
    ("betonline", "BetOnline"),
    ("prizepicks", "PrizePicks"),
    ("underdog", "Underdog"),
];

/// Lowercase, strip everything but `[a-z0-9]`, then resolve known aliases.
///
/// `"William Hill US"`, `"williamhill_us"` and `"caesars"` all become `caesars`.
pub fn canonical_id(raw: &str) -> String {
    let compact: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == compact)
        .map(|(_, id)| id.to_string())
        .unwrap_or(compact)
}

/// Known ids map to their brand spelling; anything else is title-cased.
pub fn display_name(bookmaker: &str) -> String {
    let id = canonical_id(bookmaker);
    DISPLAY_NAMES
        .iter()
        .find(|(k, _)| *k == id)
        .map(|(_, v)| v.to_string())
        .unwrap_or_else(|| {
            let mut chars = id.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
}
