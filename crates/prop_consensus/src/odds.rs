//! Odds normalization: every upstream encoding ends up as American odds.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Price used when a raw value cannot be interpreted.
pub const DEFAULT_AMERICAN_ODDS: i32 = -110;

const AMERICAN_MIN_MAGNITUDE: f64 = 100.0;
const AMERICAN_MAX_MAGNITUDE: f64 = 1000.0;
const DECIMAL_UPPER_BOUND: f64 = 100.0;
/// Converted prices beyond this magnitude (decimal within 0.001 of 1.0) are not trusted.
const CONVERTED_MAX_MAGNITUDE: f64 = 100_000.0;

/// Signed American odds plus a marker for values produced by the fallback path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AmericanOdds {
    pub value: i32,
    pub is_default: bool,
}

impl AmericanOdds {
    pub fn new(value: i32) -> Self {
        Self { value, is_default: false }
    }

    pub fn fallback() -> Self {
        Self { value: DEFAULT_AMERICAN_ODDS, is_default: true }
    }

    /// Implied win probability, vig included.
    pub fn implied_probability(&self) -> f64 {
        let v = self.value as f64;
        if v < 0.0 {
            -v / (-v + 100.0)
        } else if v > 0.0 {
            100.0 / (v + 100.0)
        } else {
            0.0
        }
    }

    pub fn to_decimal(&self) -> f64 {
        let v = self.value as f64;
        if v < 0.0 {
            1.0 + 100.0 / -v
        } else if v > 0.0 {
            1.0 + v / 100.0
        } else {
            1.0
        }
    }
}

impl fmt::Display for AmericanOdds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.value > 0 {
            write!(f, "+{}", self.value)
        } else {
            write!(f, "{}", self.value)
        }
    }
}

/// Convert a raw price in any supported encoding to American odds.
///
/// Integral values with a magnitude between 100 and 1000 are already American.
/// Values in (1, 100) are decimal prices, values in (0, 1) are probability-like
/// fractions converted through `1/raw`. Everything else yields the flagged
/// default.
pub fn normalize(raw: f64) -> AmericanOdds {
    if !raw.is_finite() {
        return AmericanOdds::fallback();
    }

    let magnitude = raw.abs();
    if raw.fract() == 0.0
        && (AMERICAN_MIN_MAGNITUDE..=AMERICAN_MAX_MAGNITUDE).contains(&magnitude)
    {
        return AmericanOdds::new(raw as i32);
    }

    if raw > 1.0 && raw < DECIMAL_UPPER_BOUND {
        return decimal_to_american(raw);
    }

    if raw > 0.0 && raw < 1.0 {
        return decimal_to_american(1.0 / raw);
    }

    AmericanOdds::fallback()
}

fn decimal_to_american(decimal: f64) -> AmericanOdds {
    if decimal <= 1.0 || !decimal.is_finite() {
        return AmericanOdds::fallback();
    }
    let value = if decimal >= 2.0 {
        ((decimal - 1.0) * 100.0).round()
    } else {
        (-100.0 / (decimal - 1.0)).round()
    };
    if !value.is_finite() || value.abs() > CONVERTED_MAX_MAGNITUDE {
        return AmericanOdds::fallback();
    }
    AmericanOdds::new(value as i32)
}

/// Odds for the other side of a two-way market when only one side is quoted.
///
/// Heuristic placeholder: flips the sign and keeps the magnitude. It ignores
/// the bookmaker margin, so a vig-aware inverse can replace it here without
/// touching callers.
pub fn opposing_odds(known: AmericanOdds) -> AmericanOdds {
    AmericanOdds {
        value: known.value.saturating_neg(),
        is_default: known.is_default,
    }
}

/// Parse textual odds such as `"+110"`, `"-105"` or `"1.91"`.
pub fn parse_odds_text(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.'))
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.trim_start_matches('+').parse::<f64>().ok()
}
