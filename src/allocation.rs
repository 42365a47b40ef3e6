//! Order sizing for a single sheet row
//!
//! The notional for a symbol is
//!
//! ```text
//! notional = buying_power * bracket_pct * icon_mult * (long_ma / price) * sentiment_mult
//! ```
//!
//! rounded half-up to cents. Rows that cannot be sized are skipped with a
//! reason instead of failing the run.

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::fmt;

/// Smallest order the broker will accept, in dollars.
pub const MIN_NOTIONAL: Decimal = Decimal::ONE;

/// Used when the sentiment cell is blank, unparseable or not positive.
pub const DEFAULT_SENTIMENT_MULT: f64 = 0.1;

/// Bands of "% down from ATH", checked in order. Each entry is
/// (exclusive upper bound, bracket fraction); the first band also
/// includes its lower bound of 0.
pub const BRACKETS: &[(f64, f64)] = &[
    (25.0, 0.05),
    (50.0, 0.10),
    (75.0, 0.15),
    (f64::INFINITY, 0.20),
];

/// Icon glyph from column P -> conviction multiplier.
pub const ICON_MULTIPLIERS: &[(&str, f64)] = &[
    ("💎", 1.0),
    ("💥", 0.9),
    ("🚀", 0.8),
    ("✨", 0.7),
    ("📊", 0.6),
];

// Sheet formatting noise: percent signs, currency symbols, thousands separators
static CELL_NOISE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[%$,\s]").expect("valid regex"));

/// One signal row as read from the sheet. Numeric cells are kept as text
/// and parsed during evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct RowRecord {
    pub symbol: String,
    pub price: String,
    pub percent_down_from_ath: String,
    pub long_moving_average: String,
    pub icon: String,
    pub sentiment: Option<String>,
}

impl RowRecord {
    pub fn new(symbol: &str) -> Self {
        RowRecord {
            symbol: normalize_symbol(symbol),
            price: String::new(),
            percent_down_from_ath: String::new(),
            long_moving_average: String::new(),
            icon: String::new(),
            sentiment: None,
        }
    }
}

/// Why a symbol produced no order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "String")]
pub enum SkipReason {
    InvalidFields,
    NegativePercentDown,
    UnknownIcon,
    ComputationFailed,
    BelowMinimumNotional,
    SubmissionFailed(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::InvalidFields => f.write_str("invalid-fields"),
            SkipReason::NegativePercentDown => f.write_str("negative-pct-down"),
            SkipReason::UnknownIcon => f.write_str("unknown-icon"),
            SkipReason::ComputationFailed => f.write_str("computation-failed"),
            SkipReason::BelowMinimumNotional => f.write_str("below-minimum"),
            SkipReason::SubmissionFailed(cause) => write!(f, "submission-failed:{}", cause),
        }
    }
}

impl From<SkipReason> for String {
    fn from(reason: SkipReason) -> Self {
        reason.to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AllocationResult {
    Valid { symbol: String, notional: Decimal },
    Skipped { symbol: String, reason: SkipReason },
}

/// Every factor that went into a notional, kept for debug logging.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sizing {
    pub bracket_pct: f64,
    pub icon_mult: f64,
    pub ma_factor: f64,
    pub sentiment_mult: f64,
    pub notional: f64,
}

pub fn normalize_symbol(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Parse a sheet cell as a number. Blank or unparseable cells give None.
pub fn parse_cell(raw: &str) -> Option<f64> {
    let cleaned = CELL_NOISE.replace_all(raw, "");
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok()
}

/// Bracket fraction for a percent-down value. None for negative or NaN input.
pub fn bracket_pct(percent_down: f64) -> Option<f64> {
    if percent_down.is_nan() || percent_down < 0.0 {
        return None;
    }
    BRACKETS
        .iter()
        .find(|(upper, _)| percent_down <= *upper)
        .map(|(_, pct)| *pct)
}

pub fn icon_multiplier(icon: &str) -> Option<f64> {
    let icon = icon.trim();
    ICON_MULTIPLIERS
        .iter()
        .find(|(glyph, _)| *glyph == icon)
        .map(|(_, mult)| *mult)
}

pub fn sentiment_multiplier(raw: Option<&str>) -> f64 {
    match raw.and_then(parse_cell) {
        Some(v) if v > 0.0 => v,
        _ => DEFAULT_SENTIMENT_MULT,
    }
}

/// Round to cents, half away from zero. None for NaN, infinities and
/// values outside `Decimal`'s range (about ±7.9e28).
pub fn round_notional(notional: f64) -> Option<Decimal> {
    Decimal::from_f64(notional)
        .map(|d| d.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
}

/// Compute the raw (unrounded) sizing for a row.
pub fn size_row(row: &RowRecord, buying_power: f64) -> Result<Sizing, SkipReason> {
    let price = parse_cell(&row.price);
    let percent_down = parse_cell(&row.percent_down_from_ath);
    let long_ma = parse_cell(&row.long_moving_average);

    if matches!(percent_down, Some(p) if p < 0.0) {
        return Err(SkipReason::NegativePercentDown);
    }

    let (price, percent_down, long_ma) = match (price, percent_down, long_ma) {
        (Some(price), Some(pct), Some(ma))
            if price.is_finite() && pct.is_finite() && ma.is_finite() && price > 0.0 && ma > 0.0 =>
        {
            (price, pct, ma)
        }
        _ => return Err(SkipReason::InvalidFields),
    };

    let bracket_pct = bracket_pct(percent_down).ok_or(SkipReason::NegativePercentDown)?;
    let icon_mult = icon_multiplier(&row.icon).ok_or(SkipReason::UnknownIcon)?;
    let ma_factor = long_ma / price;
    let sentiment_mult = sentiment_multiplier(row.sentiment.as_deref());

    let base_alloc = buying_power * bracket_pct;
    let notional = base_alloc * icon_mult * ma_factor * sentiment_mult;

    if ![base_alloc, ma_factor, sentiment_mult, notional].iter().all(|v| v.is_finite()) {
        return Err(SkipReason::ComputationFailed);
    }

    Ok(Sizing {
        bracket_pct,
        icon_mult,
        ma_factor,
        sentiment_mult,
        notional,
    })
}

/// Size one row against the account's buying power.
///
/// Total over its inputs: every row yields either a rounded notional of at
/// least [`MIN_NOTIONAL`] or a skip reason.
pub fn evaluate(row: &RowRecord, buying_power: f64) -> AllocationResult {
    settle(row.symbol.clone(), size_row(row, buying_power))
}

/// Round a sizing to cents and apply the minimum-notional check.
///
/// A finite notional too large for `Decimal` is reported as
/// [`SkipReason::ComputationFailed`], the same as a non-finite one.
pub fn settle(symbol: String, sized: Result<Sizing, SkipReason>) -> AllocationResult {
    let reason = match sized.map(|s| round_notional(s.notional)) {
        Ok(Some(notional)) if notional >= MIN_NOTIONAL => {
            return AllocationResult::Valid { symbol, notional };
        }
        Ok(Some(_)) => SkipReason::BelowMinimumNotional,
        Ok(None) => SkipReason::ComputationFailed,
        Err(reason) => reason,
    };
    AllocationResult::Skipped { symbol, reason }
}
