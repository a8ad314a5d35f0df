//! Breakout evaluation over a weekly series.
//!
//! The evaluator looks only at the last bar and the `lookback_weeks` bars before it.
//! It never sees ledger or alert state; deduplication is the scanner's job.

pub mod rule;

pub use rule::{BreakoutRule, RuleError};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::Bar;

/// Why an evaluation came out the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakoutReason {
    InsufficientData { available: usize, required: usize },
    Breakout,
    NoBreakout,
}

impl fmt::Display for BreakoutReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BreakoutReason::InsufficientData {
                available,
                required,
            } => write!(
                f,
                "insufficient_data ({available} weekly bars, need {required})"
            ),
            BreakoutReason::Breakout => f.write_str("breakout"),
            BreakoutReason::NoBreakout => f.write_str("no_breakout"),
        }
    }
}

/// Outcome of evaluating one weekly series.
///
/// For `InsufficientData` the numeric fields are NaN and `week_ending` is `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakoutResult {
    pub is_breakout: bool,
    pub close: f64,
    pub resistance: f64,
    pub volume_ratio: f64,
    pub week_ending: Option<NaiveDate>,
    pub reason: BreakoutReason,
}

impl BreakoutResult {
    fn insufficient(available: usize, required: usize) -> Self {
        Self {
            is_breakout: false,
            close: f64::NAN,
            resistance: f64::NAN,
            volume_ratio: f64::NAN,
            week_ending: None,
            reason: BreakoutReason::InsufficientData {
                available,
                required,
            },
        }
    }
}

/// Evaluate the breakout rule against the last bar of `series`.
///
/// `series` must be ordered oldest to newest.
pub fn evaluate(series: &[Bar], rule: &BreakoutRule) -> BreakoutResult {
    let required = rule.required_bars();
    let n = series.len();
    if n < required {
        return BreakoutResult::insufficient(n, required);
    }

    let recent = &series[n - 1];
    let window = &series[n - 1 - rule.lookback_weeks..n - 1];

    let resistance = window
        .iter()
        .map(|b| b.high)
        .fold(f64::NEG_INFINITY, f64::max);
    let avg_volume =
        window.iter().map(|b| b.volume as f64).sum::<f64>() / window.len() as f64;

    // Zero average volume is treated as non-confirming.
    let volume_ratio = if avg_volume > 0.0 {
        recent.volume as f64 / avg_volume
    } else {
        0.0
    };

    let is_breakout = recent.close > resistance && volume_ratio >= rule.min_volume_ratio;

    BreakoutResult {
        is_breakout,
        close: recent.close,
        resistance,
        volume_ratio,
        week_ending: Some(recent.period_start),
        reason: if is_breakout {
            BreakoutReason::Breakout
        } else {
            BreakoutReason::NoBreakout
        },
    }
}
