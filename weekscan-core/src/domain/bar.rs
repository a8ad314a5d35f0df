//! Bar: one OHLCV period (a trading day or a trading week).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// OHLCV bar for a single period.
///
/// `period_start` is the bar's label date. For daily bars this is the trading day;
/// for aggregated weekly bars it is the configured week-ending weekday of that week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub period_start: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// Reasons a bar fails validation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BarError {
    #[error("bar {date} has a missing (NaN) price")]
    Void { date: NaiveDate },

    #[error("bar {date} violates high/low bounds (o={open} h={high} l={low} c={close})")]
    OutOfBounds {
        date: NaiveDate,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    },
}

impl Bar {
    pub fn new(
        period_start: NaiveDate,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: u64,
    ) -> Self {
        Self {
            period_start,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Returns true if any price field is NaN (void bar).
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// OHLC sanity check: high >= max(open, close), low <= min(open, close).
    pub fn is_sane(&self) -> bool {
        self.validate().is_ok()
    }

    pub fn validate(&self) -> Result<(), BarError> {
        if self.is_void() {
            return Err(BarError::Void {
                date: self.period_start,
            });
        }
        let in_bounds = self.high >= self.open.max(self.close)
            && self.low <= self.open.min(self.close)
            && self.high >= self.low;
        if !in_bounds {
            return Err(BarError::OutOfBounds {
                date: self.period_start,
                open: self.open,
                high: self.high,
                low: self.low,
                close: self.close,
            });
        }
        Ok(())
    }
}
