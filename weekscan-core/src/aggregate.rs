//! Weekly aggregation: folds finer-grained bars into one bar per ISO week.
//!
//! Each bucket is the ISO week containing a bar's `period_start`. The output bar is
//! labeled with the configured week-ending weekday of that ISO week, so daily bars
//! Mon..Fri and an already-weekly bar labeled Friday land in the same bucket. That
//! is what makes re-aggregation of a weekly series a no-op.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, Weekday};
use thiserror::Error;

use crate::domain::Bar;

/// A canonical weekly series: strictly increasing `period_start`, one bar per week.
pub type WeeklySeries = Vec<Bar>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregateError {
    #[error("insufficient data: no usable bars after weekly aggregation")]
    InsufficientData,
}

/// ISO (year, week) key of the week containing `date`.
pub fn iso_week_key(date: NaiveDate) -> (i32, u32) {
    let iso = date.iso_week();
    (iso.year(), iso.week())
}

/// Label date for an ISO week: the given weekday inside that week.
pub fn week_label(year: i32, week: u32, week_ending: Weekday) -> Option<NaiveDate> {
    NaiveDate::from_isoywd_opt(year, week, week_ending)
}

/// Aggregate bars into a weekly series.
///
/// Open = first, High = max, Low = min, Close = last, Volume = saturating sum over
/// each bucket. Prices fold field by field over non-NaN values, so a day missing
/// only its open still supplies its close, high, and low. A week where any price
/// field has no value at all is absent from the output rather than filled in.
pub fn aggregate(bars: &[Bar], week_ending: Weekday) -> Result<WeeklySeries, AggregateError> {
    let mut buckets: BTreeMap<(i32, u32), Vec<&Bar>> = BTreeMap::new();
    for bar in bars {
        buckets
            .entry(iso_week_key(bar.period_start))
            .or_default()
            .push(bar);
    }

    let mut series = Vec::with_capacity(buckets.len());
    for ((year, week), mut members) in buckets {
        members.sort_by_key(|b| b.period_start);

        let Some(label) = week_label(year, week, week_ending) else {
            continue;
        };
        let open = members.iter().map(|b| b.open).find(|v| !v.is_nan());
        let close = members.iter().rev().map(|b| b.close).find(|v| !v.is_nan());
        // f64::max/min skip a NaN operand; the fold stays infinite when every value is NaN.
        let high = members.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
        let low = members.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
        let (Some(open), Some(close)) = (open, close) else {
            continue;
        };
        if !high.is_finite() || !low.is_finite() {
            continue;
        }
        let volume = members
            .iter()
            .fold(0u64, |acc, b| acc.saturating_add(b.volume));

        series.push(Bar {
            period_start: label,
            open,
            high,
            low,
            close,
            volume,
        });
    }

    if series.is_empty() {
        return Err(AggregateError::InsufficientData);
    }
    Ok(series)
}
