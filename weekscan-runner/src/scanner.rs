//! Scan orchestration: one pass over a symbol list.
//!
//! Per symbol: fetch → aggregate to weekly → evaluate → ledger check → send → record.
//! Anything that goes wrong with one symbol (fetch, too little data, alert transport)
//! is recorded as that symbol's outcome and the scan moves on. Ledger errors are the
//! exception: without a trustworthy ledger the scan could double-alert, so it stops.

use std::fmt;

use chrono::Weekday;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use weekscan_core::data::BarProvider;
use weekscan_core::{aggregate, evaluate, symbol, AggregateError, BreakoutReason, BreakoutRule};

use crate::clock::Clock;
use crate::ledger::{AlertLedger, LedgerError};
use crate::progress::{NoProgress, ScanProgress};
use crate::sink::{AlertSink, BreakoutAlert};

/// Errors that abort a scan.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("scan aborted: {0}")]
    Ledger(#[from] LedgerError),
}

/// Immutable settings shared by every symbol in a scan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanSettings {
    pub rule: BreakoutRule,
    /// Label weekday for aggregated weekly bars.
    pub week_ending: Weekday,
    /// Evaluate and report, but neither send alerts nor touch the ledger.
    pub dry_run: bool,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            rule: BreakoutRule::default(),
            week_ending: Weekday::Fri,
            dry_run: false,
        }
    }
}

/// What happened to one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum SymbolOutcome {
    /// New breakout, delivered and recorded.
    Alerted(BreakoutAlert),
    /// New breakout found during a dry run.
    WouldAlert(BreakoutAlert),
    /// Breakout, but this symbol was already alerted this week.
    AlreadyAlerted,
    NoBreakout,
    InsufficientData { available: usize, required: usize },
    FetchFailed(String),
    /// Breakout, but the sink failed; left out of the ledger for the next run.
    DispatchFailed(String),
}

impl SymbolOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            SymbolOutcome::FetchFailed(_) | SymbolOutcome::DispatchFailed(_)
        )
    }
}

impl fmt::Display for SymbolOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolOutcome::Alerted(a) => write!(f, "alerted (close {:.2})", a.close),
            SymbolOutcome::WouldAlert(a) => write!(f, "would alert (close {:.2})", a.close),
            SymbolOutcome::AlreadyAlerted => f.write_str("already alerted this week"),
            SymbolOutcome::NoBreakout => f.write_str("no breakout"),
            SymbolOutcome::InsufficientData {
                available,
                required,
            } => write!(f, "insufficient data ({available} weekly bars, need {required})"),
            SymbolOutcome::FetchFailed(reason) => write!(f, "fetch failed: {reason}"),
            SymbolOutcome::DispatchFailed(reason) => write!(f, "dispatch failed: {reason}"),
        }
    }
}

/// Outcome for one input symbol, in input order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolResult {
    pub symbol: String,
    pub outcome: SymbolOutcome,
}

/// Result of a completed scan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanReport {
    pub year: i32,
    pub week: u32,
    /// Alerts newly emitted by this run, in input order.
    pub emitted: Vec<BreakoutAlert>,
    pub outcomes: Vec<SymbolResult>,
    /// Records pruned by the weekly rollover at the start of the run.
    pub rolled_over: usize,
}

impl ScanReport {
    pub fn emitted_symbols(&self) -> Vec<&str> {
        self.emitted.iter().map(|a| a.symbol.as_str()).collect()
    }

    pub fn would_alert(&self) -> Vec<&BreakoutAlert> {
        self.outcomes
            .iter()
            .filter_map(|r| match &r.outcome {
                SymbolOutcome::WouldAlert(alert) => Some(alert),
                _ => None,
            })
            .collect()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|r| r.outcome.is_failure()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &SymbolResult> {
        self.outcomes.iter().filter(|r| r.outcome.is_failure())
    }

    /// Pretty-printed JSON, for piping a scan into other tools.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Walks a symbol list once, alerting each new weekly breakout exactly once.
pub struct Scanner<'a> {
    settings: ScanSettings,
    clock: &'a dyn Clock,
    provider: &'a dyn BarProvider,
    sink: &'a dyn AlertSink,
    progress: &'a dyn ScanProgress,
}

impl<'a> Scanner<'a> {
    pub fn new(
        settings: ScanSettings,
        clock: &'a dyn Clock,
        provider: &'a dyn BarProvider,
        sink: &'a dyn AlertSink,
    ) -> Self {
        Self {
            settings,
            clock,
            provider,
            sink,
            progress: &NoProgress,
        }
    }

    pub fn with_progress(mut self, progress: &'a dyn ScanProgress) -> Self {
        self.progress = progress;
        self
    }

    pub fn settings(&self) -> &ScanSettings {
        &self.settings
    }

    /// Scan `symbols` in order.
    ///
    /// The ledger is rolled over to the clock's ISO week before the first query.
    /// Holding it by `&mut` keeps the check → send → record sequence per symbol
    /// exclusive for the whole run.
    pub fn run(
        &self,
        symbols: &[String],
        ledger: &mut AlertLedger,
    ) -> Result<ScanReport, ScanError> {
        let (year, week) = self.clock.iso_week();
        let mut report = ScanReport {
            year,
            week,
            ..ScanReport::default()
        };

        if !self.settings.dry_run {
            report.rolled_over = ledger.roll_over(year, week)?;
        }

        info!(
            symbols = symbols.len(),
            year,
            week,
            provider = self.provider.name(),
            sink = self.sink.name(),
            dry_run = self.settings.dry_run,
            "scan started"
        );

        let total = symbols.len();
        for (index, raw) in symbols.iter().enumerate() {
            let symbol = symbol::canonical(raw);
            self.progress.on_start(&symbol, index, total);

            let outcome = self.scan_symbol(&symbol, year, week, ledger)?;
            if let SymbolOutcome::Alerted(alert) = &outcome {
                report.emitted.push(alert.clone());
            }

            self.progress.on_complete(&symbol, index, total, &outcome);
            report.outcomes.push(SymbolResult { symbol, outcome });
        }

        self.progress.on_scan_complete(&report);
        Ok(report)
    }

    fn scan_symbol(
        &self,
        symbol: &str,
        year: i32,
        week: u32,
        ledger: &mut AlertLedger,
    ) -> Result<SymbolOutcome, ScanError> {
        let fetched = match self.provider.fetch(symbol) {
            Ok(fetched) => fetched,
            Err(e) => return Ok(SymbolOutcome::FetchFailed(e.to_string())),
        };

        let rule = &self.settings.rule;
        let weekly = match aggregate(&fetched.bars, self.settings.week_ending) {
            Ok(weekly) => weekly,
            Err(AggregateError::InsufficientData) => {
                return Ok(SymbolOutcome::InsufficientData {
                    available: 0,
                    required: rule.required_bars(),
                })
            }
        };

        let result = evaluate(&weekly, rule);
        match result.reason {
            BreakoutReason::InsufficientData {
                available,
                required,
            } => {
                return Ok(SymbolOutcome::InsufficientData {
                    available,
                    required,
                })
            }
            BreakoutReason::NoBreakout => return Ok(SymbolOutcome::NoBreakout),
            BreakoutReason::Breakout => {}
        }

        if ledger.already_alerted(symbol, year, week)? {
            debug!(symbol, year, week, "breakout already alerted this week");
            return Ok(SymbolOutcome::AlreadyAlerted);
        }

        let Some(week_ending) = result.week_ending else {
            return Ok(SymbolOutcome::NoBreakout);
        };
        let alert = BreakoutAlert {
            symbol: symbol.to_string(),
            week_ending,
            close: result.close,
            resistance: result.resistance,
            volume_ratio: result.volume_ratio,
        };

        if self.settings.dry_run {
            return Ok(SymbolOutcome::WouldAlert(alert));
        }

        if let Err(e) = self.sink.send(&alert) {
            warn!(symbol, error = %e, "alert not delivered, will retry next run");
            return Ok(SymbolOutcome::DispatchFailed(e.to_string()));
        }

        ledger.record(symbol, year, week)?;
        info!(
            symbol,
            close = alert.close,
            resistance = alert.resistance,
            volume_ratio = alert.volume_ratio,
            "breakout alerted"
        );
        Ok(SymbolOutcome::Alerted(alert))
    }
}
