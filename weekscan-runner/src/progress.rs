//! Scan progress observer.
//!
//! The scanner calls these hooks as it walks the symbol list. Observers only watch;
//! they cannot change the scan's outcome.

use tracing::{debug, info, warn};

use crate::scanner::{ScanReport, SymbolOutcome};

pub trait ScanProgress: Send {
    /// Called before a symbol is fetched.
    fn on_start(&self, symbol: &str, index: usize, total: usize);

    /// Called once a symbol has a final outcome.
    fn on_complete(&self, symbol: &str, index: usize, total: usize, outcome: &SymbolOutcome);

    /// Called when the symbol list is exhausted.
    fn on_scan_complete(&self, report: &ScanReport);
}

/// Observer that ignores everything.
pub struct NoProgress;

impl ScanProgress for NoProgress {
    fn on_start(&self, _symbol: &str, _index: usize, _total: usize) {}

    fn on_complete(&self, _symbol: &str, _index: usize, _total: usize, _outcome: &SymbolOutcome) {}

    fn on_scan_complete(&self, _report: &ScanReport) {}
}

/// Observer that reports through `tracing`: failures at warn, the rest at debug.
pub struct LogProgress;

impl ScanProgress for LogProgress {
    fn on_start(&self, symbol: &str, index: usize, total: usize) {
        debug!("[{}/{}] scanning {symbol}", index + 1, total);
    }

    fn on_complete(&self, symbol: &str, index: usize, total: usize, outcome: &SymbolOutcome) {
        let position = format!("{}/{}", index + 1, total);
        match outcome {
            SymbolOutcome::FetchFailed(reason) => {
                warn!(%symbol, %position, %reason, "fetch failed, symbol skipped")
            }
            SymbolOutcome::DispatchFailed(reason) => {
                warn!(%symbol, %position, %reason, "alert dispatch failed, left unrecorded")
            }
            other => debug!(%symbol, %position, outcome = %other, "done"),
        }
    }

    fn on_scan_complete(&self, report: &ScanReport) {
        info!(
            scanned = report.outcomes.len(),
            alerted = report.emitted.len(),
            failed = report.failed_count(),
            "scan complete"
        );
    }
}

/// Observer that prints a "[i/n] SYMBOL ... outcome" line per symbol to stderr.
pub struct StderrProgress;

impl ScanProgress for StderrProgress {
    fn on_start(&self, _symbol: &str, _index: usize, _total: usize) {}

    fn on_complete(&self, symbol: &str, index: usize, total: usize, outcome: &SymbolOutcome) {
        eprintln!("[{}/{}] {symbol}: {outcome}", index + 1, total);
    }

    fn on_scan_complete(&self, report: &ScanReport) {
        eprintln!(
            "Scanned {} symbol(s): {} alerted, {} failed",
            report.outcomes.len(),
            report.emitted.len(),
            report.failed_count()
        );
    }
}
