//! BDD tests for the scan loop: deduplication, failure isolation, rollover.
//!
//! Providers and sinks are in-memory stand-ins; the ledger is a real CSV file
//! in a temp directory.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::NaiveDate;
use weekscan_core::data::{BarInterval, BarProvider, FetchResult, ProviderError};
use weekscan_core::Bar;
use weekscan_runner::{
    AlertLedger, AlertRecord, AlertSink, BreakoutAlert, FixedClock, LedgerError, ScanError,
    ScanProgress, ScanReport, ScanSettings, Scanner, SinkError, SymbolOutcome,
};

// ── Stand-ins ──

#[derive(Default)]
struct StubProvider {
    bars: HashMap<String, Vec<Bar>>,
    fetched: Mutex<Vec<String>>,
}

impl StubProvider {
    fn with(mut self, symbol: &str, bars: Vec<Bar>) -> Self {
        self.bars.insert(symbol.to_string(), bars);
        self
    }

    fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

impl BarProvider for StubProvider {
    fn name(&self) -> &str {
        "stub"
    }

    fn fetch(&self, symbol: &str) -> Result<FetchResult, ProviderError> {
        self.fetched.lock().unwrap().push(symbol.to_string());
        match self.bars.get(symbol) {
            Some(bars) => Ok(FetchResult {
                symbol: symbol.to_string(),
                ticker: format!("{symbol}.NS"),
                bars: bars.clone(),
                interval: BarInterval::Weekly,
            }),
            None => Err(ProviderError::SymbolNotFound {
                symbol: symbol.to_string(),
            }),
        }
    }
}

/// Sink that fails its first `failures` sends, then delivers.
#[derive(Default)]
struct RecordingSink {
    failures: Mutex<usize>,
    sent: Mutex<Vec<BreakoutAlert>>,
}

impl RecordingSink {
    fn failing(failures: usize) -> Self {
        Self {
            failures: Mutex::new(failures),
            sent: Mutex::default(),
        }
    }

    fn sent_symbols(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|a| a.symbol.clone())
            .collect()
    }
}

impl AlertSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    fn send(&self, alert: &BreakoutAlert) -> Result<(), SinkError> {
        let mut failures = self.failures.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            return Err(SinkError::Transport("connection reset".into()));
        }
        self.sent.lock().unwrap().push(alert.clone());
        Ok(())
    }
}

#[derive(Default)]
struct RecordingProgress {
    events: Mutex<Vec<String>>,
}

impl ScanProgress for RecordingProgress {
    fn on_start(&self, symbol: &str, index: usize, total: usize) {
        self.events
            .lock()
            .unwrap()
            .push(format!("start {symbol} {index}/{total}"));
    }

    fn on_complete(&self, symbol: &str, index: usize, total: usize, _outcome: &SymbolOutcome) {
        self.events
            .lock()
            .unwrap()
            .push(format!("done {symbol} {index}/{total}"));
    }

    fn on_scan_complete(&self, report: &ScanReport) {
        self.events
            .lock()
            .unwrap()
            .push(format!("complete {}", report.outcomes.len()));
    }
}

// ── Fixtures ──

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

/// Wednesday of ISO week 2024-W33.
fn week_33() -> FixedClock {
    FixedClock(d(2024, 8, 14))
}

/// `count` Friday-labeled weekly bars ending 2024-08-16; the last one closes at
/// `last_close` on `last_volume`, the rest top out at 100 on 1M shares.
fn weekly(count: usize, last_close: f64, last_volume: u64) -> Vec<Bar> {
    let last_friday = d(2024, 8, 16);
    (0..count)
        .map(|i| {
            let date = last_friday - chrono::Duration::weeks((count - 1 - i) as i64);
            if i + 1 == count {
                Bar::new(date, 99.0, last_close.max(100.0) + 1.0, 98.0, last_close, last_volume)
            } else {
                Bar::new(date, 97.0, 100.0, 94.0, 98.5, 1_000_000)
            }
        })
        .collect()
}

fn breaking_out() -> Vec<Bar> {
    weekly(22, 105.0, 1_300_000)
}

fn flat() -> Vec<Bar> {
    weekly(22, 99.0, 1_000_000)
}

fn symbols(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn ledger_in(dir: &tempfile::TempDir) -> AlertLedger {
    AlertLedger::new(dir.path().join("sent_alerts.csv"))
}

fn outcome_of<'r>(report: &'r ScanReport, symbol: &str) -> &'r SymbolOutcome {
    &report
        .outcomes
        .iter()
        .find(|r| r.symbol == symbol)
        .unwrap()
        .outcome
}

// ── Scenarios ──

#[test]
fn bdd_second_run_in_same_week_does_not_realert() {
    // GIVEN a breakout on RELIANCE and an empty ledger in ISO week 2024-W33
    let dir = tempfile::tempdir().unwrap();
    let mut ledger = ledger_in(&dir);
    let provider = StubProvider::default().with("RELIANCE", breaking_out());
    let sink = RecordingSink::default();
    let clock = week_33();
    let scanner = Scanner::new(ScanSettings::default(), &clock, &provider, &sink);

    // WHEN the scan runs twice in the same week
    let first = scanner.run(&symbols(&["RELIANCE"]), &mut ledger).unwrap();
    let second = scanner.run(&symbols(&["RELIANCE"]), &mut ledger).unwrap();

    // THEN the alert is sent once and recorded once
    assert_eq!(first.emitted_symbols(), vec!["RELIANCE"]);
    assert!(matches!(outcome_of(&first, "RELIANCE"), SymbolOutcome::Alerted(_)));
    assert!(second.emitted.is_empty());
    assert_eq!(outcome_of(&second, "RELIANCE"), &SymbolOutcome::AlreadyAlerted);
    assert_eq!(sink.sent_symbols(), vec!["RELIANCE"]);
    assert_eq!(
        ledger.records().unwrap(),
        vec![AlertRecord::new("RELIANCE", 2024, 33)]
    );
    assert_eq!((first.year, first.week), (2024, 33));
}

#[test]
fn bdd_new_week_rolls_over_and_alerts_again() {
    // GIVEN a ledger holding last week's alert for TCS
    let dir = tempfile::tempdir().unwrap();
    let mut ledger = ledger_in(&dir);
    ledger.record("TCS", 2024, 33).unwrap();
    let provider = StubProvider::default().with("TCS", breaking_out());
    let sink = RecordingSink::default();
    let clock = FixedClock(d(2024, 8, 21));
    let scanner = Scanner::new(ScanSettings::default(), &clock, &provider, &sink);

    // WHEN the scan runs in week 34
    let report = scanner.run(&symbols(&["TCS"]), &mut ledger).unwrap();

    // THEN the old record is pruned before the check and TCS alerts again
    assert_eq!(report.rolled_over, 1);
    assert_eq!(report.emitted_symbols(), vec!["TCS"]);
    assert_eq!(ledger.records().unwrap(), vec![AlertRecord::new("TCS", 2024, 34)]);
}

#[test]
fn bdd_failed_dispatch_is_retried_next_run() {
    // GIVEN a sink whose first send fails
    let dir = tempfile::tempdir().unwrap();
    let mut ledger = ledger_in(&dir);
    let provider = StubProvider::default().with("INFY", breaking_out());
    let sink = RecordingSink::failing(1);
    let clock = week_33();
    let scanner = Scanner::new(ScanSettings::default(), &clock, &provider, &sink);

    // WHEN the first run hits the failure
    let first = scanner.run(&symbols(&["INFY"]), &mut ledger).unwrap();

    // THEN nothing is recorded and the failure is reported
    assert!(matches!(outcome_of(&first, "INFY"), SymbolOutcome::DispatchFailed(_)));
    assert_eq!(first.failed_count(), 1);
    assert!(first.emitted.is_empty());
    assert!(ledger.records().unwrap().is_empty());

    // AND the next run in the same week delivers it
    let second = scanner.run(&symbols(&["INFY"]), &mut ledger).unwrap();
    assert_eq!(second.emitted_symbols(), vec!["INFY"]);
    assert_eq!(sink.sent_symbols(), vec!["INFY"]);
    assert!(ledger.already_alerted("INFY", 2024, 33).unwrap());
}

#[test]
fn bdd_fetch_failure_does_not_abort_the_batch() {
    // GIVEN one symbol the provider does not know
    let dir = tempfile::tempdir().unwrap();
    let mut ledger = ledger_in(&dir);
    let provider = StubProvider::default().with("HDFCBANK", breaking_out());
    let sink = RecordingSink::default();
    let clock = week_33();
    let scanner = Scanner::new(ScanSettings::default(), &clock, &provider, &sink);

    // WHEN it comes first in the list
    let report = scanner
        .run(&symbols(&["DELISTED", "HDFCBANK"]), &mut ledger)
        .unwrap();

    // THEN it is skipped and the rest of the list is scanned
    assert!(matches!(outcome_of(&report, "DELISTED"), SymbolOutcome::FetchFailed(_)));
    assert_eq!(report.emitted_symbols(), vec!["HDFCBANK"]);
    assert_eq!(report.failed_count(), 1);
    assert_eq!(report.failures().count(), 1);
}

#[test]
fn bdd_corrupt_ledger_aborts_the_run() {
    // GIVEN a ledger file with the wrong columns
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sent_alerts.csv");
    std::fs::write(&path, "Ticker,When\nTCS,yesterday\n").unwrap();
    let mut ledger = AlertLedger::new(&path);
    let provider = StubProvider::default().with("TCS", breaking_out());
    let sink = RecordingSink::default();
    let clock = week_33();
    let scanner = Scanner::new(ScanSettings::default(), &clock, &provider, &sink);

    // WHEN the scan starts
    let err = scanner.run(&symbols(&["TCS"]), &mut ledger).unwrap_err();

    // THEN it stops with a ledger error before anything is sent
    assert!(matches!(err, ScanError::Ledger(LedgerError::Corrupt { .. })));
    assert!(sink.sent_symbols().is_empty());
    assert!(provider.fetched().is_empty());
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "Ticker,When\nTCS,yesterday\n"
    );
}

#[test]
fn bdd_outcomes_follow_input_order_with_canonical_symbols() {
    // GIVEN a mix of breakout, short history, flat, and suffixed input symbols
    let dir = tempfile::tempdir().unwrap();
    let mut ledger = ledger_in(&dir);
    let provider = StubProvider::default()
        .with("TCS", breaking_out())
        .with("RELIANCE", breaking_out())
        .with("NEWLIST", weekly(5, 105.0, 2_000_000))
        .with("ITC", flat())
        .with("EMPTY", Vec::new());
    let sink = RecordingSink::default();
    let clock = week_33();
    let scanner = Scanner::new(ScanSettings::default(), &clock, &provider, &sink);

    // WHEN the scan runs
    let report = scanner
        .run(
            &symbols(&["tcs", "RELIANCE.NS", "NEWLIST", "ITC", "EMPTY"]),
            &mut ledger,
        )
        .unwrap();

    // THEN outcomes are reported in input order under canonical symbols
    let order: Vec<&str> = report.outcomes.iter().map(|r| r.symbol.as_str()).collect();
    assert_eq!(order, vec!["TCS", "RELIANCE", "NEWLIST", "ITC", "EMPTY"]);
    assert_eq!(provider.fetched(), vec!["TCS", "RELIANCE", "NEWLIST", "ITC", "EMPTY"]);
    assert_eq!(report.emitted_symbols(), vec!["TCS", "RELIANCE"]);
    assert_eq!(
        outcome_of(&report, "NEWLIST"),
        &SymbolOutcome::InsufficientData {
            available: 5,
            required: 22
        }
    );
    assert_eq!(
        outcome_of(&report, "EMPTY"),
        &SymbolOutcome::InsufficientData {
            available: 0,
            required: 22
        }
    );
    assert_eq!(outcome_of(&report, "ITC"), &SymbolOutcome::NoBreakout);
    assert_eq!(report.failed_count(), 0);
}

#[test]
fn bdd_duplicate_input_symbol_alerts_once() {
    let dir = tempfile::tempdir().unwrap();
    let mut ledger = ledger_in(&dir);
    let provider = StubProvider::default().with("SBIN", breaking_out());
    let sink = RecordingSink::default();
    let clock = week_33();
    let scanner = Scanner::new(ScanSettings::default(), &clock, &provider, &sink);

    let report = scanner
        .run(&symbols(&["SBIN", "sbin.ns"]), &mut ledger)
        .unwrap();

    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(report.outcomes[1].outcome, SymbolOutcome::AlreadyAlerted);
    assert_eq!(sink.sent_symbols(), vec!["SBIN"]);
    assert_eq!(ledger.records().unwrap().len(), 1);
}

#[test]
fn bdd_dry_run_neither_sends_nor_records() {
    // GIVEN a stale record from a previous week and a dry-run scan
    let dir = tempfile::tempdir().unwrap();
    let mut ledger = ledger_in(&dir);
    ledger.record("OLD", 2024, 30).unwrap();
    let before = std::fs::read_to_string(ledger.path()).unwrap();
    let provider = StubProvider::default().with("TCS", breaking_out());
    let sink = RecordingSink::default();
    let clock = week_33();
    let settings = ScanSettings {
        dry_run: true,
        ..ScanSettings::default()
    };
    let scanner = Scanner::new(settings, &clock, &provider, &sink);

    // WHEN the scan runs
    let report = scanner.run(&symbols(&["TCS"]), &mut ledger).unwrap();

    // THEN the breakout is reported but the sink and ledger are untouched
    assert!(report.emitted.is_empty());
    assert_eq!(report.would_alert().len(), 1);
    assert_eq!(report.would_alert()[0].symbol, "TCS");
    assert!(sink.sent_symbols().is_empty());
    assert_eq!(report.rolled_over, 0);
    assert_eq!(std::fs::read_to_string(ledger.path()).unwrap(), before);
}

#[test]
fn bdd_alert_carries_breakout_figures() {
    let dir = tempfile::tempdir().unwrap();
    let mut ledger = ledger_in(&dir);
    let provider = StubProvider::default().with("LT", breaking_out());
    let sink = RecordingSink::default();
    let clock = week_33();
    let scanner = Scanner::new(ScanSettings::default(), &clock, &provider, &sink);

    scanner.run(&symbols(&["LT"]), &mut ledger).unwrap();

    let sent = sink.sent.lock().unwrap();
    let alert = &sent[0];
    assert_eq!(alert.symbol, "LT");
    assert_eq!(alert.close, 105.0);
    assert_eq!(alert.resistance, 100.0);
    assert!((alert.volume_ratio - 1.3).abs() < 1e-9);
    assert_eq!(alert.week_ending, d(2024, 8, 16));
}

#[test]
fn bdd_friday_missing_only_its_open_still_breaks_out() {
    // GIVEN 21 flat weeks, then daily bars for week 33 where Friday has no open
    let dir = tempfile::tempdir().unwrap();
    let mut ledger = ledger_in(&dir);
    let mut bars: Vec<Bar> = (1..=21)
        .rev()
        .map(|w| {
            let date = d(2024, 8, 16) - chrono::Duration::weeks(w);
            Bar::new(date, 97.0, 100.0, 94.0, 98.5, 1_000_000)
        })
        .collect();
    bars.push(Bar::new(d(2024, 8, 12), 98.0, 99.5, 97.5, 99.0, 400_000));
    bars.push(Bar::new(d(2024, 8, 16), f64::NAN, 106.0, 99.0, 105.0, 900_000));
    let provider = StubProvider::default().with("HDFCBANK", bars);
    let sink = RecordingSink::default();
    let clock = week_33();
    let scanner = Scanner::new(ScanSettings::default(), &clock, &provider, &sink);

    // WHEN the scan runs
    let report = scanner.run(&symbols(&["HDFCBANK"]), &mut ledger).unwrap();

    // THEN Friday's close and volume drive the weekly bar and the breakout fires
    assert_eq!(report.emitted_symbols(), vec!["HDFCBANK"]);
    let sent = sink.sent.lock().unwrap();
    assert_eq!(sent[0].close, 105.0);
    assert_eq!(sent[0].resistance, 100.0);
    assert!((sent[0].volume_ratio - 1.3).abs() < 1e-9);
}

#[test]
fn bdd_progress_sees_every_symbol_once() {
    let dir = tempfile::tempdir().unwrap();
    let mut ledger = ledger_in(&dir);
    let provider = StubProvider::default().with("TCS", flat());
    let sink = RecordingSink::default();
    let progress = RecordingProgress::default();
    let clock = week_33();
    let scanner =
        Scanner::new(ScanSettings::default(), &clock, &provider, &sink).with_progress(&progress);

    scanner
        .run(&symbols(&["TCS", "MISSING"]), &mut ledger)
        .unwrap();

    assert_eq!(
        *progress.events.lock().unwrap(),
        vec![
            "start TCS 0/2",
            "done TCS 0/2",
            "start MISSING 1/2",
            "done MISSING 1/2",
            "complete 2",
        ]
    );
}

#[test]
fn bdd_report_serializes_outcomes_as_json() {
    let dir = tempfile::tempdir().unwrap();
    let mut ledger = ledger_in(&dir);
    let provider = StubProvider::default().with("TCS", breaking_out());
    let sink = RecordingSink::default();
    let clock = week_33();
    let scanner = Scanner::new(ScanSettings::default(), &clock, &provider, &sink);

    let report = scanner
        .run(&symbols(&["TCS", "GONE"]), &mut ledger)
        .unwrap();
    let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();

    assert_eq!(json["year"], 2024);
    assert_eq!(json["week"], 33);
    assert_eq!(json["emitted"][0]["symbol"], "TCS");
    assert_eq!(json["outcomes"][0]["outcome"]["outcome"], "alerted");
    assert_eq!(json["outcomes"][1]["outcome"]["outcome"], "fetch_failed");
}
