//! Weekscan Runner: scan orchestration, alert ledger, alert sinks, configuration.
//!
//! This crate builds on `weekscan-core` to provide:
//! - The per-week alert ledger (CSV, atomic rewrite, weekly rollover)
//! - Alert sinks (console, Telegram Bot API)
//! - The scan loop that turns a symbol list into at most one alert per symbol per ISO week
//! - TOML configuration with defaults for every field

pub mod clock;
pub mod config;
pub mod ledger;
pub mod progress;
pub mod scanner;
pub mod sink;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{
    AlertsConfig, ConfigError, DataConfig, LedgerConfig, ScannerConfig, SinkKind, UniverseConfig,
};
pub use ledger::{AlertLedger, AlertRecord, LedgerError};
pub use progress::{LogProgress, NoProgress, ScanProgress, StderrProgress};
pub use scanner::{ScanError, ScanReport, ScanSettings, Scanner, SymbolOutcome, SymbolResult};
pub use sink::{AlertSink, BreakoutAlert, ConsoleSink, SinkError, TelegramConfig, TelegramSink};
