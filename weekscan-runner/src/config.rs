//! Scanner configuration, loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file) gives the stock scanner:
//! 20-week lookback, 1.2x volume, two years of weekly NSE bars, console alerts.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Weekday;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use weekscan_core::data::{BarInterval, FallbackPolicy, Universe, UniverseError, YahooConfig};
use weekscan_core::{BreakoutRule, RuleError};

use crate::ledger::AlertLedger;
use crate::scanner::ScanSettings;
use crate::sink::TelegramConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid breakout rule: {0}")]
    Rule(#[from] RuleError),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level scanner configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScannerConfig {
    pub rule: BreakoutRule,
    pub data: DataConfig,
    pub ledger: LedgerConfig,
    pub universe: UniverseConfig,
    pub alerts: AlertsConfig,
}

/// Market data settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DataConfig {
    /// Trailing range requested from the provider (`1y`, `2y`, ...).
    pub range: String,
    pub interval: BarInterval,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub exchange_suffix: String,
    /// Weekday used to label weekly bars (`fri`, `friday`, `Fri`).
    pub week_ending: Weekday,
    pub auto_adjust: bool,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            range: "2y".into(),
            interval: BarInterval::Weekly,
            timeout_secs: 15,
            max_retries: 3,
            exchange_suffix: ".NS".into(),
            week_ending: Weekday::Fri,
            auto_adjust: true,
        }
    }
}

impl DataConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn yahoo_config(&self) -> YahooConfig {
        YahooConfig {
            range: self.range.clone(),
            interval: self.interval,
            auto_adjust: self.auto_adjust,
            timeout: self.timeout(),
            max_retries: self.max_retries,
            exchange_suffix: self.exchange_suffix.clone(),
            ..YahooConfig::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LedgerConfig {
    pub path: PathBuf,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("sent_alerts.csv"),
        }
    }
}

impl LedgerConfig {
    pub fn open(&self) -> AlertLedger {
        AlertLedger::new(&self.path)
    }
}

/// Where the symbol list comes from.
///
/// A `url` (index constituents CSV with a `Symbol` column) takes precedence over
/// `csv_path` (symbols in the first column).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UniverseConfig {
    pub csv_path: PathBuf,
    pub url: Option<String>,
    pub fallback: FallbackPolicy,
}

impl Default for UniverseConfig {
    fn default() -> Self {
        Self {
            csv_path: PathBuf::from("nifty200.csv"),
            url: None,
            fallback: FallbackPolicy::Fallback,
        }
    }
}

impl UniverseConfig {
    /// Load the configured universe, applying the fallback policy on failure.
    pub fn load(&self, timeout: Duration) -> Result<Universe, UniverseError> {
        let loaded = match &self.url {
            Some(url) => Universe::from_url(url, timeout),
            None => Universe::from_csv_file(&self.csv_path),
        };
        Universe::or_fallback(loaded, self.fallback)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    #[default]
    Console,
    Telegram,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AlertsConfig {
    pub sink: SinkKind,
    pub timeout_secs: u64,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            sink: SinkKind::Console,
            timeout_secs: 5,
        }
    }
}

impl AlertsConfig {
    pub fn telegram_config(
        &self,
        bot_token: String,
        chat_id: String,
        lookback_weeks: usize,
    ) -> TelegramConfig {
        TelegramConfig {
            bot_token,
            chat_id,
            timeout: Duration::from_secs(self.timeout_secs),
            lookback_weeks,
        }
    }
}

impl ScannerConfig {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.rule.validate()?;
        if self.data.range.trim().is_empty() {
            return Err(ConfigError::Invalid("data.range must not be empty".into()));
        }
        if self.data.timeout_secs == 0 {
            return Err(ConfigError::Invalid("data.timeout_secs must be > 0".into()));
        }
        if self.alerts.timeout_secs == 0 {
            return Err(ConfigError::Invalid("alerts.timeout_secs must be > 0".into()));
        }
        if self.ledger.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("ledger.path must not be empty".into()));
        }
        Ok(())
    }

    pub fn scan_settings(&self, dry_run: bool) -> ScanSettings {
        ScanSettings {
            rule: self.rule,
            week_ending: self.data.week_ending,
            dry_run,
        }
    }
}
