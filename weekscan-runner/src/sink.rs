//! Alert sinks: where a new breakout goes once it clears deduplication.
//!
//! The scanner hands a sink a `BreakoutAlert`; the sink owns formatting and
//! transport. A sink reports failure by returning `Err`, and the scanner then leaves
//! the symbol out of the ledger so the next run in the same week retries it.

use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("alert transport failed: {0}")]
    Transport(String),

    #[error("alert transport timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("alert rejected (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("alert sink misconfigured: {0}")]
    Config(String),
}

/// Everything a sink needs to describe one breakout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakoutAlert {
    pub symbol: String,
    pub week_ending: NaiveDate,
    pub close: f64,
    pub resistance: f64,
    pub volume_ratio: f64,
}

impl BreakoutAlert {
    /// One-line form used on the console.
    pub fn summary_line(&self) -> String {
        format!(
            "[BREAKOUT] {} | Week: {} | Close: {:.2} > Resistance: {:.2} | Volume x{:.2}",
            self.symbol, self.week_ending, self.close, self.resistance, self.volume_ratio
        )
    }

    /// Multi-line form used for chat transports.
    pub fn message(&self, lookback_weeks: usize) -> String {
        format!(
            "WEEKLY BREAKOUT ALERT\n\n\
             Stock: {}\n\
             Week ending: {}\n\
             Close: {:.2}\n\
             {}W High: {:.2}\n\
             Volume: x{:.2} of {}W average",
            self.symbol,
            self.week_ending.format("%d-%m-%Y"),
            self.close,
            lookback_weeks,
            self.resistance,
            self.volume_ratio,
            lookback_weeks,
        )
    }
}

/// Trait for alert transports.
pub trait AlertSink: Send + Sync {
    /// Human-readable name of this sink.
    fn name(&self) -> &str;

    /// Deliver one alert. `Ok` means the transport accepted it.
    fn send(&self, alert: &BreakoutAlert) -> Result<(), SinkError>;
}

/// Prints one line per alert to a writer (stdout by default).
pub struct ConsoleSink {
    out: Mutex<Box<dyn Write + Send>>,
}

impl ConsoleSink {
    pub fn stdout() -> Self {
        Self::with_writer(Box::new(std::io::stdout()))
    }

    pub fn with_writer(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }
}

impl AlertSink for ConsoleSink {
    fn name(&self) -> &str {
        "console"
    }

    fn send(&self, alert: &BreakoutAlert) -> Result<(), SinkError> {
        let mut out = self
            .out
            .lock()
            .map_err(|_| SinkError::Transport("console writer poisoned".into()))?;
        writeln!(out, "{}", alert.summary_line())
            .and_then(|()| out.flush())
            .map_err(|e| SinkError::Transport(e.to_string()))
    }
}

/// Credentials and limits for the Telegram Bot API.
///
/// Passed in explicitly; nothing here reads the process environment.
#[derive(Clone, PartialEq)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
    pub timeout: Duration,
    /// Lookback shown in the message ("20W High").
    pub lookback_weeks: usize,
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"<redacted>")
            .field("chat_id", &self.chat_id)
            .field("timeout", &self.timeout)
            .field("lookback_weeks", &self.lookback_weeks)
            .finish()
    }
}

/// Sends alerts through Telegram's `sendMessage` endpoint.
pub struct TelegramSink {
    client: reqwest::blocking::Client,
    config: TelegramConfig,
    api_base: String,
}

impl TelegramSink {
    pub fn new(config: TelegramConfig) -> Result<Self, SinkError> {
        Self::with_api_base(config, TELEGRAM_API_BASE)
    }

    /// Point the sink at a different Bot API host (self-hosted bot server, tests).
    pub fn with_api_base(config: TelegramConfig, api_base: &str) -> Result<Self, SinkError> {
        if config.bot_token.trim().is_empty() || config.chat_id.trim().is_empty() {
            return Err(SinkError::Config(
                "Telegram bot token and chat id are required".into(),
            ));
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SinkError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            config,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    fn send_message_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.config.bot_token)
    }
}

impl AlertSink for TelegramSink {
    fn name(&self) -> &str {
        "telegram"
    }

    fn send(&self, alert: &BreakoutAlert) -> Result<(), SinkError> {
        let text = alert.message(self.config.lookback_weeks);
        let params = [("chat_id", self.config.chat_id.as_str()), ("text", text.as_str())];

        let resp = self
            .client
            .post(self.send_message_url())
            .form(&params)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    SinkError::Timeout {
                        timeout_secs: self.config.timeout.as_secs(),
                    }
                } else {
                    // reqwest errors can carry the URL, which embeds the token.
                    SinkError::Transport(e.without_url().to_string())
                }
            })?;

        let status = resp.status();
        if status != reqwest::StatusCode::OK {
            let body = resp.text().unwrap_or_default();
            warn!(symbol = %alert.symbol, status = status.as_u16(), "telegram rejected alert");
            return Err(SinkError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        debug!(symbol = %alert.symbol, "telegram alert delivered");
        Ok(())
    }
}
