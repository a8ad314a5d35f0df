//! Bar provider trait and structured error types.
//!
//! The BarProvider trait abstracts over market data sources so the scanner can swap
//! implementations and mock them in tests. Providers receive canonical symbols and
//! own any listing-suffix mapping and retry policy.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::Bar;

/// Structured error types for provider operations.
///
/// Every variant is recoverable at the scan level: the symbol is skipped.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("missing required column '{column}' for {symbol}")]
    MissingColumn { symbol: String, column: String },

    #[error("no data returned for {symbol}")]
    NoData { symbol: String },

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("provider error: {0}")]
    Other(String),
}

/// Bar granularity requested from a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarInterval {
    #[serde(alias = "1d")]
    Daily,
    #[serde(alias = "1wk")]
    Weekly,
}

impl BarInterval {
    /// Interval code used by chart APIs (`1d`, `1wk`).
    pub fn code(&self) -> &'static str {
        match self {
            BarInterval::Daily => "1d",
            BarInterval::Weekly => "1wk",
        }
    }
}

/// Result of a successful fetch for a single symbol.
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// Canonical symbol the caller asked for.
    pub symbol: String,
    /// Listing ticker actually requested (e.g. `RELIANCE.NS`).
    pub ticker: String,
    pub bars: Vec<Bar>,
    pub interval: BarInterval,
}

/// Trait for market data providers.
pub trait BarProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch raw OHLCV bars for a canonical symbol.
    fn fetch(&self, symbol: &str) -> Result<FetchResult, ProviderError>;

    /// Check if the provider is currently available (not rate-limited, not blocked).
    fn is_available(&self) -> bool {
        true
    }
}
