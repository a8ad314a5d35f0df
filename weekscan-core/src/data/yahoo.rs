//! Yahoo Finance bar provider.
//!
//! Fetches OHLCV bars from Yahoo's v8 chart API for a trailing `range` (e.g. `2y`)
//! at daily or weekly interval. Handles listing-suffix mapping, retries with
//! exponential backoff, response parsing, optional split/dividend adjustment, and the
//! circuit breaker.
//!
//! Timeouts are not retried: a symbol that times out is reported as failed and the
//! scan moves on.

use super::circuit_breaker::CircuitBreaker;
use super::provider::{BarInterval, BarProvider, FetchResult, ProviderError};
use crate::domain::Bar;
use crate::symbol;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const CHART_BASE_URL: &str = "https://query2.finance.yahoo.com/v8/finance/chart";

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    open: Option<Vec<Option<f64>>>,
    high: Option<Vec<Option<f64>>>,
    low: Option<Vec<Option<f64>>>,
    close: Option<Vec<Option<f64>>>,
    volume: Option<Vec<Option<u64>>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

/// Fetch policy for the Yahoo provider.
///
/// `max_retries = 0` gives single-shot fetching; the default retries three times.
#[derive(Debug, Clone, PartialEq)]
pub struct YahooConfig {
    /// Trailing range, in Yahoo's notation (`1y`, `2y`, `5y`).
    pub range: String,
    pub interval: BarInterval,
    /// Scale OHLC by adjclose/close so splits and dividends don't fake a breakout.
    pub auto_adjust: bool,
    pub timeout: Duration,
    pub max_retries: u32,
    pub base_delay: Duration,
    /// Listing suffix appended to canonical symbols (`.NS` for NSE).
    pub exchange_suffix: String,
}

impl Default for YahooConfig {
    fn default() -> Self {
        Self {
            range: "2y".into(),
            interval: BarInterval::Weekly,
            auto_adjust: true,
            timeout: Duration::from_secs(15),
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            exchange_suffix: ".NS".into(),
        }
    }
}

pub struct YahooProvider {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    config: YahooConfig,
}

impl YahooProvider {
    pub fn new(
        config: YahooConfig,
        circuit_breaker: Arc<CircuitBreaker>,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| ProviderError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            circuit_breaker,
            config,
        })
    }

    pub fn config(&self) -> &YahooConfig {
        &self.config
    }

    fn chart_url(&self, ticker: &str) -> String {
        format!(
            "{CHART_BASE_URL}/{ticker}?range={range}&interval={interval}&includeAdjustedClose=true",
            range = self.config.range,
            interval = self.config.interval.code(),
        )
    }

    /// Parse a chart API response body into bars.
    fn parse_response(
        ticker: &str,
        resp: ChartResponse,
        auto_adjust: bool,
    ) -> Result<Vec<Bar>, ProviderError> {
        let result = resp.chart.result.ok_or_else(|| match resp.chart.error {
            Some(err) if err.code == "Not Found" => ProviderError::SymbolNotFound {
                symbol: ticker.to_string(),
            },
            Some(err) => {
                ProviderError::ResponseFormatChanged(format!("{}: {}", err.code, err.description))
            }
            None => ProviderError::ResponseFormatChanged("empty result with no error".into()),
        })?;

        let data = result
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::ResponseFormatChanged("result array is empty".into()))?;

        let Some(timestamps) = data.timestamp else {
            return Err(ProviderError::NoData {
                symbol: ticker.to_string(),
            });
        };

        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::ResponseFormatChanged("no quote data".into()))?;

        let missing = |column: &str| ProviderError::MissingColumn {
            symbol: ticker.to_string(),
            column: column.to_string(),
        };
        let opens = quote.open.ok_or_else(|| missing("Open"))?;
        let highs = quote.high.ok_or_else(|| missing("High"))?;
        let lows = quote.low.ok_or_else(|| missing("Low"))?;
        let closes = quote.close.ok_or_else(|| missing("Close"))?;
        let volumes = quote.volume.ok_or_else(|| missing("Volume"))?;

        let adj_closes = data
            .indicators
            .adjclose
            .and_then(|v| v.into_iter().next())
            .map(|a| a.adjclose);

        let mut bars = Vec::with_capacity(timestamps.len());
        for (i, &ts) in timestamps.iter().enumerate() {
            let date = chrono::DateTime::from_timestamp(ts, 0)
                .map(|dt| dt.naive_utc().date())
                .ok_or_else(|| {
                    ProviderError::ResponseFormatChanged(format!("invalid timestamp: {ts}"))
                })?;

            let open = opens.get(i).copied().flatten();
            let high = highs.get(i).copied().flatten();
            let low = lows.get(i).copied().flatten();
            let close = closes.get(i).copied().flatten();
            let volume = volumes.get(i).copied().flatten();

            // Holidays and not-yet-traded periods come back as all-null rows.
            if open.is_none()
                && high.is_none()
                && low.is_none()
                && close.is_none()
                && volume.is_none()
            {
                continue;
            }

            let mut bar = Bar::new(
                date,
                open.unwrap_or(f64::NAN),
                high.unwrap_or(f64::NAN),
                low.unwrap_or(f64::NAN),
                close.unwrap_or(f64::NAN),
                volume.unwrap_or(0),
            );

            if auto_adjust {
                let adj = adj_closes.as_ref().and_then(|v| v.get(i).copied().flatten());
                if let Some(adj) = adj {
                    if bar.close.is_finite() && bar.close > 0.0 {
                        let ratio = adj / bar.close;
                        bar.open *= ratio;
                        bar.high *= ratio;
                        bar.low *= ratio;
                        bar.close = adj;
                    }
                }
            }

            if let Err(e) = bar.validate() {
                debug!(ticker, error = %e, "bar fails OHLC checks");
            }
            bars.push(bar);
        }

        if bars.is_empty() {
            return Err(ProviderError::NoData {
                symbol: ticker.to_string(),
            });
        }

        Ok(bars)
    }

    /// Execute the request with retry and circuit breaker logic.
    fn fetch_with_retry(&self, ticker: &str) -> Result<Vec<Bar>, ProviderError> {
        if !self.circuit_breaker.is_allowed() {
            return Err(ProviderError::CircuitBreakerTripped);
        }

        let url = self.chart_url(ticker);
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = self.config.base_delay * 2u32.pow(attempt - 1);
                debug!(ticker, attempt, ?delay, "retrying chart request");
                std::thread::sleep(delay);
            }

            if !self.circuit_breaker.is_allowed() {
                return Err(ProviderError::CircuitBreakerTripped);
            }

            let resp = match self.client.get(&url).send() {
                Ok(resp) => resp,
                Err(e) if e.is_timeout() => {
                    return Err(ProviderError::Timeout {
                        timeout_secs: self.config.timeout.as_secs(),
                    });
                }
                Err(e) if e.is_connect() => {
                    last_error = Some(ProviderError::NetworkUnreachable(e.to_string()));
                    continue;
                }
                Err(e) => return Err(ProviderError::NetworkUnreachable(e.to_string())),
            };

            let status = resp.status();

            if status == reqwest::StatusCode::FORBIDDEN {
                warn!(ticker, "provider returned 403, tripping circuit breaker");
                self.circuit_breaker.trip();
                return Err(ProviderError::CircuitBreakerTripped);
            }

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                self.circuit_breaker.record_failure();
                let retry_after = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(60);
                last_error = Some(ProviderError::RateLimited {
                    retry_after_secs: retry_after,
                });
                continue;
            }

            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(ProviderError::SymbolNotFound {
                    symbol: ticker.to_string(),
                });
            }

            if !status.is_success() {
                self.circuit_breaker.record_failure();
                last_error = Some(ProviderError::Other(format!("HTTP {status} for {ticker}")));
                continue;
            }

            let chart: ChartResponse = resp.json().map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout {
                        timeout_secs: self.config.timeout.as_secs(),
                    }
                } else {
                    ProviderError::ResponseFormatChanged(format!(
                        "failed to parse response for {ticker}: {e}"
                    ))
                }
            })?;

            let bars = Self::parse_response(ticker, chart, self.config.auto_adjust)?;
            self.circuit_breaker.record_success();
            return Ok(bars);
        }

        Err(last_error.unwrap_or_else(|| ProviderError::Other("max retries exceeded".into())))
    }
}

impl BarProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch(&self, symbol: &str) -> Result<FetchResult, ProviderError> {
        let ticker = symbol::with_exchange_suffix(symbol, &self.config.exchange_suffix);
        let bars = self.fetch_with_retry(&ticker)?;
        debug!(ticker = %ticker, bars = bars.len(), "fetched bars");
        Ok(FetchResult {
            symbol: symbol::canonical(symbol),
            ticker,
            bars,
            interval: self.config.interval,
        })
    }

    fn is_available(&self) -> bool {
        self.circuit_breaker.is_allowed()
    }
}
