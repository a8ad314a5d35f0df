//! Symbol universe: the list of symbols a scan walks.
//!
//! Sources, in order of preference: an index-constituents CSV fetched over HTTP
//! (column named `Symbol`, any case), or a local CSV whose first column holds the
//! symbols. A built-in basket of large caps backs both up when the caller's
//! `FallbackPolicy` allows it.

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::symbol;

/// Basket used when the universe cannot be loaded and fallback is allowed.
pub const FALLBACK_SYMBOLS: &[&str] = &[
    "RELIANCE",
    "TCS",
    "HDFCBANK",
    "INFY",
    "ICICIBANK",
    "KOTAKBANK",
    "LT",
    "SBIN",
    "BHARTIARTL",
    "HINDUNILVR",
];

#[derive(Debug, Error)]
pub enum UniverseError {
    #[error("read universe file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("fetch universe from {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("parse universe CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("universe CSV has no '{0}' column")]
    MissingColumn(String),

    #[error("universe is empty")]
    Empty,
}

/// What to do when the universe source fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Log a warning and scan the built-in basket.
    #[default]
    Fallback,
    /// Surface the error.
    Fail,
}

/// An ordered, de-duplicated list of canonical symbols.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Universe {
    symbols: Vec<String>,
}

impl Universe {
    /// Build from raw symbols: canonicalize, drop blanks and repeats, keep first-seen order.
    pub fn from_symbols<I, S>(raw: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let symbols = raw
            .into_iter()
            .map(|s| symbol::canonical(s.as_ref()))
            .filter(|s| !s.is_empty())
            .filter(|s| seen.insert(s.clone()))
            .collect();
        Self { symbols }
    }

    pub fn fallback() -> Self {
        Self::from_symbols(FALLBACK_SYMBOLS.iter().copied())
    }

    /// Parse a CSV whose first column holds symbols. The first row is a header.
    pub fn from_first_column<R: Read>(reader: R) -> Result<Self, UniverseError> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);
        let mut raw = Vec::new();
        for record in rdr.records() {
            if let Some(field) = record?.get(0) {
                raw.push(field.to_string());
            }
        }
        Self::non_empty(Self::from_symbols(raw))
    }

    /// Parse a CSV with a column named `column` (matched case-insensitively, trimmed).
    pub fn from_named_column<R: Read>(reader: R, column: &str) -> Result<Self, UniverseError> {
        let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let idx = rdr
            .headers()?
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(column))
            .ok_or_else(|| UniverseError::MissingColumn(column.to_string()))?;
        let mut raw = Vec::new();
        for record in rdr.records() {
            if let Some(field) = record?.get(idx) {
                raw.push(field.to_string());
            }
        }
        Self::non_empty(Self::from_symbols(raw))
    }

    pub fn from_csv_file(path: &Path) -> Result<Self, UniverseError> {
        let file = std::fs::File::open(path).map_err(|source| UniverseError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_first_column(file)
    }

    /// Download an index-constituents CSV and read its `Symbol` column.
    pub fn from_url(url: &str, timeout: Duration) -> Result<Self, UniverseError> {
        let fetch_err = |reason: String| UniverseError::Fetch {
            url: url.to_string(),
            reason,
        };
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| fetch_err(e.to_string()))?;
        let resp = client
            .get(url)
            .send()
            .map_err(|e| fetch_err(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(fetch_err(format!("HTTP {}", resp.status())));
        }
        let body = resp.text().map_err(|e| fetch_err(e.to_string()))?;
        Self::from_named_column(body.as_bytes(), "symbol")
    }

    /// Apply `policy` to a load attempt.
    pub fn or_fallback(
        loaded: Result<Self, UniverseError>,
        policy: FallbackPolicy,
    ) -> Result<Self, UniverseError> {
        match (loaded, policy) {
            (Ok(universe), _) => Ok(universe),
            (Err(e), FallbackPolicy::Fallback) => {
                warn!(
                    error = %e,
                    fallback = FALLBACK_SYMBOLS.len(),
                    "universe load failed, scanning the built-in fallback basket"
                );
                Ok(Self::fallback())
            }
            (Err(e), FallbackPolicy::Fail) => Err(e),
        }
    }

    fn non_empty(universe: Self) -> Result<Self, UniverseError> {
        if universe.symbols.is_empty() {
            Err(UniverseError::Empty)
        } else {
            Ok(universe)
        }
    }

    /// Keep only the first `max` symbols.
    pub fn truncate(&mut self, max: usize) {
        self.symbols.truncate(max);
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn into_symbols(self) -> Vec<String> {
        self.symbols
    }
}
