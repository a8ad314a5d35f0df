//! Alert ledger: the per-week record of symbols already alerted.
//!
//! A CSV table with exactly three columns, `Symbol,Year,Week`, one row per alert.
//! Every operation loads the whole table; at a few hundred symbols a week there is
//! nothing to stream. Writes go to a sibling temp file which is then renamed over
//! the ledger, so a crash mid-write leaves the previous table intact.
//!
//! A missing file is an empty ledger. A file that exists but cannot be parsed is
//! `LedgerError::Corrupt`: the scan must stop rather than guess which alerts went out.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use weekscan_core::symbol;

const HEADER: [&str; 3] = ["Symbol", "Year", "Week"];

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("alert ledger {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("alert ledger {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
}

/// One alert: `symbol` was alerted during ISO week (`year`, `week`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlertRecord {
    #[serde(rename = "Symbol")]
    pub symbol: String,
    #[serde(rename = "Year")]
    pub year: i32,
    #[serde(rename = "Week")]
    pub week: u32,
}

impl AlertRecord {
    /// Record with the symbol in canonical form.
    pub fn new(symbol: &str, year: i32, week: u32) -> Self {
        Self {
            symbol: symbol::canonical(symbol),
            year,
            week,
        }
    }
}

/// CSV-backed alert ledger.
///
/// Single writer: the scanner holds it by `&mut` for a whole run, which keeps the
/// `already_alerted` → send → `record` sequence for a symbol free of interleaving.
#[derive(Debug, Clone)]
pub struct AlertLedger {
    path: PathBuf,
}

impl AlertLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All records, in file order. A missing file yields an empty list.
    pub fn records(&self) -> Result<Vec<AlertRecord>, LedgerError> {
        let file = match fs::File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(LedgerError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let mut rdr = csv::Reader::from_reader(file);
        let headers = rdr.headers().map_err(|e| self.corrupt(e))?;
        // Zero-byte file: empty, not corrupt.
        if headers.is_empty() {
            return Ok(Vec::new());
        }
        if headers.iter().map(str::trim).ne(HEADER) {
            return Err(self.corrupt(format!(
                "expected header {}, found {}",
                HEADER.join(","),
                headers.iter().collect::<Vec<_>>().join(",")
            )));
        }

        let mut records = Vec::new();
        for row in rdr.deserialize::<AlertRecord>() {
            let mut record = row.map_err(|e| self.corrupt(e))?;
            record.symbol = symbol::canonical(&record.symbol);
            records.push(record);
        }
        Ok(records)
    }

    /// Whether `symbol` was already alerted in ISO week (`year`, `week`).
    pub fn already_alerted(&self, symbol: &str, year: i32, week: u32) -> Result<bool, LedgerError> {
        let wanted = AlertRecord::new(symbol, year, week);
        Ok(self.records()?.iter().any(|r| *r == wanted))
    }

    /// Append a record. The caller checks `already_alerted` first.
    pub fn record(&mut self, symbol: &str, year: i32, week: u32) -> Result<(), LedgerError> {
        let mut records = self.records()?;
        records.push(AlertRecord::new(symbol, year, week));
        self.write_all(&records)?;
        debug!(symbol, year, week, "alert recorded");
        Ok(())
    }

    /// Drop every record not in ISO week (`year`, `week`). Returns how many were pruned.
    ///
    /// Run once at the start of each scan so a new week starts with an empty
    /// suppression set. Duplicate rows of the current week collapse to one.
    pub fn roll_over(&mut self, year: i32, week: u32) -> Result<usize, LedgerError> {
        if !self.path.exists() {
            return Ok(0);
        }
        let records = self.records()?;
        let before = records.len();

        let mut seen = HashSet::new();
        let kept: Vec<AlertRecord> = records
            .into_iter()
            .filter(|r| r.year == year && r.week == week)
            .filter(|r| seen.insert(r.clone()))
            .collect();

        let pruned = before - kept.len();
        self.write_all(&kept)?;
        if pruned > 0 {
            info!(pruned, year, week, "alert ledger rolled over");
        }
        Ok(pruned)
    }

    fn write_all(&self, records: &[AlertRecord]) -> Result<(), LedgerError> {
        let io_err = |source: io::Error| LedgerError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
        }

        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        let to_io = |e: csv::Error| io::Error::new(io::ErrorKind::Other, e);
        wtr.write_record(HEADER).map_err(to_io).map_err(io_err)?;
        for r in records {
            wtr.serialize(r).map_err(to_io).map_err(io_err)?;
        }
        let bytes = wtr
            .into_inner()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))
            .map_err(io_err)?;

        let tmp = self.path.with_extension("csv.tmp");
        fs::write(&tmp, bytes).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            io_err(e)
        })?;
        Ok(())
    }

    fn corrupt(&self, reason: impl ToString) -> LedgerError {
        LedgerError::Corrupt {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }
}
