//! Clock: the scanner's only source of "now".

use chrono::{Datelike, NaiveDate};

pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;

    /// ISO (year, week) of today; the ledger's deduplication key.
    fn iso_week(&self) -> (i32, u32) {
        let iso = self.today().iso_week();
        (iso.year(), iso.week())
    }
}

/// Local wall-clock date.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        chrono::Local::now().date_naive()
    }
}

/// A clock pinned to one date.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}
