//! Domain types for weekscan

pub mod bar;

pub use bar::{Bar, BarError};
