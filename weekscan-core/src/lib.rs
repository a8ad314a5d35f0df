//! Weekscan Core: weekly breakout detection.
//!
//! This crate contains everything that turns raw market data into a breakout decision:
//! - Domain types (bars)
//! - Weekly aggregation of daily or weekly bars
//! - The breakout rule and evaluator
//! - Symbol canonicalization
//! - Bar provider trait, Yahoo Finance provider, circuit breaker
//! - Symbol universe loading with an explicit fallback policy
//!
//! Nothing here touches alert state; deduplication and dispatch live in `weekscan-runner`.

pub mod aggregate;
pub mod breakout;
pub mod data;
pub mod domain;
pub mod symbol;

pub use aggregate::{aggregate, AggregateError, WeeklySeries};
pub use breakout::{evaluate, BreakoutReason, BreakoutResult, BreakoutRule, RuleError};
pub use domain::{Bar, BarError};
