//! Market data: providers, the circuit breaker, and the symbol universe.

pub mod circuit_breaker;
pub mod provider;
pub mod universe;
pub mod yahoo;

pub use circuit_breaker::CircuitBreaker;
pub use provider::{BarInterval, BarProvider, FetchResult, ProviderError};
pub use universe::{FallbackPolicy, Universe, UniverseError, FALLBACK_SYMBOLS};
pub use yahoo::{YahooConfig, YahooProvider};
