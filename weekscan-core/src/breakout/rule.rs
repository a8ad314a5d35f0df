//! Breakout rule: the lookback/volume configuration shared across a scan.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuleError {
    #[error("lookback_weeks must be >= 1")]
    ZeroLookback,

    #[error("min_volume_ratio must be a finite value >= 0 (got {0})")]
    InvalidVolumeRatio(f64),
}

/// Weekly breakout rule.
///
/// A week breaks out when its close is strictly above the highest high of the
/// preceding `lookback_weeks` weeks and its volume is at least `min_volume_ratio`
/// times their mean volume.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BreakoutRule {
    pub lookback_weeks: usize,
    pub min_volume_ratio: f64,
}

impl BreakoutRule {
    pub fn new(lookback_weeks: usize, min_volume_ratio: f64) -> Result<Self, RuleError> {
        let rule = Self {
            lookback_weeks,
            min_volume_ratio,
        };
        rule.validate()?;
        Ok(rule)
    }

    pub fn validate(&self) -> Result<(), RuleError> {
        if self.lookback_weeks == 0 {
            return Err(RuleError::ZeroLookback);
        }
        if !self.min_volume_ratio.is_finite() || self.min_volume_ratio < 0.0 {
            return Err(RuleError::InvalidVolumeRatio(self.min_volume_ratio));
        }
        Ok(())
    }

    /// Minimum weekly bars needed: the bar under test, the lookback window, and one
    /// bar preceding the window.
    pub fn required_bars(&self) -> usize {
        self.lookback_weeks + 2
    }
}

impl Default for BreakoutRule {
    fn default() -> Self {
        Self {
            lookback_weeks: 20,
            min_volume_ratio: 1.2,
        }
    }
}
