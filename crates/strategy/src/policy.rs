use common::config::validate_thresholds;
use common::{Action, Result};

/// Hysteresis decision rule mapping a probability and current inventory to
/// an action.
///
/// Probabilities inside `[lower, upper]` hold, which keeps marginal signals
/// from flipping the book back and forth. SELL is only emitted with
/// inventory on hand; shorting is not modelled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecisionPolicy {
    lower: f64,
    upper: f64,
}

impl DecisionPolicy {
    pub const DEFAULT_LOWER: f64 = 0.4;
    pub const DEFAULT_UPPER: f64 = 0.6;

    /// Fails with a configuration error unless `0 <= lower < upper <= 1`.
    pub fn new(lower: f64, upper: f64) -> Result<Self> {
        validate_thresholds(lower, upper)?;
        Ok(Self { lower, upper })
    }

    pub fn lower(&self) -> f64 {
        self.lower
    }

    pub fn upper(&self) -> f64 {
        self.upper
    }

    pub fn decide(&self, probability: f64, position: u64) -> Action {
        if probability > self.upper {
            Action::Buy
        } else if probability < self.lower && position > 0 {
            Action::Sell
        } else {
            Action::Hold
        }
    }
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        Self {
            lower: Self::DEFAULT_LOWER,
            upper: Self::DEFAULT_UPPER,
        }
    }
}
