use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use common::{Error, Result, SignalProvider};

/// Always returns the same probability.
#[derive(Debug, Clone)]
pub struct ConstantSignal {
    probability: f64,
}

impl ConstantSignal {
    pub fn new(probability: f64) -> Self {
        Self { probability }
    }
}

#[async_trait]
impl SignalProvider for ConstantSignal {
    fn name(&self) -> &str {
        "constant"
    }

    async fn predict(&self, _window: &[f64]) -> Result<f64> {
        Ok(self.probability)
    }
}

/// Replays a fixed sequence of outcomes, one per call. `None` steps fail,
/// which exercises the degraded-tick path.
#[derive(Debug)]
pub struct ScriptedSignal {
    steps: Vec<Option<f64>>,
    cursor: AtomicUsize,
    repeat: bool,
}

impl ScriptedSignal {
    /// Fails once every step has been consumed.
    pub fn new(steps: Vec<Option<f64>>) -> Self {
        Self {
            steps,
            cursor: AtomicUsize::new(0),
            repeat: false,
        }
    }

    /// Cycles through `probabilities` forever.
    pub fn cycle(probabilities: &[f64]) -> Self {
        Self {
            steps: probabilities.iter().copied().map(Some).collect(),
            cursor: AtomicUsize::new(0),
            repeat: true,
        }
    }

    /// Number of `predict` calls served so far.
    pub fn calls(&self) -> usize {
        self.cursor.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl SignalProvider for ScriptedSignal {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn predict(&self, _window: &[f64]) -> Result<f64> {
        let call = self.cursor.fetch_add(1, Ordering::Relaxed);
        let index = if self.repeat && !self.steps.is_empty() {
            call % self.steps.len()
        } else {
            call
        };

        match self.steps.get(index) {
            Some(Some(p)) => Ok(*p),
            Some(None) => Err(Error::SignalUnavailable(format!(
                "scripted failure on call {call}"
            ))),
            None => Err(Error::SignalUnavailable(format!(
                "script exhausted after {} steps",
                self.steps.len()
            ))),
        }
    }
}

/// Trend-following probability from the window's own price changes.
///
/// Computes the mean/std ratio of first differences across the window and
/// squashes `sensitivity * ratio * sqrt(n)` through a logistic curve: a
/// steadily rising window leans towards 1, a falling one towards 0, and a
/// flat or noisy one stays near 0.5.
#[derive(Debug, Clone)]
pub struct MomentumSignal {
    sensitivity: f64,
}

impl MomentumSignal {
    pub const DEFAULT_SENSITIVITY: f64 = 1.0;

    pub fn new(sensitivity: f64) -> Self {
        Self { sensitivity }
    }

    fn score(&self, window: &[f64]) -> Option<f64> {
        if window.len() < 2 {
            return None;
        }
        let n = (window.len() - 1) as f64;
        let diffs = window.windows(2).map(|w| w[1] - w[0]);
        let mean = diffs.clone().sum::<f64>() / n;
        let variance = diffs.map(|d| (d - mean).powi(2)).sum::<f64>() / n;
        let ratio = mean / (variance.sqrt() + 1e-6);
        Some(logistic(self.sensitivity * ratio * n.sqrt()))
    }
}

impl Default for MomentumSignal {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SENSITIVITY)
    }
}

#[async_trait]
impl SignalProvider for MomentumSignal {
    fn name(&self) -> &str {
        "momentum"
    }

    async fn predict(&self, window: &[f64]) -> Result<f64> {
        if window.iter().any(|p| !p.is_finite()) {
            return Err(Error::SignalUnavailable("non-finite price in window".into()));
        }
        self.score(window).ok_or_else(|| {
            Error::SignalUnavailable(format!(
                "momentum needs at least 2 prices, got {}",
                window.len()
            ))
        })
    }
}

fn logistic(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}
