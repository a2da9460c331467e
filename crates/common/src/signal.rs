use async_trait::async_trait;

use crate::Result;

/// Source of the up/down probability consulted once per Running tick.
///
/// `MomentumSignal` implements this for normal runs.
/// `ConstantSignal` and `ScriptedSignal` implement it for tests and demos.
///
/// Implementations receive exactly the `W` prices preceding the tick being
/// decided, oldest first, and must return the probability that the next
/// price is higher. Any error degrades that tick to HOLD; the run goes on.
#[async_trait]
pub trait SignalProvider: Send + Sync {
    /// Human-readable name for logs.
    fn name(&self) -> &str;

    /// Probability in `[0, 1]` that the price following `window` is higher.
    async fn predict(&self, window: &[f64]) -> Result<f64>;
}
