use std::collections::VecDeque;

/// Default trailing window, in prices.
pub const DEFAULT_RISK_WINDOW: usize = 50;

/// Added to the standard deviation so a flat window never divides by zero.
pub const SHARPE_EPSILON: f64 = 1e-6;

/// Sharpe-like ratio `mean(diff) / (std(diff) + ε)` over the price changes in
/// `prices[max(0, tick - window) .. tick]`.
///
/// Uses the population standard deviation. Returns 0.0 when the slice yields
/// fewer than two differences. This is the O(window) reference; the
/// simulation loop uses [`RollingSharpe`].
pub fn rolling_sharpe(prices: &[f64], tick: usize, window: usize) -> f64 {
    let end = tick.min(prices.len());
    let start = end.saturating_sub(window);
    let slice = &prices[start..end];

    if slice.len() < 3 {
        return 0.0;
    }

    let n = (slice.len() - 1) as f64;
    let mean = slice.windows(2).map(|w| w[1] - w[0]).sum::<f64>() / n;
    let variance = slice
        .windows(2)
        .map(|w| (w[1] - w[0] - mean).powi(2))
        .sum::<f64>()
        / n;

    ratio(mean, variance)
}

/// Streaming rolling Sharpe with O(1) work per price.
///
/// Keeps the last `window - 1` price differences (the differences of the
/// last `window` prices) and a sliding Welford mean / sum of squared
/// deviations. Fed every tick, warmup included, so after `push`ing
/// `prices[..i]` the value equals `rolling_sharpe(prices, i, window)`.
#[derive(Debug, Clone)]
pub struct RollingSharpe {
    capacity: usize,
    diffs: VecDeque<f64>,
    last_price: Option<f64>,
    mean: f64,
    m2: f64,
    evictions: usize,
}

impl RollingSharpe {
    /// `window` counts prices. Values below 2 cannot hold a difference and
    /// are raised to 2.
    pub fn new(window: usize) -> Self {
        let capacity = window.max(2) - 1;
        Self {
            capacity,
            diffs: VecDeque::with_capacity(capacity),
            last_price: None,
            mean: 0.0,
            m2: 0.0,
            evictions: 0,
        }
    }

    pub fn window(&self) -> usize {
        self.capacity + 1
    }

    /// Number of price differences currently in the window.
    pub fn len(&self) -> usize {
        self.diffs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diffs.is_empty()
    }

    pub fn push(&mut self, price: f64) {
        if let Some(prev) = self.last_price {
            if self.diffs.len() == self.capacity {
                if let Some(oldest) = self.diffs.pop_front() {
                    self.remove(oldest);
                    self.evictions += 1;
                }
            }
            let diff = price - prev;
            self.diffs.push_back(diff);
            self.add(diff);

            // Sliding removal accumulates rounding error; rebuild from the
            // window once per full turnover.
            if self.evictions >= self.capacity {
                self.resync();
            }
        }
        self.last_price = Some(price);
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Population standard deviation of the windowed differences.
    pub fn std_dev(&self) -> f64 {
        if self.diffs.is_empty() {
            return 0.0;
        }
        (self.m2.max(0.0) / self.diffs.len() as f64).sqrt()
    }

    pub fn value(&self) -> f64 {
        if self.diffs.len() < 2 {
            return 0.0;
        }
        ratio(self.mean, self.m2.max(0.0) / self.diffs.len() as f64)
    }

    fn add(&mut self, x: f64) {
        let n = self.diffs.len() as f64;
        let delta = x - self.mean;
        self.mean += delta / n;
        self.m2 += delta * (x - self.mean);
    }

    fn remove(&mut self, x: f64) {
        let n = self.diffs.len();
        if n == 0 {
            self.mean = 0.0;
            self.m2 = 0.0;
            return;
        }
        let delta = x - self.mean;
        self.mean -= delta / n as f64;
        self.m2 -= delta * (x - self.mean);
    }

    fn resync(&mut self) {
        let n = self.diffs.len() as f64;
        self.mean = self.diffs.iter().sum::<f64>() / n;
        self.m2 = self.diffs.iter().map(|d| (d - self.mean).powi(2)).sum();
        self.evictions = 0;
    }
}

impl Default for RollingSharpe {
    fn default() -> Self {
        Self::new(DEFAULT_RISK_WINDOW)
    }
}

fn ratio(mean: f64, variance: f64) -> f64 {
    let value = mean / (variance.max(0.0).sqrt() + SHARPE_EPSILON);
    if value.is_finite() {
        value
    } else {
        0.0
    }
}
