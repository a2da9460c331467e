use std::time::Duration;

use common::LatencyPercentiles;

/// Per-tick latency samples with a running total for O(1) means.
///
/// Samples are kept so nearest-rank percentiles can be reported once at the
/// end of a run.
#[derive(Debug, Default, Clone)]
pub struct LatencyTracker {
    samples_ns: Vec<u64>,
    total_ns: u128,
}

impl LatencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store one sample and return it in nanoseconds.
    pub fn record(&mut self, elapsed: Duration) -> u64 {
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.samples_ns.push(nanos);
        self.total_ns += u128::from(nanos);
        nanos
    }

    pub fn count(&self) -> usize {
        self.samples_ns.len()
    }

    pub fn last_ns(&self) -> Option<u64> {
        self.samples_ns.last().copied()
    }

    /// 0.0 when no samples were recorded.
    pub fn mean_ns(&self) -> f64 {
        if self.samples_ns.is_empty() {
            return 0.0;
        }
        self.total_ns as f64 / self.samples_ns.len() as f64
    }

    pub fn mean_ms(&self) -> f64 {
        self.mean_ns() / 1e6
    }

    pub fn percentiles(&self) -> Option<LatencyPercentiles> {
        if self.samples_ns.is_empty() {
            return None;
        }

        let mut sorted = self.samples_ns.clone();
        sorted.sort_unstable();
        let count = sorted.len();

        Some(LatencyPercentiles {
            count,
            p50_ns: percentile_nearest_rank(&sorted, 50),
            p90_ns: percentile_nearest_rank(&sorted, 90),
            p99_ns: percentile_nearest_rank(&sorted, 99),
            max_ns: sorted[count - 1],
        })
    }
}

fn percentile_nearest_rank(sorted: &[u64], percentile: usize) -> u64 {
    let rank = (percentile * sorted.len()).div_ceil(100);
    sorted[rank.saturating_sub(1)]
}
