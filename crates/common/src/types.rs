use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Side of an executed trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// Decision produced by the policy for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Buy,
    Sell,
    #[default]
    Hold,
}

impl Action {
    /// The trade side this action executes, `None` for HOLD.
    pub fn side(&self) -> Option<OrderSide> {
        match self {
            Action::Buy => Some(OrderSide::Buy),
            Action::Sell => Some(OrderSide::Sell),
            Action::Hold => None,
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Buy => write!(f, "BUY"),
            Action::Sell => write!(f, "SELL"),
            Action::Hold => write!(f, "HOLD"),
        }
    }
}

/// One executed trade. Appended to the ledger history and never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub tick: usize,
    pub price: f64,
    pub side: OrderSide,
}

impl TradeRecord {
    /// Signed cash flow of this trade: buys pay, sells receive.
    pub fn cash_flow(&self) -> f64 {
        match self.side {
            OrderSide::Buy => -self.price,
            OrderSide::Sell => self.price,
        }
    }
}

/// Snapshot published to reporting sinks after a Running tick completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    pub tick: usize,
    pub price: f64,
    /// Probability returned by the signal provider. `None` on a degraded tick.
    pub signal: Option<f64>,
    pub action: Action,
    pub trade: Option<TradeRecord>,
    pub position: u64,
    pub cash: f64,
    pub pnl: f64,
    pub sharpe: f64,
    /// Decision policy + execution span.
    pub latency_ns: u64,
    pub signal_latency_ns: u64,
    /// Why the signal was unavailable, when the tick fell back to HOLD.
    pub degraded: Option<String>,
}

impl TickReport {
    pub fn is_degraded(&self) -> bool {
        self.degraded.is_some()
    }
}

/// Phase of the simulation loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SimPhase {
    #[default]
    Warmup,
    Running,
    Done,
}

impl std::fmt::Display for SimPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimPhase::Warmup => write!(f, "warmup"),
            SimPhase::Running => write!(f, "running"),
            SimPhase::Done => write!(f, "done"),
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RunStatus {
    Completed,
    /// Stopped between ticks through a `SimulationHandle`.
    Cancelled { at_tick: usize },
    /// Stopped by an invariant violation. State is reported as of the last
    /// fully processed tick.
    Aborted { at_tick: usize, reason: String },
}

impl RunStatus {
    pub fn is_aborted(&self) -> bool {
        matches!(self, RunStatus::Aborted { .. })
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Cancelled { at_tick } => write!(f, "cancelled at tick {at_tick}"),
            RunStatus::Aborted { at_tick, reason } => {
                write!(f, "ABORTED at tick {at_tick}: {reason}")
            }
        }
    }
}

/// Nearest-rank latency distribution, in nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencyPercentiles {
    pub count: usize,
    pub p50_ns: u64,
    pub p90_ns: u64,
    pub p99_ns: u64,
    pub max_ns: u64,
}

/// End-of-run aggregate delivered to sinks once the loop reaches Done.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    #[serde(flatten)]
    pub status: RunStatus,
    pub ticks_processed: usize,
    pub degraded_ticks: usize,
    pub final_pnl: f64,
    pub final_position: u64,
    pub final_cash: f64,
    pub total_trades: usize,
    pub buys: u64,
    pub sells: u64,
    pub mean_latency_ms: f64,
    pub latency: Option<LatencyPercentiles>,
    pub mean_signal_latency_ms: f64,
    /// Last rolling Sharpe observed in the loop, not a fresh end-of-run value.
    pub final_sharpe: f64,
    pub trades: Vec<TradeRecord>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}
