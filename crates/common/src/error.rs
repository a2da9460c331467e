use thiserror::Error;

/// A broken ledger invariant. Never expected in a correct run; when one is
/// detected the simulation stops at the current tick boundary.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvariantViolation {
    #[error("SELL attempted at tick {tick} with zero inventory")]
    SellWithoutInventory { tick: usize },

    #[error("cash {cash} does not reconcile with trade history total {expected}")]
    CashMismatch { cash: f64, expected: f64 },

    #[error("position {position} does not match {buys} buys and {sells} sells")]
    PositionMismatch { position: u64, buys: u64, sells: u64 },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Signal unavailable: {0}")]
    SignalUnavailable(String),

    #[error("Invariant violation: {0}")]
    Invariant(#[from] InvariantViolation),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
