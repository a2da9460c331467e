pub mod sharpe;

pub use sharpe::{rolling_sharpe, RollingSharpe, DEFAULT_RISK_WINDOW, SHARPE_EPSILON};
