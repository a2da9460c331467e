pub mod config;
pub mod error;
pub mod signal;
pub mod types;

pub use config::SimConfig;
pub use error::{Error, InvariantViolation, Result};
pub use signal::SignalProvider;
pub use types::*;
