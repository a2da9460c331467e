use std::time::Duration;

use crate::{Error, Result};

/// Run parameters, loaded from environment variables at startup.
/// Every value has a default; malformed or inconsistent values are a
/// configuration error and stop the program before the loop starts.
#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    // Tick source
    pub num_ticks: usize,
    pub start_price: f64,
    pub seed: u64,
    pub volatility: f64,
    /// Replay prices from this file instead of generating a random walk.
    pub price_file: Option<String>,

    // Pacing
    pub tick_delay: Duration,

    // Windows
    pub feature_window: usize,
    pub risk_window: usize,

    // Decision policy
    pub upper_threshold: f64,
    pub lower_threshold: f64,

    // Signal provider
    pub signal_timeout: Option<Duration>,
    pub signal_config_path: Option<String>,

    // Reporting
    pub report_path: Option<String>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            num_ticks: 1000,
            start_price: 100.0,
            seed: 42,
            volatility: 0.1,
            price_file: None,
            tick_delay: Duration::from_millis(50),
            feature_window: 20,
            risk_window: 50,
            upper_threshold: 0.6,
            lower_threshold: 0.4,
            signal_timeout: None,
            signal_config_path: None,
            report_path: None,
        }
    }
}

impl SimConfig {
    /// Load configuration from environment variables.
    /// Loads `.env` if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // ignore error if .env not present
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup and validate the result.
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            num_ticks: parse_or(&lookup, "NUM_TICKS", defaults.num_ticks)?,
            start_price: parse_or(&lookup, "START_PRICE", defaults.start_price)?,
            seed: parse_or(&lookup, "PRICE_SEED", defaults.seed)?,
            volatility: parse_or(&lookup, "PRICE_VOLATILITY", defaults.volatility)?,
            price_file: non_empty(&lookup, "PRICE_FILE"),
            tick_delay: Duration::from_millis(parse_or(
                &lookup,
                "TICK_DELAY_MS",
                defaults.tick_delay.as_millis() as u64,
            )?),
            feature_window: parse_or(&lookup, "FEATURE_WINDOW", defaults.feature_window)?,
            risk_window: parse_or(&lookup, "RISK_WINDOW", defaults.risk_window)?,
            upper_threshold: parse_or(&lookup, "UPPER_THRESHOLD", defaults.upper_threshold)?,
            lower_threshold: parse_or(&lookup, "LOWER_THRESHOLD", defaults.lower_threshold)?,
            signal_timeout: parse_opt::<u64, _>(&lookup, "SIGNAL_TIMEOUT_MS")?
                .map(Duration::from_millis),
            signal_config_path: non_empty(&lookup, "SIGNAL_CONFIG_PATH"),
            report_path: non_empty(&lookup, "REPORT_PATH"),
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the simulation cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.num_ticks == 0 {
            return Err(Error::Config("NUM_TICKS must be positive".into()));
        }
        if self.feature_window == 0 {
            return Err(Error::Config("FEATURE_WINDOW must be positive".into()));
        }
        if self.feature_window >= self.num_ticks {
            return Err(Error::Config(format!(
                "FEATURE_WINDOW ({}) must be smaller than NUM_TICKS ({})",
                self.feature_window, self.num_ticks
            )));
        }
        if self.risk_window < 2 {
            return Err(Error::Config(
                "RISK_WINDOW must be at least 2 to form a price difference".into(),
            ));
        }
        if !self.start_price.is_finite() {
            return Err(Error::Config("START_PRICE must be finite".into()));
        }
        if !self.volatility.is_finite() || self.volatility < 0.0 {
            return Err(Error::Config(
                "PRICE_VOLATILITY must be finite and non-negative".into(),
            ));
        }
        validate_thresholds(self.lower_threshold, self.upper_threshold)
    }
}

/// Hysteresis thresholds must be probabilities with a non-empty neutral band.
pub fn validate_thresholds(lower: f64, upper: f64) -> Result<()> {
    for (name, value) in [("LOWER_THRESHOLD", lower), ("UPPER_THRESHOLD", upper)] {
        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
            return Err(Error::Config(format!(
                "{name} must be a probability in [0, 1], got {value}"
            )));
        }
    }
    if lower >= upper {
        return Err(Error::Config(format!(
            "LOWER_THRESHOLD ({lower}) must be below UPPER_THRESHOLD ({upper})"
        )));
    }
    Ok(())
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    Ok(parse_opt(lookup, key)?.unwrap_or(default))
}

fn parse_opt<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match non_empty(lookup, key) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| Error::Config(format!("{key} has an invalid value: '{raw}'"))),
        None => Ok(None),
    }
}

fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
