use std::collections::HashMap;

use tracing::info;

use common::{Error, Result, SignalProvider};

use crate::config::SignalConfig;
use crate::signals::{ConstantSignal, MomentumSignal};

/// Build the configured signal provider. Unknown types and out-of-range
/// parameters are configuration errors.
pub fn build_provider(cfg: &SignalConfig) -> Result<Box<dyn SignalProvider>> {
    let provider: Box<dyn SignalProvider> = match cfg.signal_type.as_str() {
        "momentum" => {
            let sensitivity = param_f64(
                &cfg.params,
                "sensitivity",
                MomentumSignal::DEFAULT_SENSITIVITY,
            );
            if !sensitivity.is_finite() || sensitivity <= 0.0 {
                return Err(Error::Config(format!(
                    "momentum sensitivity must be positive, got {sensitivity}"
                )));
            }
            Box::new(MomentumSignal::new(sensitivity))
        }
        "constant" => {
            let probability = param_f64(&cfg.params, "probability", 0.5);
            if !(0.0..=1.0).contains(&probability) {
                return Err(Error::Config(format!(
                    "constant probability must be in [0, 1], got {probability}"
                )));
            }
            Box::new(ConstantSignal::new(probability))
        }
        other => {
            return Err(Error::Config(format!(
                "unknown signal provider type '{other}'"
            )))
        }
    };

    info!(provider = %provider.name(), "Signal provider configured");
    Ok(provider)
}

fn param_f64(params: &HashMap<String, toml::Value>, key: &str, default: f64) -> f64 {
    params
        .get(key)
        .and_then(|v| v.as_float().or_else(|| v.as_integer().map(|i| i as f64)))
        .unwrap_or(default)
}
