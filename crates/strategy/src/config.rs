use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use common::Result;

/// Signal provider config file (TOML).
///
/// Example `config/signal.toml`:
/// ```toml
/// [signal]
/// type = "momentum"
///
/// [signal.params]
/// sensitivity = 1.0
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SignalFileConfig {
    pub signal: SignalConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SignalConfig {
    /// Provider type identifier: "momentum" or "constant".
    #[serde(rename = "type")]
    pub signal_type: String,
    /// Provider-specific parameters.
    #[serde(default)]
    pub params: HashMap<String, toml::Value>,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            signal_type: "momentum".to_string(),
            params: HashMap::new(),
        }
    }
}

impl SignalFileConfig {
    /// Load from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}
