//! Engine configuration: tunables shared by the offline and realtime paths.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Settings for graph construction and block-based rendering.
///
/// Every field has a default, so a partial JSON object (or `{}`) is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Frames pulled through the graph per block during offline rendering.
    pub block_size: usize,
    /// Fraction of an effect window spent fading in, and again fading out.
    pub ramp_fraction: f64,
    /// When false, EQ switches on and off at the window edges with no ramp.
    pub eq_ramp: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            block_size: 512,
            ramp_fraction: 0.25,
            eq_ramp: true,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON configuration object.
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.block_size == 0 {
            return Err(CoreError::Config("blockSize must be at least 1".into()));
        }
        if !(self.ramp_fraction > 0.0 && self.ramp_fraction <= 0.5) {
            return Err(CoreError::Config(format!(
                "rampFraction must be in (0, 0.5], got {}",
                self.ramp_fraction
            )));
        }
        Ok(())
    }
}
