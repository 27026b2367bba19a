//! Engine configuration.
//!
//! Capacities are reserved when the engine is built so that edits made while
//! the audio callback is waiting on the lock do not have to grow storage.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Device sample rate in Hz
    pub sample_rate: u32,
    /// Frames per device period
    pub buffer_size: u32,
    pub max_blocks: usize,
    pub max_wires: usize,
    pub max_slots: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            buffer_size: 512,
            max_blocks: 256,
            max_wires: 1024,
            max_slots: 4096,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate == 0 {
            return Err(ConfigError::Invalid("sample_rate must be positive"));
        }
        if self.buffer_size == 0 {
            return Err(ConfigError::Invalid("buffer_size must be positive"));
        }
        if self.max_blocks == 0 || self.max_wires == 0 || self.max_slots == 0 {
            return Err(ConfigError::Invalid("capacities must be positive"));
        }
        Ok(())
    }

    /// Parse and validate a JSON config; missing fields take their defaults
    #[cfg(feature = "json")]
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Length in seconds of one device period
    pub fn period_seconds(&self) -> f64 {
        f64::from(self.buffer_size) / f64::from(self.sample_rate)
    }
}
