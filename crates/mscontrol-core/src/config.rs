//! Controller configuration
//!
//! Loaded from YAML (all fields optional, defaults below):
//!
//! ```yaml
//! inbox_capacity: 1000
//! api_version: "2012-04-24"
//! record_inter_signal_timeout_ms: 10000
//! call_recording:
//!   end_input_keys: "1234567890*#"
//!   max_length_secs: 3600
//!   timeout_secs: 5
//! logging:
//!   level: info
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{MediaControlError, Result};
use crate::logging::LoggingConfig;

/// Configuration shared by media session controllers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Bounded inbox length of each controller
    pub inbox_capacity: usize,
    /// API version used in recording resource URIs
    pub api_version: String,
    /// Inter-signal timeout applied to records that end on a key
    pub record_inter_signal_timeout_ms: u64,
    pub call_recording: CallRecordingConfig,
    pub logging: LoggingConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            inbox_capacity: 1000,
            api_version: "2012-04-24".to_string(),
            record_inter_signal_timeout_ms: 10_000,
            call_recording: CallRecordingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Parameters of the record issued by StartRecording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallRecordingConfig {
    pub end_input_keys: String,
    pub max_length_secs: u32,
    pub timeout_secs: u32,
}

impl Default for CallRecordingConfig {
    fn default() -> Self {
        Self {
            end_input_keys: "1234567890*#".to_string(),
            max_length_secs: 3600,
            timeout_secs: 5,
        }
    }
}

impl ControllerConfig {
    /// Parse and validate a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| MediaControlError::config(format!("invalid YAML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            MediaControlError::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        tracing::info!("Loading controller configuration from {}", path.display());
        Self::from_yaml_str(&yaml)
    }

    pub fn validate(&self) -> Result<()> {
        if self.inbox_capacity == 0 {
            return Err(MediaControlError::config("inbox_capacity must be positive"));
        }
        if self.api_version.trim().is_empty() {
            return Err(MediaControlError::config("api_version must not be empty"));
        }
        if self.call_recording.max_length_secs == 0 {
            return Err(MediaControlError::config(
                "call_recording.max_length_secs must be positive",
            ));
        }
        self.logging.level()?;
        Ok(())
    }

    pub fn record_inter_signal_timeout(&self) -> Duration {
        Duration::from_millis(self.record_inter_signal_timeout_ms)
    }
}
