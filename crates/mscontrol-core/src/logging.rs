//! Logging setup
//!
//! The crate itself only emits `tracing` events, tagged with the controller
//! id. Applications embedding it can use [`setup_logging`] with the
//! `logging` section of their [`ControllerConfig`](crate::ControllerConfig)
//! to install a formatted subscriber.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{MediaControlError, Result};

/// Logging section of the controller configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level, overridable through `RUST_LOG`
    pub level: String,
    /// Whether to include file and line information
    pub file_info: bool,
    /// Whether to log span open/close events
    pub log_spans: bool,
    /// Application name for the startup line
    pub app_name: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            file_info: false,
            log_spans: false,
            app_name: "mscontrol".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn new(level: Level, app_name: impl Into<String>) -> Self {
        LoggingConfig {
            level: level.to_string(),
            app_name: app_name.into(),
            ..Default::default()
        }
    }

    pub fn with_file_info(mut self) -> Self {
        self.file_info = true;
        self
    }

    pub fn with_spans(mut self) -> Self {
        self.log_spans = true;
        self
    }

    /// Parsed default level
    pub fn level(&self) -> Result<Level> {
        parse_log_level(&self.level)
    }
}

/// Install a global fmt subscriber.
///
/// Fails on an invalid level or if a global subscriber is already set.
pub fn setup_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive(config.level()?.into());

    let span_events = if config.log_spans {
        FmtSpan::ACTIVE
    } else {
        FmtSpan::NONE
    };

    fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_span_events(span_events)
        .with_file(config.file_info)
        .with_line_number(config.file_info)
        .try_init()
        .map_err(|e| MediaControlError::config(format!("logging already initialized: {}", e)))?;

    tracing::info!(
        "Starting {} (media server control v{})",
        config.app_name,
        env!("CARGO_PKG_VERSION")
    );
    Ok(())
}

/// Parse a log level from a string
pub fn parse_log_level(level: &str) -> Result<Level> {
    Level::from_str(level)
        .map_err(|_| MediaControlError::config(format!("Invalid log level: {}", level)))
}
