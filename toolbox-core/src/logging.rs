//! Structured logging with tracing
//!
//! Console output is human-readable by default; JSON output can be enabled
//! for runs whose logs are collected by another tool.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Registry,
};

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (ERROR, WARN, INFO, DEBUG, TRACE)
    pub level: String,

    /// Enable JSON format output
    pub json_format: bool,

    /// Include module targets in each line
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            json_format: false,
            with_target: false,
        }
    }
}

impl LoggingConfig {
    /// Parse log level from string
    pub fn parse_level(&self) -> Level {
        match self.level.to_uppercase().as_str() {
            "ERROR" => Level::ERROR,
            "WARN" => Level::WARN,
            "INFO" => Level::INFO,
            "DEBUG" => Level::DEBUG,
            "TRACE" => Level::TRACE,
            _ => Level::INFO,
        }
    }

    /// Same configuration with the level forced to DEBUG
    pub fn verbose(mut self) -> Self {
        self.level = "DEBUG".to_string();
        self
    }

    fn directives(&self) -> String {
        let level = self.parse_level().to_string().to_lowercase();
        format!("toolbox_migrate={level},toolbox_core={level},sqlx=warn")
    }
}

/// Initialize the logging system
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.directives()));

    let subscriber = Registry::default().with(env_filter);

    if config.json_format {
        let json_layer = fmt::layer()
            .json()
            .with_span_events(FmtSpan::CLOSE)
            .with_current_span(true)
            .with_target(true);

        subscriber
            .with(json_layer)
            .try_init()
            .map_err(|e| anyhow::anyhow!("Logging already initialized: {}", e))?;
    } else {
        let fmt_layer = fmt::layer()
            .with_target(config.with_target)
            .with_writer(std::io::stderr)
            .compact();

        subscriber
            .with(fmt_layer)
            .try_init()
            .map_err(|e| anyhow::anyhow!("Logging already initialized: {}", e))?;
    }

    tracing::debug!(
        "Logging initialized: level={}, json={}",
        config.level,
        config.json_format
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        let mut config = LoggingConfig::default();
        assert_eq!(config.parse_level(), Level::INFO);

        config.level = "warn".to_string();
        assert_eq!(config.parse_level(), Level::WARN);

        config.level = "nonsense".to_string();
        assert_eq!(config.parse_level(), Level::INFO);
    }

    #[test]
    fn test_verbose_forces_debug() {
        let config = LoggingConfig::default().verbose();
        assert_eq!(config.parse_level(), Level::DEBUG);
        assert!(config.directives().contains("toolbox_migrate=debug"));
    }
}
