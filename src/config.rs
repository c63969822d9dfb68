//! Configuration for the relay server
//!
//! Values are resolved once at startup from an optional `config.toml` with
//! environment overrides, then shared read-only by all components.

use config::{Config, Environment, File};
use serde::Deserialize;
use std::time::Duration;

/// Resolved relay configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RelayConfig {
    /// IP address to bind the listener to
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Message terminator; must be a single byte
    #[serde(default = "default_delimiter")]
    pub delimiter: String,

    /// Per-write deadline in seconds; a recipient that does not accept a
    /// full message within this window is evicted
    #[serde(default = "default_write_timeout_secs")]
    pub write_timeout_secs: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    1234
}

fn default_delimiter() -> String {
    "\n".to_string()
}

fn default_write_timeout_secs() -> u64 {
    30
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            delimiter: default_delimiter(),
            write_timeout_secs: default_write_timeout_secs(),
        }
    }
}

impl RelayConfig {
    /// Load configuration from config.toml (if present) with environment
    /// overrides, e.g. `LINE_RELAY_PORT=4000`.
    pub fn load() -> Result<Self, config::ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("config").required(false))
            .add_source(Environment::with_prefix("LINE_RELAY"))
            .build()?;

        let config: RelayConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validation for all configuration values
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.port == 0 {
            return Err(config::ConfigError::Message(
                "Listen port cannot be 0".into(),
            ));
        }

        if self.delimiter.len() != 1 {
            return Err(config::ConfigError::Message(format!(
                "Delimiter must be exactly one byte, got {:?}",
                self.delimiter
            )));
        }

        if self.write_timeout_secs == 0 {
            return Err(config::ConfigError::Message(
                "Write timeout cannot be 0 seconds".into(),
            ));
        }

        Ok(())
    }

    /// The delimiter as a byte, for `read_until`
    pub fn delimiter_byte(&self) -> u8 {
        self.delimiter.as_bytes()[0]
    }

    /// The per-write deadline as a `Duration`
    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    /// The socket address string to bind, e.g. `127.0.0.1:1234`
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
