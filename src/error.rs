//! Error types
//!
//! Startup-scoped errors only: once the server is running, per-connection
//! failures are handled in place (deregistration) and never propagate.

use std::fmt;
use std::io;

/// Relay startup errors
#[derive(Debug)]
pub enum RelayError {
    /// Configuration could not be loaded or failed validation
    Config(config::ConfigError),
    /// The listen socket could not be bound
    Bind(String, io::Error),
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayError::Config(e) => write!(f, "Configuration error: {}", e),
            RelayError::Bind(addr, e) => write!(f, "Failed to bind to {}: {}", addr, e),
        }
    }
}

impl std::error::Error for RelayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RelayError::Config(e) => Some(e),
            RelayError::Bind(_, e) => Some(e),
        }
    }
}

impl From<config::ConfigError> for RelayError {
    fn from(error: config::ConfigError) -> Self {
        RelayError::Config(error)
    }
}
