//! Error types for the blocky system
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for blocky operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the blocky system
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors (fatal, prevent startup)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Domain source errors (fatal at startup, nothing to block otherwise)
    #[error("Domain source error: {0}")]
    DomainSource(String),

    /// Per-domain resolution errors (recovered, skip and log)
    #[error("Resolution error for {domain}: {message}")]
    Resolution {
        /// Domain that failed to resolve
        domain: String,
        /// Underlying resolver message
        message: String,
    },

    /// Firewall synchronization errors (cycle-level, retried next cycle)
    #[error("Firewall sync error: {0}")]
    FirewallSync(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a domain source error
    pub fn domain_source(msg: impl Into<String>) -> Self {
        Self::DomainSource(msg.into())
    }

    /// Create a per-domain resolution error
    pub fn resolution(domain: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Resolution {
            domain: domain.into(),
            message: message.into(),
        }
    }

    /// Create a firewall sync error
    pub fn firewall(msg: impl Into<String>) -> Self {
        Self::FirewallSync(msg.into())
    }

    /// True for errors that must abort startup
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_) | Self::DomainSource(_))
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
