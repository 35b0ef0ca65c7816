//! Error types for zonebeat
//!
//! This module defines all error types used throughout the crate.

use crate::traits::RecordType;
use thiserror::Error;

/// Result type alias for zonebeat operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for zonebeat
#[derive(Error, Debug)]
pub enum Error {
    /// Address source errors
    #[error("Address source error: {0}")]
    AddressSource(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The provider call did not complete (connection failure, timeout)
    #[error("Transport error: {0}")]
    Transport(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limiting errors
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Record or zone not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The provider refused a create because an identical record exists.
    ///
    /// Not a failure from the caller's point of view: it signals that the
    /// record should be updated instead.
    #[error("{record_type} record for {name} already exists")]
    AlreadyExists {
        /// Record name
        name: String,
        /// Record type
        record_type: RecordType,
    },

    /// Provider-reported failure
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },
}

impl Error {
    /// Create an address source error
    pub fn address_source(msg: impl Into<String>) -> Self {
        Self::AddressSource(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create an "already exists" signal for a record
    pub fn already_exists(name: impl Into<String>, record_type: RecordType) -> Self {
        Self::AlreadyExists {
            name: name.into(),
            record_type,
        }
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Whether this error is the provider's "record already exists" condition
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }
}
