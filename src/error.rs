//! Error types for the AirGradient bridge
//!
//! Fetch failures are split into network and decode errors so the poll loop
//! can log them distinctly. Per-field validation problems are not errors; see
//! [`crate::services::validator::FieldWarning`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Error types for bridge operations
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Connection, timeout or HTTP status failures
    #[error("Network error: {0}")]
    Network(String),

    /// Response body could not be decoded into telemetry
    #[error("Decode error: {0}")]
    Decode(String),

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing errors
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file syntax errors
    #[error("Configuration file error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Accessory cache errors
    #[error("Accessory cache error: {0}")]
    Cache(String),

    /// Host registration errors
    #[error("Host error: {0}")]
    Host(String),

    /// Generic I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Generic errors
    #[error("Generic error: {0}")]
    Generic(#[from] anyhow::Error),
}

/// Coarse classification of a failed poll cycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum FetchErrorKind {
    /// Transport failure or non-success HTTP status
    NetworkError,
    /// Body was not a JSON object
    DecodeError,
    /// Anything else (should not happen on the fetch path)
    Other,
}

impl std::fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            FetchErrorKind::NetworkError => "network",
            FetchErrorKind::DecodeError => "decode",
            FetchErrorKind::Other => "other",
        };
        f.write_str(label)
    }
}

impl BridgeError {
    /// Create a network error
    pub fn network<S: Into<String>>(msg: S) -> Self {
        Self::Network(msg.into())
    }

    /// Create a decode error
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create an accessory cache error
    pub fn cache<S: Into<String>>(msg: S) -> Self {
        Self::Cache(msg.into())
    }

    /// Create a host error
    pub fn host<S: Into<String>>(msg: S) -> Self {
        Self::Host(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Classify this error for poll-cycle reporting
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            BridgeError::Network(_) | BridgeError::Http(_) | BridgeError::Io(_) => {
                FetchErrorKind::NetworkError
            }
            BridgeError::Decode(_) | BridgeError::Json(_) => FetchErrorKind::DecodeError,
            _ => FetchErrorKind::Other,
        }
    }

    /// Check if a later attempt could succeed without operator action
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BridgeError::Network(_) | BridgeError::Http(_) | BridgeError::Io(_)
        )
    }
}
