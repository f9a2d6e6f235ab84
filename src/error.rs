//! Error types for the pool server
//!
//! All fallible operations in the crate return [`Result`], built on a single
//! `thiserror` enum so that RPC, configuration and validation failures share
//! one propagation path.

use thiserror::Error;

/// Main error type for the pool server
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP transport errors
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed Stratum frames or unsupported methods
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Stratum session errors
    #[error("Stratum error: {0}")]
    Stratum(String),

    /// ECCPoW validation failures that are not a plain "invalid share"
    #[error("Validation error: {0}")]
    Validation(String),

    /// Node JSON-RPC errors
    #[error("RPC error: {0}")]
    Rpc(String),

    /// Timeout errors
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Channel send errors
    #[error("Channel send error: {0}")]
    ChannelSend(String),

    /// Persistence service errors
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Miner address does not match `0x` + 40 hex characters
    #[error("Invalid miner address: {0}")]
    InvalidAddress(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for the pool server
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a network error that did not originate in reqwest
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create a protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a stratum error
    pub fn stratum(msg: impl Into<String>) -> Self {
        Self::Stratum(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an RPC error
    pub fn rpc(msg: impl Into<String>) -> Self {
        Self::Rpc(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create a channel send error
    pub fn channel_send(msg: impl Into<String>) -> Self {
        Self::ChannelSend(msg.into())
    }

    /// Create a persistence error
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Create an invalid address error
    pub fn invalid_address(msg: impl Into<String>) -> Self {
        Self::InvalidAddress(msg.into())
    }

    /// Create a generic error
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::config("missing field");
        assert_eq!(err.to_string(), "Configuration error: missing field");

        let err = Error::rpc("node unreachable");
        assert_eq!(err.to_string(), "RPC error: node unreachable");

        let err = Error::invalid_address("0x12");
        assert_eq!(err.to_string(), "Invalid miner address: 0x12");
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err: Error = io_err.into();
        assert!(err.to_string().contains("reset"));
    }
}
