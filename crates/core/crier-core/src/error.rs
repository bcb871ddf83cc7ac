//! Error types for the Crier core

use crate::types::GuildId;
use thiserror::Error;

/// Main error type for Crier operations
#[derive(Debug, Error)]
pub enum CrierError {
    /// A join was requested by a user with no voice presence
    #[error("you are not in a voice channel")]
    NotInVoiceChannel,

    /// An operation targeted a guild without an active voice session
    #[error("no active voice session for guild {0}")]
    NoActiveSession(GuildId),

    /// Speech synthesis errored or timed out
    #[error("synthesis failed: {0}")]
    Synthesis(String),

    /// The voice transport reported a playback problem
    #[error("playback failed: {0}")]
    Playback(String),

    /// Connecting to or leaving a voice channel failed
    #[error("voice gateway error: {0}")]
    Gateway(String),

    /// The profile store could not be read or written
    #[error("profile store unavailable: {0}")]
    Store(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Database operation error (from sqlx)
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Network/HTTP error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

/// Convenient Result type using CrierError
pub type Result<T> = std::result::Result<T, CrierError>;

impl CrierError {
    /// Create a synthesis error
    pub fn synthesis(msg: impl Into<String>) -> Self {
        CrierError::Synthesis(msg.into())
    }

    /// Create a playback error
    pub fn playback(msg: impl Into<String>) -> Self {
        CrierError::Playback(msg.into())
    }

    /// Create a gateway error
    pub fn gateway(msg: impl Into<String>) -> Self {
        CrierError::Gateway(msg.into())
    }

    /// Create a store error
    pub fn store(msg: impl Into<String>) -> Self {
        CrierError::Store(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        CrierError::Config(msg.into())
    }

    /// Create a generic error
    pub fn other(msg: impl Into<String>) -> Self {
        CrierError::Other(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CrierError::synthesis("engine unreachable");
        assert_eq!(err.to_string(), "synthesis failed: engine unreachable");

        let err = CrierError::NoActiveSession(42);
        assert_eq!(err.to_string(), "no active voice session for guild 42");
    }
}
