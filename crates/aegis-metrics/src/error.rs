//! Error types for metrics ingestion.
//!
//! Malformed exposition text has no variant here: the parser degrades
//! to partial data instead of failing.

use thiserror::Error;

/// Result type alias for poller lifecycle operations.
pub type PollResult<T> = Result<T, PollError>;

/// A scrape that did not produce an exposition body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("invalid endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// Misuse of the poller lifecycle.
#[derive(Debug, Error)]
pub enum PollError {
    #[error("poller already started")]
    AlreadyStarted,

    #[error("poller not started")]
    NotStarted,

    #[error("poll interval must be non-zero")]
    InvalidInterval,
}
