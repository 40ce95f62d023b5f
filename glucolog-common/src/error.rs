//! Common error types for glucolog

use thiserror::Error;

/// Common result type for glucolog operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the glucolog crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Remote authentication rejected or malformed auth response.
    /// Fatal to the current ingestion cycle only.
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Non-success response or malformed payload from the remote graph
    /// endpoint. Fatal to the current ingestion cycle only.
    #[error("Upstream error (status {status}): {message}")]
    Upstream { status: u16, message: String },

    /// Transport-level failure talking to the remote API
    #[error("Network error: {0}")]
    Network(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}
