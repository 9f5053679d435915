//! Error types for foretask-core

use thiserror::Error;

/// Main error type for the foretask-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport-level HTTP failure (connection, timeout, TLS)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success response from the Forecast API
    #[error("Forecast API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Local key-value store error
    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configured email matched no person in the remote roster
    #[error("no person found with email {0}")]
    UserNotFound(String),
}

impl Error {
    /// True for failures worth retrying (5xx responses and transport errors).
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Error::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Result type alias for foretask-core
pub type Result<T> = std::result::Result<T, Error>;
