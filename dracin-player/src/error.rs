//! Error types for dracin-player
//!
//! Only collaborator and setup paths return these. Sync failures are logged
//! and swallowed, media rejections are reconciled into store state, and
//! out-of-range numeric input is clamped.

use thiserror::Error;

/// Main error type for dracin-player
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file unreadable, malformed or out of range
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport-level HTTP failure (connect, timeout, body decode)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with a non-success status or `success: false`
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Episode or series not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Media element refused a request (autoplay block, fullscreen denied)
    #[error("Media error: {0}")]
    Media(String),

    /// Invalid state for operation
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl From<dracin_common::Error> for Error {
    fn from(err: dracin_common::Error) -> Self {
        match err {
            dracin_common::Error::Config(msg) => Error::Config(msg),
        }
    }
}

/// Convenience Result type using dracin-player Error
pub type Result<T> = std::result::Result<T, Error>;
