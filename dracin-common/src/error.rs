//! Common error types for Dracin

use thiserror::Error;

/// Common result type for Dracin operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the shared configuration helpers
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),
}
