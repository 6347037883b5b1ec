//! Shared error definitions for capgate primitives.

use thiserror::Error;
use uuid::Error as UuidError;

/// Result alias used throughout the primitives crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while constructing primitive types.
#[derive(Debug, Error)]
pub enum Error {
    /// The provided request identifier could not be parsed.
    #[error("invalid request id: {source}")]
    InvalidRequestId {
        /// Source parsing error from the UUID library.
        #[from]
        source: UuidError,
    },

    /// Token construction failed validation.
    #[error("invalid capability token: {reason}")]
    InvalidToken {
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// Confidence value was outside the accepted range.
    #[error("confidence {value} is not a finite number in [0, 1]")]
    InvalidConfidence {
        /// The offending value.
        value: f64,
    },
}
