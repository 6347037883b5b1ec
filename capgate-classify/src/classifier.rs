//! Classifier trait and error taxonomy.

use async_trait::async_trait;
use capgate_adapters::traits::AdapterError;
use capgate_primitives::{CapabilityToken, Error as TokenError};
use thiserror::Error;

/// Result alias for classification operations.
pub type ClassifyResult<T> = Result<T, ClassifyError>;

/// Errors surfaced when a strategy cannot reach a decision.
///
/// Every variant means "no token was issued". The safe recovery at the
/// caller is default-deny; substituting a permissive token for a failed
/// classification defeats the security model.
#[derive(Debug, Error)]
pub enum ClassifyError {
    /// The request text was empty or whitespace.
    #[error("user request cannot be empty")]
    EmptyRequest,

    /// A rule or threshold was misconfigured.
    #[error("invalid classifier configuration: {reason}")]
    InvalidConfiguration {
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// The model call failed (transport, timeout, provider error).
    #[error("model call failed: {source}")]
    Model {
        /// Underlying adapter failure.
        #[from]
        source: AdapterError,
    },

    /// The model's answer did not match the required payload shape.
    #[error("malformed classification response: {reason}")]
    MalformedResponse {
        /// What was wrong with the payload.
        reason: String,
    },

    /// The model granted or mentioned a tool that is not registered.
    #[error("classification response names unknown tool `{name}`")]
    UnknownTool {
        /// The unregistered tool name.
        name: String,
    },

    /// Token construction rejected the strategy's output.
    #[error("token construction failed: {source}")]
    Token {
        /// Underlying primitive validation failure.
        #[from]
        source: TokenError,
    },
}

/// Strategy that maps a user request to a capability token.
///
/// # Contract
///
/// `user_request` must be non-empty and contain only the user's own words,
/// never content fetched from the outside world. The returned token carries
/// an explicit grant decision for every tool currently registered, a
/// confidence in [0, 1], and the request text verbatim.
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    /// Produces a capability token for the supplied request.
    ///
    /// # Errors
    ///
    /// Returns [`ClassifyError`] when no decision could be reached. Callers
    /// must treat that as deny-everything, never as grant-everything.
    async fn classify(&self, user_request: &str) -> ClassifyResult<CapabilityToken>;
}
