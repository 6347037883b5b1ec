//! Core shared types for the capgate capability layer.
//!
//! A [`CapabilityToken`] records which tools an agent may call for one task.
//! It is produced exactly once, by an intent classifier, from the end user's
//! original request, **before** the agent has seen any externally-fetched
//! content. That ordering is the load-bearing invariant of the whole design:
//! nothing a web page, email body, or file can say is able to widen the
//! grant set, because the grant set was fixed while only the user's own
//! words existed.
//!
//! The token constructor path must therefore never be fed fetched content.
//! This is a caller contract, not a runtime check; see the crate-level
//! documentation of `capgate` for the full discussion.

#![warn(missing_docs, clippy::pedantic)]

mod constraint;
mod error;
mod ids;
mod token;

/// Parameter-level restrictions narrowing a grant.
pub use constraint::{Constraint, ConstraintViolation};
/// Error type and result alias shared across the workspace primitives.
pub use error::{Error, Result};
/// Unique identifier minted per classification.
pub use ids::RequestId;
/// The capability decision artifact and its builder.
pub use token::{CapabilityToken, CapabilityTokenBuilder};
