//! Capability enforcement for the capgate layer.
//!
//! The [`CapabilityEnforcer`] sits between the agent's tool-dispatch loop
//! and the tool implementations. Every invocation attempt is checked
//! against the governing [`CapabilityToken`](capgate_primitives::CapabilityToken):
//! grant bit first, then parameter constraints, then required-parameter
//! presence. Every gated attempt lands in the append-only audit log,
//! blocked ones flagged as potential attacks.
//!
//! A blocked call surfaces as an ordinary error to the agent loop, which is
//! expected to keep operating with the denial.

#![warn(missing_docs, clippy::pedantic)]

mod audit;
mod enforcer;

/// Audit trail types and sinks.
pub use audit::{AuditAction, AuditLogEntry, AuditSink, TracingAuditSink};
/// The enforcement gate and its errors.
pub use enforcer::{CapabilityEnforcer, EnforceError, EnforceResult};
