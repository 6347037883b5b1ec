//! Capability-based tool gating for LLM agents.
//!
//! Capgate prevents prompt-injection attacks architecturally rather than
//! heuristically. A classifier reads the end user's request and issues a
//! [`CapabilityToken`](primitives::CapabilityToken) naming exactly the tools
//! that request needs; the enforcer then gates every tool call the agent
//! attempts against that token. Whatever instructions a fetched web page or
//! email smuggles into the agent's context, tools outside the grant set
//! stay unreachable and the attempt lands in the audit log.
//!
//! # The load-bearing invariant
//!
//! **Classification must happen before the agent ingests any
//! externally-sourced content, and the classifier must only ever see the
//! user's own words.** Tokens are immutable after creation and carry no
//! escalation mechanism, so the grant set fixed at that moment is the
//! ceiling for the whole task. Feeding fetched content into `classify`,
//! or rebuilding a token from it, reintroduces the exact attack channel
//! this crate exists to close. The discipline is a caller contract, not a
//! runtime check; keep the call site where only the raw user request is in
//! scope.
//!
//! A failed classification is an error, never a permissive token:
//! default-deny is the only safe recovery.
//!
//! # Typical wiring
//!
//! 1. Register tools ([`tools::ToolRegistry`]) with definitions and risk
//!    levels.
//! 2. Pick a strategy ([`classify::RuleBasedClassifier`],
//!    [`classify::LlmClassifier`], [`classify::EmbeddingClassifier`], or a
//!    [`classify::TieredClassifier`] composition) and classify the request.
//! 3. Hand the token and every tool-call attempt to
//!    [`enforce::CapabilityEnforcer::execute_tool`].
//! 4. Export [`enforce::CapabilityEnforcer::audit_log`] wherever your
//!    alerting lives.

#![warn(missing_docs, clippy::pedantic)]

/// Re-export shared primitives for convenience.
pub use capgate_primitives as primitives;

/// Tool catalog and registry (enabled by the `tools` feature).
#[cfg(feature = "tools")]
pub use capgate_tools as tools;

/// OpenAI-compatible model clients (enabled by the `adapters` feature).
#[cfg(feature = "adapters")]
pub use capgate_adapters as adapters;

/// Intent classification strategies (enabled by the `classify` feature).
#[cfg(feature = "classify")]
pub use capgate_classify as classify;

/// Enforcement gate and audit trail (enabled by the `enforce` feature).
#[cfg(feature = "enforce")]
pub use capgate_enforce as enforce;
