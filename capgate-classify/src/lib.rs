//! Intent classification for the capgate capability layer.
//!
//! A classifier turns the end user's verbatim request into a
//! [`CapabilityToken`](capgate_primitives::CapabilityToken) by reading the
//! tool catalog and deciding, per tool, whether the request needs it.
//! Strategies are interchangeable behind [`IntentClassifier`]:
//!
//! - [`RuleBasedClassifier`]: deterministic substring rules, pure and free.
//! - [`LlmClassifier`]: asks a chat model, parsing its answer strictly.
//! - [`EmbeddingClassifier`]: cosine similarity between the request and
//!   each tool description.
//! - [`TieredClassifier`]: composes a cheap strategy with an expensive
//!   fallback.
//!
//! Classification must happen **before** the agent fetches any external
//! content, and only the user's own words may reach `classify`. A strategy
//! that cannot decide fails with [`ClassifyError`]; it never hands back a
//! widened grant set.

#![warn(missing_docs, clippy::pedantic)]

mod classifier;
mod embedding;
mod llm;
mod rules;
mod tiered;

/// Strategy trait and classification errors.
pub use classifier::{ClassifyError, ClassifyResult, IntentClassifier};
/// Embedding-similarity strategy.
pub use embedding::EmbeddingClassifier;
/// LLM-backed strategy.
pub use llm::LlmClassifier;
/// Deterministic keyword strategy.
pub use rules::{GrantRule, RuleBasedClassifier, default_rules};
/// Two-tier composition strategy.
pub use tiered::TieredClassifier;
