//! Deterministic keyword-to-tool-set classification.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use capgate_primitives::CapabilityToken;
use capgate_tools::ToolRegistry;
use tracing::{debug, warn};

use crate::classifier::{ClassifyError, ClassifyResult, IntentClassifier};

const METHOD: &str = "rule-based";

/// One ordered rule: a trigger phrase and the tools it justifies.
#[derive(Debug, Clone)]
pub struct GrantRule {
    trigger: String,
    tools: Vec<String>,
}

impl GrantRule {
    /// Creates a rule from a trigger phrase and tool names.
    ///
    /// The trigger is matched case-insensitively as a substring of the
    /// request.
    ///
    /// # Errors
    ///
    /// Returns [`ClassifyError::InvalidConfiguration`] when the trigger is
    /// empty or no tools are named.
    pub fn new<I, S>(trigger: impl Into<String>, tools: I) -> ClassifyResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let trigger = trigger.into().trim().to_lowercase();
        if trigger.is_empty() {
            return Err(ClassifyError::InvalidConfiguration {
                reason: "rule trigger cannot be empty".into(),
            });
        }

        let tools: Vec<String> = tools.into_iter().map(Into::into).collect();
        if tools.is_empty() {
            return Err(ClassifyError::InvalidConfiguration {
                reason: format!("rule `{trigger}` names no tools"),
            });
        }

        Ok(Self { trigger, tools })
    }

    /// Returns the lowercased trigger phrase.
    #[must_use]
    pub fn trigger(&self) -> &str {
        &self.trigger
    }

    /// Returns the tool names this rule grants.
    #[must_use]
    pub fn tools(&self) -> &[String] {
        &self.tools
    }
}

/// Deterministic substring classifier.
///
/// Scans every rule, never stopping at the first match, so a multi-intent
/// request ("summarize this and email me") accumulates grants from each
/// matching rule. Tools no rule mentions stay denied. Confidence is 1.0
/// when at least one rule matched and 0.0 when none did ("everything
/// denied, no evidence"). Pure and synchronous; the default-deny fallback
/// tier for [`TieredClassifier`](crate::TieredClassifier).
#[derive(Debug)]
pub struct RuleBasedClassifier {
    registry: Arc<ToolRegistry>,
    rules: Vec<GrantRule>,
}

impl RuleBasedClassifier {
    /// Creates a classifier over the supplied registry and rule table.
    #[must_use]
    pub fn new(registry: Arc<ToolRegistry>, rules: Vec<GrantRule>) -> Self {
        Self { registry, rules }
    }

    /// Returns the configured rules in evaluation order.
    #[must_use]
    pub fn rules(&self) -> &[GrantRule] {
        &self.rules
    }
}

#[async_trait]
impl IntentClassifier for RuleBasedClassifier {
    async fn classify(&self, user_request: &str) -> ClassifyResult<CapabilityToken> {
        if user_request.trim().is_empty() {
            return Err(ClassifyError::EmptyRequest);
        }

        let lowered = user_request.to_lowercase();
        let catalog: BTreeSet<String> = self.registry.tool_names().into_iter().collect();

        let mut granted = BTreeSet::new();
        let mut matched = false;

        for rule in &self.rules {
            if !lowered.contains(rule.trigger()) {
                continue;
            }
            matched = true;
            for tool in rule.tools() {
                if catalog.contains(tool) {
                    granted.insert(tool.clone());
                } else {
                    warn!(rule = rule.trigger(), tool = %tool, "rule names unregistered tool, skipping");
                }
            }
        }

        let confidence = if matched { 1.0 } else { 0.0 };
        debug!(
            request = user_request,
            granted = granted.len(),
            confidence,
            "rule-based classification"
        );

        let token = CapabilityToken::builder(user_request, METHOD)
            .grants(
                catalog
                    .iter()
                    .map(|name| (name.clone(), granted.contains(name))),
            )
            .confidence(confidence)
            .build()?;

        Ok(token)
    }
}

/// Stock rule table for the demo toolset
/// (`read_website`, `send_email`, `search_emails`).
///
/// Real deployments supply their own table; this one exists so the demos
/// and tests share a baseline.
///
/// # Panics
///
/// Panics if the built-in table is invalid. The table is constant and
/// verified by tests.
#[must_use]
pub fn default_rules() -> Vec<GrantRule> {
    let table: &[(&str, &[&str])] = &[
        ("summarize", &["read_website"]),
        ("read", &["read_website"]),
        ("fetch", &["read_website"]),
        ("website", &["read_website"]),
        ("http", &["read_website"]),
        ("email", &["send_email"]),
        ("send", &["send_email"]),
        ("search", &["search_emails"]),
        ("find", &["search_emails"]),
    ];

    table
        .iter()
        .map(|(trigger, tools)| {
            GrantRule::new(*trigger, tools.iter().copied()).expect("stock rule is valid")
        })
        .collect()
}
