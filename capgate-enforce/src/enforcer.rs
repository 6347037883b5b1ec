//! The enforcement gate: grant check, constraints, invocation, audit.

use std::fmt;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use capgate_primitives::{CapabilityToken, ConstraintViolation};
use capgate_tools::{ToolArguments, ToolError, ToolRegistry};

use crate::audit::{AuditAction, AuditLogEntry, AuditSink};

/// Result alias for enforcement operations.
pub type EnforceResult<T> = Result<T, EnforceError>;

/// Errors surfaced by [`CapabilityEnforcer::execute_tool`].
#[derive(Debug, Error)]
pub enum EnforceError {
    /// The tool is not in the registry: a configuration failure, not a
    /// security block.
    #[error("tool `{name}` is not registered")]
    ToolNotFound {
        /// Name of the missing tool.
        name: String,
    },

    /// The governing token does not grant the tool. Always audited with the
    /// potential-attack flag.
    #[error("permission denied for tool `{name}`")]
    PermissionDenied {
        /// Name of the denied tool.
        name: String,
    },

    /// The tool is granted but a parameter constraint failed. Always
    /// audited with the potential-attack flag.
    #[error("tool `{name}` blocked: {violation}")]
    ConstraintViolation {
        /// Name of the constrained tool.
        name: String,
        /// The violated constraint and reason.
        violation: ConstraintViolation,
    },

    /// Required parameters were absent from the call.
    #[error("tool `{name}` call is missing required parameters: {}", .parameters.join(", "))]
    MissingParameters {
        /// Name of the tool.
        name: String,
        /// The absent parameter names.
        parameters: Vec<String>,
    },

    /// The implementation itself failed. Audited as an execution failure,
    /// not flagged as an attack.
    #[error("tool `{name}` execution failed")]
    Execution {
        /// Name of the failing tool.
        name: String,
        /// Underlying implementation error.
        #[source]
        source: ToolError,
    },
}

/// Gates every tool invocation against a capability token.
///
/// The enforcer consults the same [`ToolRegistry`] the classifiers read,
/// validates the token's grant bit and constraints before touching the
/// implementation, and appends exactly one audit entry per gated call,
/// whether allowed, blocked, or failed. Audit appends are serialized behind a
/// mutex; tokens are immutable, so concurrent calls share them freely.
pub struct CapabilityEnforcer {
    registry: Arc<ToolRegistry>,
    audit: Mutex<Vec<AuditLogEntry>>,
    sinks: Vec<Arc<dyn AuditSink>>,
}

impl fmt::Debug for CapabilityEnforcer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.audit.lock().expect("audit log poisoned").len();
        f.debug_struct("CapabilityEnforcer")
            .field("registry", &self.registry)
            .field("audit_entries", &entries)
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

impl CapabilityEnforcer {
    /// Creates an enforcer over the supplied registry.
    #[must_use]
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            audit: Mutex::new(Vec::new()),
            sinks: Vec::new(),
        }
    }

    /// Attaches a sink notified for every appended audit entry.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Executes a tool call under the supplied token.
    ///
    /// Checks run in order and short-circuit: registry lookup, grant bit,
    /// parameter constraints, required parameters, then the invocation
    /// itself. Every gated attempt appends one audit entry.
    ///
    /// # Errors
    ///
    /// Returns the [`EnforceError`] variant matching the first failed
    /// check; implementation failures are wrapped in
    /// [`EnforceError::Execution`].
    ///
    /// # Panics
    ///
    /// Panics if the internal audit lock is poisoned.
    pub async fn execute_tool(
        &self,
        tool_name: &str,
        token: &CapabilityToken,
        arguments: ToolArguments,
    ) -> EnforceResult<Value> {
        let Some(handle) = self.registry.get(tool_name) else {
            return Err(EnforceError::ToolNotFound {
                name: tool_name.to_owned(),
            });
        };

        if !token.is_granted(tool_name) {
            warn!(
                tool = tool_name,
                request_id = %token.request_id(),
                "tool call blocked: not granted"
            );
            self.append(AuditLogEntry::new(
                tool_name,
                AuditAction::BlockedByGrant,
                token,
                &arguments,
                None,
                Some(format!("tool `{tool_name}` is not in the grant set")),
            ));
            return Err(EnforceError::PermissionDenied {
                name: tool_name.to_owned(),
            });
        }

        for constraint in token.constraints_for(tool_name) {
            if let Err(violation) = constraint.check(&arguments) {
                warn!(
                    tool = tool_name,
                    request_id = %token.request_id(),
                    %violation,
                    "tool call blocked: constraint violated"
                );
                self.append(AuditLogEntry::new(
                    tool_name,
                    AuditAction::BlockedByConstraint,
                    token,
                    &arguments,
                    None,
                    Some(violation.to_string()),
                ));
                return Err(EnforceError::ConstraintViolation {
                    name: tool_name.to_owned(),
                    violation,
                });
            }
        }

        let missing: Vec<String> = handle
            .definition()
            .missing_required(&arguments)
            .into_iter()
            .map(ToOwned::to_owned)
            .collect();
        if !missing.is_empty() {
            self.append(AuditLogEntry::new(
                tool_name,
                AuditAction::ExecutionFailed,
                token,
                &arguments,
                None,
                Some(format!(
                    "missing required parameters: {}",
                    missing.join(", ")
                )),
            ));
            return Err(EnforceError::MissingParameters {
                name: tool_name.to_owned(),
                parameters: missing,
            });
        }

        match handle.invoke(arguments.clone()).await {
            Ok(outcome) => {
                debug!(
                    tool = tool_name,
                    request_id = %token.request_id(),
                    "tool call executed"
                );
                self.append(AuditLogEntry::new(
                    tool_name,
                    AuditAction::GrantedAndExecuted,
                    token,
                    &arguments,
                    Some(outcome.clone()),
                    None,
                ));
                Ok(outcome)
            }
            Err(source) => {
                self.append(AuditLogEntry::new(
                    tool_name,
                    AuditAction::ExecutionFailed,
                    token,
                    &arguments,
                    None,
                    Some(source.to_string()),
                ));
                Err(EnforceError::Execution {
                    name: tool_name.to_owned(),
                    source,
                })
            }
        }
    }

    /// Returns the full audit history in append order.
    ///
    /// # Panics
    ///
    /// Panics if the internal audit lock is poisoned.
    #[must_use]
    pub fn audit_log(&self) -> Vec<AuditLogEntry> {
        self.audit.lock().expect("audit log poisoned").clone()
    }

    /// Returns only the entries flagged as potential attacks.
    ///
    /// # Panics
    ///
    /// Panics if the internal audit lock is poisoned.
    #[must_use]
    pub fn blocked_attempts(&self) -> Vec<AuditLogEntry> {
        self.audit
            .lock()
            .expect("audit log poisoned")
            .iter()
            .filter(|entry| entry.potential_attack())
            .cloned()
            .collect()
    }

    /// Clears the audit history. Explicit callers only (between test runs
    /// or sessions); nothing in the core calls this implicitly.
    ///
    /// # Panics
    ///
    /// Panics if the internal audit lock is poisoned.
    pub fn clear_audit_log(&self) {
        self.audit.lock().expect("audit log poisoned").clear();
    }

    fn append(&self, entry: AuditLogEntry) {
        for sink in &self.sinks {
            sink.record(&entry);
        }
        self.audit.lock().expect("audit log poisoned").push(entry);
    }
}
