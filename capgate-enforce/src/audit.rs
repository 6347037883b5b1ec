//! Append-only audit records for every gated tool call.

use std::fmt::{self, Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use capgate_primitives::{CapabilityToken, RequestId};
use capgate_tools::ToolArguments;

/// What happened to one enforcement attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// The call passed every check and the implementation ran.
    GrantedAndExecuted,
    /// The tool was not in the token's grant set.
    BlockedByGrant,
    /// The tool was granted but a parameter constraint failed.
    BlockedByConstraint,
    /// The call was authorized but the invocation itself failed.
    ExecutionFailed,
}

impl AuditAction {
    /// Returns true for the blocked variants, the ones that indicate a
    /// potential attack.
    #[must_use]
    pub const fn is_blocked(self) -> bool {
        matches!(self, Self::BlockedByGrant | Self::BlockedByConstraint)
    }
}

impl Display for AuditAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::GrantedAndExecuted => "granted_and_executed",
            Self::BlockedByGrant => "blocked_by_grant",
            Self::BlockedByConstraint => "blocked_by_constraint",
            Self::ExecutionFailed => "execution_failed",
        })
    }
}

/// One immutable record of a gated tool call.
///
/// Entries link back to the governing token via its request id and carry a
/// full clone of the token so the record stays meaningful after
/// re-classification. Nothing mutates an entry after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    timestamp: DateTime<Utc>,
    request_id: RequestId,
    tool_name: String,
    action: AuditAction,
    token: CapabilityToken,
    arguments: ToolArguments,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    outcome: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    potential_attack: bool,
}

impl AuditLogEntry {
    pub(crate) fn new(
        tool_name: &str,
        action: AuditAction,
        token: &CapabilityToken,
        arguments: &ToolArguments,
        outcome: Option<Value>,
        error: Option<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            request_id: token.request_id(),
            tool_name: tool_name.to_owned(),
            action,
            token: token.clone(),
            arguments: arguments.clone(),
            outcome,
            error,
            potential_attack: action.is_blocked(),
        }
    }

    /// Returns the time the entry was recorded.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Returns the id of the token that governed the call.
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Returns the tool the call targeted.
    #[must_use]
    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    /// Returns what happened to the call.
    #[must_use]
    pub const fn action(&self) -> AuditAction {
        self.action
    }

    /// Returns the token that governed the call.
    #[must_use]
    pub fn token(&self) -> &CapabilityToken {
        &self.token
    }

    /// Returns the arguments the call supplied.
    #[must_use]
    pub fn arguments(&self) -> &ToolArguments {
        &self.arguments
    }

    /// Returns the implementation's result, when the call executed.
    #[must_use]
    pub fn outcome(&self) -> Option<&Value> {
        self.outcome.as_ref()
    }

    /// Returns the error message, when the call was blocked or failed.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Returns true when the entry records a blocked attempt.
    #[must_use]
    pub const fn potential_attack(&self) -> bool {
        self.potential_attack
    }
}

/// Observer notified for every appended audit entry.
///
/// The export seam for SIEM or alerting pipelines: the enforcer hands each
/// entry over synchronously, delivery is the sink's concern.
pub trait AuditSink: Send + Sync {
    /// Records the supplied entry.
    fn record(&self, entry: &AuditLogEntry);
}

/// Sink that forwards entries to the tracing system.
#[derive(Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, entry: &AuditLogEntry) {
        if entry.potential_attack() {
            warn!(
                tool = entry.tool_name(),
                action = %entry.action(),
                request_id = %entry.request_id(),
                error = entry.error().unwrap_or_default(),
                "blocked tool call audited"
            );
        } else {
            debug!(
                tool = entry.tool_name(),
                action = %entry.action(),
                request_id = %entry.request_id(),
                "tool call audited"
            );
        }
    }
}
