//! The capability token: the decision artifact issued per user request.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constraint::Constraint;
use crate::error::{Error, Result};
use crate::ids::RequestId;

/// Records which tools are authorized for a single task.
///
/// A token is issued exactly once, by an intent classifier, from the end
/// user's verbatim request. It is read-only afterwards: there is no public
/// operation that widens the grant set, attaches a constraint, or changes
/// the recorded request. Re-classification always yields a fresh token with
/// a new [`RequestId`].
///
/// A tool name absent from the grant map is denied. Use
/// [`CapabilityToken::is_granted`] rather than reading the map directly so
/// that default-deny stays in one place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityToken {
    request_id: RequestId,
    user_request: String,
    granted_tools: BTreeMap<String, bool>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    constraints: BTreeMap<String, Vec<Constraint>>,
    issued_at: DateTime<Utc>,
    confidence: f64,
    classification_method: String,
}

impl CapabilityToken {
    /// Starts building a token for the supplied verbatim user request.
    ///
    /// The request text must be the user's own words. Feeding this builder
    /// any externally-fetched content defeats the security model; see the
    /// crate documentation.
    #[must_use]
    pub fn builder(
        user_request: impl Into<String>,
        classification_method: impl Into<String>,
    ) -> CapabilityTokenBuilder {
        CapabilityTokenBuilder {
            user_request: user_request.into(),
            granted_tools: BTreeMap::new(),
            constraints: BTreeMap::new(),
            confidence: 0.0,
            classification_method: classification_method.into(),
        }
    }

    /// Returns the identifier minted when the token was issued.
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Returns the verbatim user request the classifier saw.
    #[must_use]
    pub fn user_request(&self) -> &str {
        &self.user_request
    }

    /// Returns the full grant map (explicit allow/deny per tool).
    #[must_use]
    pub fn granted_tools(&self) -> &BTreeMap<String, bool> {
        &self.granted_tools
    }

    /// Returns true when the named tool was explicitly granted.
    ///
    /// Absence from the grant map counts as denied.
    #[must_use]
    pub fn is_granted(&self, tool_name: &str) -> bool {
        self.granted_tools.get(tool_name).copied().unwrap_or(false)
    }

    /// Returns every constraint set attached to the token.
    #[must_use]
    pub fn constraints(&self) -> &BTreeMap<String, Vec<Constraint>> {
        &self.constraints
    }

    /// Returns the constraints attached to the named tool, if any.
    #[must_use]
    pub fn constraints_for(&self, tool_name: &str) -> &[Constraint] {
        self.constraints
            .get(tool_name)
            .map_or(&[], Vec::as_slice)
    }

    /// Returns the issue timestamp.
    #[must_use]
    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// Returns the classifier's self-reported certainty in [0, 1].
    #[must_use]
    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    /// Returns the tag of the strategy that produced this token.
    #[must_use]
    pub fn classification_method(&self) -> &str {
        &self.classification_method
    }
}

/// Builder for [`CapabilityToken`].
///
/// Only classifiers (and tests) should drive this builder, and only with the
/// user's original request text.
#[derive(Debug)]
pub struct CapabilityTokenBuilder {
    user_request: String,
    granted_tools: BTreeMap<String, bool>,
    constraints: BTreeMap<String, Vec<Constraint>>,
    confidence: f64,
    classification_method: String,
}

impl CapabilityTokenBuilder {
    /// Records an explicit grant decision for a tool.
    #[must_use]
    pub fn grant(mut self, tool_name: impl Into<String>, granted: bool) -> Self {
        self.granted_tools.insert(tool_name.into(), granted);
        self
    }

    /// Records explicit decisions for a batch of tools.
    #[must_use]
    pub fn grants<I, S>(mut self, decisions: I) -> Self
    where
        I: IntoIterator<Item = (S, bool)>,
        S: Into<String>,
    {
        for (name, granted) in decisions {
            self.granted_tools.insert(name.into(), granted);
        }
        self
    }

    /// Attaches a constraint narrowing the grant for a tool.
    #[must_use]
    pub fn constrain(mut self, tool_name: impl Into<String>, constraint: Constraint) -> Self {
        self.constraints
            .entry(tool_name.into())
            .or_default()
            .push(constraint);
        self
    }

    /// Sets the classifier's self-reported confidence.
    #[must_use]
    pub fn confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    /// Finalises the token, minting its request id and timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidToken`] when the request text or method tag is
    /// empty, and [`Error::InvalidConfidence`] when the confidence is not a
    /// finite number in [0, 1].
    pub fn build(self) -> Result<CapabilityToken> {
        if self.user_request.trim().is_empty() {
            return Err(Error::InvalidToken {
                reason: "user request cannot be empty".into(),
            });
        }

        if self.classification_method.trim().is_empty() {
            return Err(Error::InvalidToken {
                reason: "classification method cannot be empty".into(),
            });
        }

        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(Error::InvalidConfidence {
                value: self.confidence,
            });
        }

        Ok(CapabilityToken {
            request_id: RequestId::random(),
            user_request: self.user_request,
            granted_tools: self.granted_tools,
            constraints: self.constraints,
            issued_at: Utc::now(),
            confidence: self.confidence,
            classification_method: self.classification_method,
        })
    }
}
