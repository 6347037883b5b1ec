//! Static tool metadata read by classifiers and the enforcer.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::registry::{ToolArguments, ToolError, ToolResult};

const MAX_NAME_LEN: usize = 64;

/// How risky a tool invocation is, from 1 (read-only, no side effect) to
/// 5 (irreversible or destructive).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct RiskLevel(u8);

impl RiskLevel {
    /// Lowest risk: read-only, no side effect.
    pub const MIN: Self = Self(1);
    /// Highest risk: irreversible or destructive.
    pub const MAX: Self = Self(5);

    /// Creates a risk level after validating the 1–5 range.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidDefinition`] when the level is outside
    /// the supported range.
    pub fn new(level: u8) -> ToolResult<Self> {
        if !(Self::MIN.0..=Self::MAX.0).contains(&level) {
            return Err(ToolError::InvalidDefinition {
                reason: format!("risk level {level} is outside 1..=5"),
            });
        }
        Ok(Self(level))
    }

    /// Returns the numeric level.
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for RiskLevel {
    type Error = ToolError;

    fn try_from(value: u8) -> ToolResult<Self> {
        Self::new(value)
    }
}

impl From<RiskLevel> for u8 {
    fn from(value: RiskLevel) -> Self {
        value.0
    }
}

impl Display for RiskLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// Semantic type tag for a tool parameter.
///
/// Informational only: classifiers read it to describe the tool, the
/// enforcer does not coerce values against it.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterKind {
    /// Free text.
    String,
    /// Integer or float.
    Number,
    /// True or false.
    Boolean,
    /// Ordered list of values.
    Array,
    /// Nested key/value structure.
    Object,
}

impl Display for ParameterKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        })
    }
}

/// Declares one named parameter of a tool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolParameter {
    name: String,
    kind: ParameterKind,
    description: String,
    #[serde(default)]
    required: bool,
}

impl ToolParameter {
    /// Creates an optional parameter with the supplied name and kind.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidDefinition`] when the name fails
    /// identifier validation.
    pub fn new(
        name: impl Into<String>,
        kind: ParameterKind,
        description: impl Into<String>,
    ) -> ToolResult<Self> {
        let name = name.into();
        validate_identifier(&name, "parameter")?;
        Ok(Self {
            name,
            kind,
            description: description.into(),
            required: false,
        })
    }

    /// Marks the parameter as required for invocation.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Returns the parameter name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the semantic type tag.
    #[must_use]
    pub const fn kind(&self) -> ParameterKind {
        self.kind
    }

    /// Returns the free-text description consumed by classifiers.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns true when the parameter must be supplied at call time.
    #[must_use]
    pub const fn is_required(&self) -> bool {
        self.required
    }
}

/// Static metadata describing a callable action and its risk.
///
/// Immutable once registered; the description is the primary signal a
/// classifier has when deciding whether the tool serves a request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDefinition {
    name: String,
    description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    parameters: Vec<ToolParameter>,
    risk_level: RiskLevel,
    #[serde(default)]
    requires_confirmation: bool,
}

impl ToolDefinition {
    /// Starts building a definition for the supplied tool name.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> ToolDefinitionBuilder {
        ToolDefinitionBuilder {
            name: name.into(),
            description: None,
            parameters: Vec::new(),
            risk_level: None,
            requires_confirmation: false,
        }
    }

    /// Returns the globally unique tool name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the free-text description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the declared parameters in declaration order.
    #[must_use]
    pub fn parameters(&self) -> &[ToolParameter] {
        &self.parameters
    }

    /// Returns the declared risk level.
    #[must_use]
    pub const fn risk_level(&self) -> RiskLevel {
        self.risk_level
    }

    /// Returns true when out-of-band human confirmation is advised.
    ///
    /// Advisory only; acting on it is a collaborator concern.
    #[must_use]
    pub const fn requires_confirmation(&self) -> bool {
        self.requires_confirmation
    }

    /// Returns the names of required parameters absent from the arguments.
    #[must_use]
    pub fn missing_required(&self, arguments: &ToolArguments) -> Vec<&str> {
        self.parameters
            .iter()
            .filter(|parameter| parameter.is_required() && !arguments.contains_key(parameter.name()))
            .map(ToolParameter::name)
            .collect()
    }
}

/// Builder for [`ToolDefinition`].
#[derive(Debug)]
pub struct ToolDefinitionBuilder {
    name: String,
    description: Option<String>,
    parameters: Vec<ToolParameter>,
    risk_level: Option<RiskLevel>,
    requires_confirmation: bool,
}

impl ToolDefinitionBuilder {
    /// Sets the description classifiers read.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidDefinition`] when the description is
    /// empty.
    pub fn description(mut self, description: impl Into<String>) -> ToolResult<Self> {
        let description = description.into();
        if description.trim().is_empty() {
            return Err(ToolError::InvalidDefinition {
                reason: "description cannot be empty".into(),
            });
        }
        self.description = Some(description);
        Ok(self)
    }

    /// Appends a parameter declaration.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidDefinition`] when a parameter with the
    /// same name was already declared.
    pub fn parameter(mut self, parameter: ToolParameter) -> ToolResult<Self> {
        if self.parameters.iter().any(|p| p.name() == parameter.name()) {
            return Err(ToolError::InvalidDefinition {
                reason: format!("duplicate parameter `{}`", parameter.name()),
            });
        }
        self.parameters.push(parameter);
        Ok(self)
    }

    /// Sets the risk level.
    #[must_use]
    pub fn risk_level(mut self, risk_level: RiskLevel) -> Self {
        self.risk_level = Some(risk_level);
        self
    }

    /// Advises out-of-band human confirmation before execution.
    #[must_use]
    pub fn requires_confirmation(mut self) -> Self {
        self.requires_confirmation = true;
        self
    }

    /// Finalises the definition.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidDefinition`] when the name fails
    /// identifier validation or a required field is missing.
    pub fn build(self) -> ToolResult<ToolDefinition> {
        validate_identifier(&self.name, "tool")?;

        let description = self.description.ok_or_else(|| ToolError::InvalidDefinition {
            reason: "description must be provided".into(),
        })?;

        let risk_level = self.risk_level.ok_or_else(|| ToolError::InvalidDefinition {
            reason: "risk level must be provided".into(),
        })?;

        Ok(ToolDefinition {
            name: self.name,
            description,
            parameters: self.parameters,
            risk_level,
            requires_confirmation: self.requires_confirmation,
        })
    }
}

fn validate_identifier(name: &str, what: &str) -> ToolResult<()> {
    if name.is_empty() {
        return Err(ToolError::InvalidDefinition {
            reason: format!("{what} name cannot be empty"),
        });
    }

    if name.len() > MAX_NAME_LEN {
        return Err(ToolError::InvalidDefinition {
            reason: format!("{what} name length must be <= {MAX_NAME_LEN}"),
        });
    }

    if !name
        .chars()
        .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '-' | '_' | '.'))
    {
        return Err(ToolError::InvalidDefinition {
            reason: format!(
                "{what} name must contain lowercase alphanumeric, dash, underscore, or dot"
            ),
        });
    }

    Ok(())
}
