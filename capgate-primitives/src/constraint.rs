//! Parameter-level constraints narrowing a tool grant.

use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A restriction applied to one call parameter of a granted tool.
///
/// Constraints come in a small closed set of kinds, each validated through
/// the same [`Constraint::check`] contract. A constraint that references a
/// parameter absent from the call, or a parameter of the wrong JSON type,
/// fails the check: the gate denies on uncertainty rather than guessing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Constraint {
    /// The named parameter must be a string drawn from the allowed set.
    ValueInSet {
        /// Parameter the constraint applies to.
        parameter: String,
        /// Acceptable values for the parameter.
        allowed: BTreeSet<String>,
    },
    /// The named parameter must be a number within the optional bounds.
    NumericBound {
        /// Parameter the constraint applies to.
        parameter: String,
        /// Inclusive lower bound, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        /// Inclusive upper bound, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
    },
    /// The named parameter must be an array with at most `max` elements.
    CountLimit {
        /// Parameter the constraint applies to.
        parameter: String,
        /// Maximum number of elements permitted.
        max: usize,
    },
}

impl Constraint {
    /// Returns the parameter name this constraint applies to.
    #[must_use]
    pub fn parameter(&self) -> &str {
        match self {
            Self::ValueInSet { parameter, .. }
            | Self::NumericBound { parameter, .. }
            | Self::CountLimit { parameter, .. } => parameter,
        }
    }

    /// Returns a short label identifying the constraint kind.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::ValueInSet { .. } => "value_in_set",
            Self::NumericBound { .. } => "numeric_bound",
            Self::CountLimit { .. } => "count_limit",
        }
    }

    /// Validates the constraint against the supplied call arguments.
    ///
    /// # Errors
    ///
    /// Returns a [`ConstraintViolation`] describing the first failure:
    /// a missing parameter, a JSON type the constraint cannot interpret,
    /// or a value outside the constraint.
    pub fn check(&self, arguments: &Map<String, Value>) -> Result<(), ConstraintViolation> {
        let parameter = self.parameter();
        let Some(value) = arguments.get(parameter) else {
            return Err(self.violation(format!("parameter `{parameter}` is missing")));
        };

        match self {
            Self::ValueInSet { allowed, .. } => {
                let Some(text) = value.as_str() else {
                    return Err(self.violation(format!("parameter `{parameter}` is not a string")));
                };
                if !allowed.contains(text) {
                    return Err(
                        self.violation(format!("value `{text}` is not in the allowed set"))
                    );
                }
            }
            Self::NumericBound { min, max, .. } => {
                let Some(number) = value.as_f64() else {
                    return Err(self.violation(format!("parameter `{parameter}` is not a number")));
                };
                if min.is_some_and(|bound| number < bound) {
                    return Err(self.violation(format!("value {number} is below the minimum")));
                }
                if max.is_some_and(|bound| number > bound) {
                    return Err(self.violation(format!("value {number} is above the maximum")));
                }
            }
            Self::CountLimit { max, .. } => {
                let Some(items) = value.as_array() else {
                    return Err(self.violation(format!("parameter `{parameter}` is not an array")));
                };
                if items.len() > *max {
                    return Err(self.violation(format!(
                        "{} elements exceed the limit of {max}",
                        items.len()
                    )));
                }
            }
        }

        Ok(())
    }

    fn violation(&self, reason: String) -> ConstraintViolation {
        ConstraintViolation {
            constraint: self.label().to_owned(),
            parameter: self.parameter().to_owned(),
            reason,
        }
    }
}

/// Describes why a constraint check failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintViolation {
    constraint: String,
    parameter: String,
    reason: String,
}

impl ConstraintViolation {
    /// Returns the label of the violated constraint kind.
    #[must_use]
    pub fn constraint(&self) -> &str {
        &self.constraint
    }

    /// Returns the parameter the violated constraint applied to.
    #[must_use]
    pub fn parameter(&self) -> &str {
        &self.parameter
    }

    /// Returns the human-readable failure reason.
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl Display for ConstraintViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "constraint `{}` on parameter `{}` violated: {}",
            self.constraint, self.parameter, self.reason
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn arguments(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), v.clone()))
            .collect()
    }

    fn whitelist() -> Constraint {
        Constraint::ValueInSet {
            parameter: "to".into(),
            allowed: ["a@x.com".to_owned()].into_iter().collect(),
        }
    }

    #[test]
    fn value_in_set_accepts_member() {
        let args = arguments(&[("to", json!("a@x.com"))]);
        assert!(whitelist().check(&args).is_ok());
    }

    #[test]
    fn value_in_set_rejects_outsider() {
        let args = arguments(&[("to", json!("evil@y.com"))]);
        let violation = whitelist().check(&args).expect_err("should violate");
        assert_eq!(violation.constraint(), "value_in_set");
        assert_eq!(violation.parameter(), "to");
    }

    #[test]
    fn missing_parameter_is_a_violation() {
        let args = arguments(&[("subject", json!("hi"))]);
        let violation = whitelist().check(&args).expect_err("should violate");
        assert!(violation.reason().contains("missing"));
    }

    #[test]
    fn wrong_type_is_a_violation() {
        let args = arguments(&[("to", json!(42))]);
        assert!(whitelist().check(&args).is_err());
    }

    #[test]
    fn numeric_bound_enforces_range() {
        let bound = Constraint::NumericBound {
            parameter: "amount".into(),
            min: Some(0.0),
            max: Some(100.0),
        };

        let ok = arguments(&[("amount", json!(55))]);
        assert!(bound.check(&ok).is_ok());

        let low = arguments(&[("amount", json!(-1))]);
        assert!(bound.check(&low).is_err());

        let high = arguments(&[("amount", json!(101))]);
        assert!(bound.check(&high).is_err());
    }

    #[test]
    fn count_limit_enforces_length() {
        let limit = Constraint::CountLimit {
            parameter: "recipients".into(),
            max: 2,
        };

        let ok = arguments(&[("recipients", json!(["a", "b"]))]);
        assert!(limit.check(&ok).is_ok());

        let over = arguments(&[("recipients", json!(["a", "b", "c"]))]);
        let violation = limit.check(&over).expect_err("should violate");
        assert!(violation.reason().contains("limit"));
    }

    #[test]
    fn serde_round_trip() {
        let constraint = whitelist();
        let encoded = serde_json::to_string(&constraint).expect("encode");
        assert!(encoded.contains("value_in_set"));
        let decoded: Constraint = serde_json::from_str(&encoded).expect("decode");
        assert_eq!(constraint, decoded);
    }
}
