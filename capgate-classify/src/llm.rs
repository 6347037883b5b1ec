//! LLM-backed intent classification.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use capgate_adapters::traits::{ChatModel, CompletionRequest, MessageRole, PromptMessage};
use capgate_primitives::CapabilityToken;
use capgate_tools::{ToolDefinition, ToolRegistry};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::classifier::{ClassifyError, ClassifyResult, IntentClassifier};

const SYSTEM_INSTRUCTION: &str = "You are a security gate for an autonomous agent. \
Given the catalog of available tools and the user's request, decide which tools are \
genuinely needed to fulfil the request. Grant the minimum set: never grant a tool the \
request does not clearly call for, and never grant a destructive tool on ambiguous \
wording. Respond with exactly one JSON object of the shape \
{\"granted_tools\": {\"<tool_name>\": true or false, ...}, \"confidence\": <number \
between 0 and 1>} and nothing else. Every catalog tool must appear as a key.";

const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 512;
const DEFAULT_TEMPERATURE: f32 = 0.0;

/// Classifier that delegates the grant decision to a chat model.
///
/// The full catalog (names, descriptions, parameters, risk levels) and the
/// verbatim user request are serialized into one completion call; the
/// answer is parsed against a fixed payload shape and validated against the
/// registry. Any transport, parse, or validation failure is a
/// [`ClassifyError`]; the strategy never guesses.
pub struct LlmClassifier {
    model: Arc<dyn ChatModel>,
    registry: Arc<ToolRegistry>,
    method: String,
    max_output_tokens: u32,
    temperature: f32,
}

impl LlmClassifier {
    /// Creates a classifier over the supplied model and registry.
    #[must_use]
    pub fn new(model: Arc<dyn ChatModel>, registry: Arc<ToolRegistry>) -> Self {
        let metadata = model.metadata();
        let method = format!("llm:{}/{}", metadata.provider(), metadata.model());
        Self {
            model,
            registry,
            method,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    /// Overrides the output token budget for the completion call.
    #[must_use]
    pub fn with_max_output_tokens(mut self, tokens: u32) -> Self {
        self.max_output_tokens = tokens;
        self
    }

    /// Overrides the sampling temperature (kept near 0 for determinism).
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    fn build_request(
        &self,
        catalog: &[ToolDefinition],
        user_request: &str,
    ) -> ClassifyResult<CompletionRequest> {
        let serialized = serialize_catalog(catalog);
        let user = format!("Tool catalog:\n{serialized}\n\nUser request:\n{user_request}");

        let request = CompletionRequest::new(vec![
            PromptMessage::new(MessageRole::System, SYSTEM_INSTRUCTION),
            PromptMessage::new(MessageRole::User, user),
        ])?
        .with_temperature(self.temperature)
        .with_max_output_tokens(self.max_output_tokens);

        Ok(request)
    }
}

#[async_trait]
impl IntentClassifier for LlmClassifier {
    async fn classify(&self, user_request: &str) -> ClassifyResult<CapabilityToken> {
        if user_request.trim().is_empty() {
            return Err(ClassifyError::EmptyRequest);
        }

        let catalog = self.registry.definitions();
        let request = self.build_request(&catalog, user_request)?;

        let content = self.model.complete(request).await?;
        let decision = parse_decision(&content)?;

        let catalog_names: Vec<&str> = catalog.iter().map(ToolDefinition::name).collect();
        for name in decision.granted_tools.keys() {
            if !catalog_names.contains(&name.as_str()) {
                warn!(tool = %name, "model response names unregistered tool");
                return Err(ClassifyError::UnknownTool { name: name.clone() });
            }
        }

        if !decision.confidence.is_finite() {
            return Err(ClassifyError::MalformedResponse {
                reason: format!("confidence {} is not a finite number", decision.confidence),
            });
        }
        let confidence = decision.confidence.clamp(0.0, 1.0);

        debug!(
            method = %self.method,
            granted = decision.granted_tools.values().filter(|g| **g).count(),
            confidence,
            "llm classification"
        );

        let token = CapabilityToken::builder(user_request, self.method.as_str())
            .grants(catalog_names.iter().map(|name| {
                let granted = decision
                    .granted_tools
                    .get(*name)
                    .copied()
                    .unwrap_or(false);
                ((*name).to_owned(), granted)
            }))
            .confidence(confidence)
            .build()?;

        Ok(token)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GrantDecision {
    granted_tools: BTreeMap<String, bool>,
    confidence: f64,
}

fn serialize_catalog(catalog: &[ToolDefinition]) -> String {
    let entries: Vec<_> = catalog
        .iter()
        .map(|definition| {
            let parameters: Vec<_> = definition
                .parameters()
                .iter()
                .map(|parameter| {
                    json!({
                        "name": parameter.name(),
                        "type": parameter.kind().to_string(),
                        "description": parameter.description(),
                        "required": parameter.is_required(),
                    })
                })
                .collect();

            json!({
                "name": definition.name(),
                "description": definition.description(),
                "parameters": parameters,
                "risk_level": definition.risk_level().get(),
            })
        })
        .collect();

    serde_json::to_string_pretty(&entries).unwrap_or_else(|_| "[]".to_owned())
}

fn parse_decision(content: &str) -> ClassifyResult<GrantDecision> {
    let stripped = strip_code_fence(content);
    if stripped.is_empty() {
        return Err(ClassifyError::MalformedResponse {
            reason: "response was empty".into(),
        });
    }

    serde_json::from_str(stripped).map_err(|err| ClassifyError::MalformedResponse {
        reason: err.to_string(),
    })
}

/// Tolerates a single surrounding markdown code fence, nothing else.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    use capgate_adapters::traits::{AdapterError, AdapterMetadata, AdapterResult};
    use capgate_tools::{
        ParameterKind, RiskLevel, ToolArguments, ToolDefinitionBuilder, ToolParameter, ToolResult,
    };
    use serde_json::{Value, json};

    struct StaticModel {
        metadata: AdapterMetadata,
        response: Result<String, String>,
    }

    impl StaticModel {
        fn ok(response: &str) -> Arc<Self> {
            Arc::new(Self {
                metadata: AdapterMetadata::new("test", "static"),
                response: Ok(response.to_owned()),
            })
        }

        fn failing(reason: &str) -> Arc<Self> {
            Arc::new(Self {
                metadata: AdapterMetadata::new("test", "static"),
                response: Err(reason.to_owned()),
            })
        }
    }

    #[async_trait]
    impl ChatModel for StaticModel {
        fn metadata(&self) -> &AdapterMetadata {
            &self.metadata
        }

        async fn complete(&self, _request: CompletionRequest) -> AdapterResult<String> {
            match &self.response {
                Ok(content) => Ok(content.clone()),
                Err(reason) => Err(AdapterError::transport(reason.clone())),
            }
        }
    }

    fn registry() -> Arc<ToolRegistry> {
        let registry = ToolRegistry::new();
        for (name, risk) in [("read_website", 2), ("send_email", 4)] {
            let definition = ToolDefinition::builder(name)
                .description(format!("The {name} tool"))
                .and_then(|b| {
                    b.parameter(
                        ToolParameter::new("input", ParameterKind::String, "Input")
                            .unwrap()
                            .required(),
                    )
                })
                .map(|b| b.risk_level(RiskLevel::new(risk).unwrap()))
                .and_then(ToolDefinitionBuilder::build)
                .expect("definition");
            registry
                .register(definition, |_: ToolArguments| async {
                    ToolResult::<Value>::Ok(json!("ok"))
                })
                .unwrap();
        }
        Arc::new(registry)
    }

    #[tokio::test]
    async fn parses_grant_decision() {
        let model = StaticModel::ok(
            r#"{"granted_tools": {"read_website": true, "send_email": false}, "confidence": 0.9}"#,
        );
        let classifier = LlmClassifier::new(model, registry());

        let token = classifier.classify("Read this site").await.unwrap();
        assert!(token.is_granted("read_website"));
        assert!(!token.is_granted("send_email"));
        assert!((token.confidence() - 0.9).abs() < f64::EPSILON);
        assert_eq!(token.classification_method(), "llm:test/static");
    }

    #[tokio::test]
    async fn missing_tools_default_to_denied() {
        let model =
            StaticModel::ok(r#"{"granted_tools": {"read_website": true}, "confidence": 0.8}"#);
        let classifier = LlmClassifier::new(model, registry());

        let token = classifier.classify("Read this site").await.unwrap();
        assert!(token.is_granted("read_website"));
        assert_eq!(token.granted_tools().get("send_email"), Some(&false));
    }

    #[tokio::test]
    async fn unknown_tool_in_response_is_an_error() {
        let model = StaticModel::ok(
            r#"{"granted_tools": {"read_website": true, "launch_rocket": true}, "confidence": 0.8}"#,
        );
        let classifier = LlmClassifier::new(model, registry());

        let err = classifier
            .classify("Read this site")
            .await
            .expect_err("should fail");
        assert!(matches!(err, ClassifyError::UnknownTool { name } if name == "launch_rocket"));
    }

    #[tokio::test]
    async fn fenced_payload_is_tolerated() {
        let model = StaticModel::ok(
            "```json\n{\"granted_tools\": {\"read_website\": true}, \"confidence\": 1.0}\n```",
        );
        let classifier = LlmClassifier::new(model, registry());

        let token = classifier.classify("Read this site").await.unwrap();
        assert!(token.is_granted("read_website"));
    }

    #[tokio::test]
    async fn malformed_payload_is_an_error() {
        for payload in [
            "not json at all",
            r#"{"confidence": 0.5}"#,
            r#"{"granted_tools": {"read_website": true}}"#,
            r#"{"granted_tools": {"read_website": true}, "confidence": 0.5, "extra": 1}"#,
            "",
        ] {
            let classifier = LlmClassifier::new(StaticModel::ok(payload), registry());
            let err = classifier
                .classify("Read this site")
                .await
                .expect_err("should fail");
            assert!(
                matches!(err, ClassifyError::MalformedResponse { .. }),
                "payload {payload:?} produced {err:?}"
            );
        }
    }

    #[tokio::test]
    async fn out_of_range_confidence_is_clamped() {
        let model =
            StaticModel::ok(r#"{"granted_tools": {"read_website": true}, "confidence": 3.5}"#);
        let classifier = LlmClassifier::new(model, registry());

        let token = classifier.classify("Read this site").await.unwrap();
        assert!((token.confidence() - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn model_failure_is_an_error_not_a_grant() {
        let classifier = LlmClassifier::new(StaticModel::failing("connection refused"), registry());
        let err = classifier
            .classify("Read this site")
            .await
            .expect_err("should fail");
        assert!(matches!(err, ClassifyError::Model { .. }));
    }

    #[tokio::test]
    async fn empty_request_rejected() {
        let classifier = LlmClassifier::new(StaticModel::ok("{}"), registry());
        let err = classifier.classify("").await.expect_err("should fail");
        assert!(matches!(err, ClassifyError::EmptyRequest));
    }

    #[test]
    fn catalog_serialization_carries_risk_and_parameters() {
        let catalog = registry().definitions();
        let serialized = serialize_catalog(&catalog);
        assert!(serialized.contains("read_website"));
        assert!(serialized.contains("risk_level"));
        assert!(serialized.contains("required"));
    }

    #[test]
    fn fence_stripping() {
        assert_eq!(strip_code_fence("{\"a\": 1}"), "{\"a\": 1}");
        assert_eq!(strip_code_fence("```json\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("  {} "), "{}");
    }
}
