//! Embedding-similarity intent classification.

use std::sync::Arc;

use async_trait::async_trait;
use capgate_adapters::traits::EmbeddingModel;
use capgate_primitives::CapabilityToken;
use capgate_tools::{ToolDefinition, ToolParameter, ToolRegistry};
use tracing::debug;

use crate::classifier::{ClassifyError, ClassifyResult, IntentClassifier};

/// Default similarity threshold; 0.3–0.5 is the useful band.
pub const DEFAULT_THRESHOLD: f32 = 0.4;

/// Classifier that grants tools whose descriptions are semantically close
/// to the request.
///
/// One batch embeddings call covers the request plus every tool's enriched
/// description; a tool is granted when its cosine similarity is strictly
/// above the threshold. Confidence is the best similarity seen, clamped to
/// [0, 1]. Cheaper and faster than the LLM strategy, but it cannot extract
/// constraints.
pub struct EmbeddingClassifier {
    model: Arc<dyn EmbeddingModel>,
    registry: Arc<ToolRegistry>,
    method: String,
    threshold: f32,
}

impl EmbeddingClassifier {
    /// Creates a classifier with the default threshold.
    #[must_use]
    pub fn new(model: Arc<dyn EmbeddingModel>, registry: Arc<ToolRegistry>) -> Self {
        let method = format!("embedding:{}", model.metadata().model());
        Self {
            model,
            registry,
            method,
            threshold: DEFAULT_THRESHOLD,
        }
    }

    /// Overrides the similarity threshold.
    ///
    /// Higher values grant less (fewer false positives); lower values grant
    /// more.
    ///
    /// # Errors
    ///
    /// Returns [`ClassifyError::InvalidConfiguration`] when the threshold is
    /// not a finite number in [0, 1].
    pub fn with_threshold(mut self, threshold: f32) -> ClassifyResult<Self> {
        if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
            return Err(ClassifyError::InvalidConfiguration {
                reason: format!("threshold {threshold} is not a finite number in [0, 1]"),
            });
        }
        self.threshold = threshold;
        Ok(self)
    }
}

#[async_trait]
impl IntentClassifier for EmbeddingClassifier {
    async fn classify(&self, user_request: &str) -> ClassifyResult<CapabilityToken> {
        if user_request.trim().is_empty() {
            return Err(ClassifyError::EmptyRequest);
        }

        let catalog = self.registry.definitions();
        if catalog.is_empty() {
            let token = CapabilityToken::builder(user_request, self.method.as_str())
                .confidence(0.0)
                .build()?;
            return Ok(token);
        }

        let mut inputs = Vec::with_capacity(catalog.len() + 1);
        inputs.push(user_request.to_owned());
        inputs.extend(catalog.iter().map(enrich_description));

        let vectors = self.model.embed(&inputs).await?;
        let (request_vector, tool_vectors) = vectors
            .split_first()
            .ok_or_else(|| ClassifyError::MalformedResponse {
                reason: "embeddings response was empty".into(),
            })?;

        let mut best = 0.0_f32;
        let mut grants = Vec::with_capacity(catalog.len());
        for (definition, vector) in catalog.iter().zip(tool_vectors) {
            let similarity = cosine_similarity(request_vector, vector);
            best = best.max(similarity);
            grants.push((definition.name().to_owned(), similarity > self.threshold));
            debug!(
                tool = definition.name(),
                similarity,
                threshold = self.threshold,
                "embedding similarity"
            );
        }

        let confidence = f64::from(best.clamp(0.0, 1.0));
        let token = CapabilityToken::builder(user_request, self.method.as_str())
            .grants(grants)
            .confidence(confidence)
            .build()?;

        Ok(token)
    }
}

/// Folds parameter names into the description so near-identical tools
/// separate in embedding space.
fn enrich_description(definition: &ToolDefinition) -> String {
    let parameters = if definition.parameters().is_empty() {
        "none".to_owned()
    } else {
        definition
            .parameters()
            .iter()
            .map(ToolParameter::name)
            .collect::<Vec<_>>()
            .join(", ")
    };

    format!("{}. Parameters: {parameters}", definition.description())
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    use capgate_adapters::traits::{AdapterMetadata, AdapterResult};
    use capgate_tools::{
        ParameterKind, RiskLevel, ToolArguments, ToolDefinitionBuilder, ToolResult,
    };
    use serde_json::{Value, json};

    /// Maps recognisable substrings to fixed unit vectors.
    struct StaticEmbeddings {
        metadata: AdapterMetadata,
    }

    impl StaticEmbeddings {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                metadata: AdapterMetadata::new("test", "static-embed"),
            })
        }
    }

    #[async_trait]
    impl EmbeddingModel for StaticEmbeddings {
        fn metadata(&self) -> &AdapterMetadata {
            &self.metadata
        }

        async fn embed(&self, inputs: &[String]) -> AdapterResult<Vec<Vec<f32>>> {
            Ok(inputs
                .iter()
                .map(|input| {
                    let lowered = input.to_lowercase();
                    if lowered.contains("read") || lowered.contains("url") {
                        vec![1.0, 0.0]
                    } else if lowered.contains("email") {
                        vec![0.0, 1.0]
                    } else {
                        vec![0.0, 0.0]
                    }
                })
                .collect())
        }
    }

    fn registry() -> Arc<ToolRegistry> {
        let registry = ToolRegistry::new();
        for (name, description, risk) in [
            ("read_website", "Read content from a URL", 2),
            ("send_email", "Send an email message", 4),
        ] {
            let definition = ToolDefinition::builder(name)
                .description(description)
                .and_then(|b| {
                    b.parameter(capgate_tools::ToolParameter::new(
                        "input",
                        ParameterKind::String,
                        "Input",
                    )?)
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
    async fn grants_above_threshold_only() {
        let classifier = EmbeddingClassifier::new(StaticEmbeddings::new(), registry())
            .with_threshold(0.5)
            .unwrap();

        let token = classifier.classify("read url").await.unwrap();
        assert!(token.is_granted("read_website"));
        assert!(!token.is_granted("send_email"));
        assert!((token.confidence() - 1.0).abs() < 1e-6);
        assert_eq!(token.classification_method(), "embedding:static-embed");
    }

    #[tokio::test]
    async fn unrelated_request_denies_everything() {
        let classifier = EmbeddingClassifier::new(StaticEmbeddings::new(), registry());
        let token = classifier.classify("what time is it").await.unwrap();

        assert!(token.granted_tools().values().all(|granted| !granted));
        assert!((token.confidence() - 0.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn empty_registry_yields_empty_token() {
        let classifier =
            EmbeddingClassifier::new(StaticEmbeddings::new(), Arc::new(ToolRegistry::new()));
        let token = classifier.classify("read url").await.unwrap();

        assert!(token.granted_tools().is_empty());
        assert!((token.confidence() - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn threshold_validation() {
        let classifier = EmbeddingClassifier::new(StaticEmbeddings::new(), registry());
        assert!(classifier.with_threshold(1.5).is_err());
    }

    #[test]
    fn cosine_similarity_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[0.0, 1.0])).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn enrichment_appends_parameter_names() {
        let catalog = registry().definitions();
        let enriched = enrich_description(&catalog[0]);
        assert!(enriched.contains("Parameters: input"));
    }
}
