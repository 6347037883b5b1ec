//! Embeddings client for OpenAI-compatible endpoints.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use hyper::body::to_bytes;
use hyper::header::{AUTHORIZATION, CONTENT_TYPE};
use hyper::{Body, Request, Uri};
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::debug;

use crate::http_client::{HyperClient, build_https_client};
use crate::openai::OpenAiConfig;
use crate::traits::{AdapterError, AdapterMetadata, AdapterResult, EmbeddingModel};

/// Embeddings client speaking the `v1/embeddings` wire shape.
///
/// Shares [`OpenAiConfig`] with the chat client; only the endpoint path and
/// the payload differ.
pub struct OpenAiEmbeddings {
    client: HyperClient,
    endpoint: Uri,
    metadata: AdapterMetadata,
    api_key: String,
    timeout: Duration,
}

impl fmt::Debug for OpenAiEmbeddings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiEmbeddings")
            .field("model", &self.metadata.model())
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl OpenAiEmbeddings {
    /// Constructs a new client with the provided configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Configuration`] if the API key is missing or
    /// the endpoint is invalid.
    pub fn new(config: OpenAiConfig) -> AdapterResult<Self> {
        let (api_key, endpoint, timeout, _, model) = config.into_parts("v1/embeddings")?;

        Ok(Self {
            client: build_https_client()?,
            endpoint,
            metadata: AdapterMetadata::new("openai", model),
            api_key,
            timeout,
        })
    }
}

#[async_trait]
impl EmbeddingModel for OpenAiEmbeddings {
    fn metadata(&self) -> &AdapterMetadata {
        &self.metadata
    }

    async fn embed(&self, inputs: &[String]) -> AdapterResult<Vec<Vec<f32>>> {
        if inputs.is_empty() {
            return Err(AdapterError::invalid_request(
                "embeddings request requires at least one input",
            ));
        }

        let payload = EmbeddingsPayload {
            model: self.metadata.model().to_owned(),
            input: inputs.to_vec(),
        };
        let body = serde_json::to_vec(&payload).map_err(|err| {
            AdapterError::invalid_request(format!("failed to encode embeddings request: {err}"))
        })?;

        let request = Request::post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .body(Body::from(body))
            .map_err(|err| {
                AdapterError::transport(format!("failed to build embeddings request: {err}"))
            })?;

        let response = timeout(self.timeout, self.client.request(request))
            .await
            .map_err(|_| AdapterError::transport("embeddings request timed out"))?
            .map_err(|err| AdapterError::transport(format!("embeddings request failed: {err}")))?;

        let status = response.status();
        let bytes = to_bytes(response.into_body()).await.map_err(|err| {
            AdapterError::transport(format!("failed to read embeddings response: {err}"))
        })?;

        if !status.is_success() {
            let reason = String::from_utf8_lossy(&bytes).to_string();
            return Err(AdapterError::response(format!(
                "endpoint returned {status}: {reason}"
            )));
        }

        let response: EmbeddingsResponse = serde_json::from_slice(&bytes).map_err(|err| {
            AdapterError::response(format!("failed to decode embeddings response: {err}"))
        })?;

        let mut data = response.data;
        if data.len() != inputs.len() {
            return Err(AdapterError::response(format!(
                "expected {} embeddings, received {}",
                inputs.len(),
                data.len()
            )));
        }

        // Providers may return rows out of order; the index field is
        // authoritative.
        data.sort_by_key(|row| row.index);
        debug!(model = %self.metadata.model(), vectors = data.len(), "embeddings received");
        Ok(data.into_iter().map(|row| row.embedding).collect())
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingsPayload {
    model: String,
    input: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    #[serde(default)]
    data: Vec<EmbeddingRow>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingRow {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}
