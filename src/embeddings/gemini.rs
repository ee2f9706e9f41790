use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::EmbeddingBackend;
use crate::error::{ClaimgraphError, Result};
use crate::llm::gemini::model_path;

/// Request structure for the Gemini `embedContent` endpoint
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
    model: String,
    content: EmbedContent<'a>,
    output_dimensionality: usize,
}

#[derive(Serialize)]
struct EmbedContent<'a> {
    parts: Vec<EmbedPart<'a>>,
}

#[derive(Serialize)]
struct EmbedPart<'a> {
    text: &'a str,
}

/// Response structure from the `embedContent` endpoint
#[derive(Deserialize)]
struct EmbedContentResponse {
    embedding: EmbeddingValues,
}

#[derive(Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

/// Gemini embeddings client
///
/// Each call is an independent request; the client holds no per-call state,
/// so one instance is shared by every concurrent embedding task.
pub struct GeminiEmbeddingClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiEmbeddingClient {
    /// Create a new embeddings client
    ///
    /// # Arguments
    ///
    /// * `api_key` - Gemini API key
    /// * `base_url` - API root
    /// * `model` - Embedding model name (e.g., "embedding-001")
    /// * `timeout` - Per-request HTTP timeout
    pub fn new(api_key: String, base_url: String, model: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClaimgraphError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        })
    }
}

#[async_trait]
impl EmbeddingBackend for GeminiEmbeddingClient {
    async fn embed(&self, text: &str, dimensions: usize) -> Result<Vec<f32>> {
        let model = model_path(&self.model);
        let url = format!("{}/{}:embedContent", self.base_url, model);
        let request = EmbedContentRequest {
            model,
            content: EmbedContent {
                parts: vec![EmbedPart { text }],
            },
            output_dimensionality: dimensions,
        };

        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ClaimgraphError::Embedding(format!("Network error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(ClaimgraphError::Embedding(format!(
                "Gemini API error {}: {}",
                status, body
            )));
        }

        let result: EmbedContentResponse = response
            .json()
            .await
            .map_err(|e| ClaimgraphError::Embedding(format!("Failed to parse response: {}", e)))?;

        Ok(result.embedding.values)
    }
}
