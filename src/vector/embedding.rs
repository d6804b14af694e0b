//! Embedding service client
//!
//! Talks to an Ollama-compatible `/api/embeddings` endpoint and enforces the
//! configured vector dimensionality on every response.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::VectorError;
use crate::config::VectorConfig;

/// Longest text, in characters, sent to the embedding model
pub const MAX_EMBEDDING_CHARS: usize = 8192;

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    embedding: Vec<f32>,
}

/// Client for turning text into fixed-length vectors
#[derive(Debug, Clone)]
pub struct EmbeddingClient {
    client: Client,
    base_url: String,
    model: String,
    dimension: usize,
    timeout: Duration,
}

impl EmbeddingClient {
    /// Create a new EmbeddingClient from the vector settings
    pub fn new(config: &VectorConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    /// Create a new EmbeddingClient with a custom HTTP client
    pub fn with_client(client: Client, config: &VectorConfig) -> Self {
        Self {
            client,
            base_url: config.embedding_url.trim_end_matches('/').to_string(),
            model: config.embedding_model.clone(),
            dimension: config.vector_dimension,
            timeout: config.embedding_timeout(),
        }
    }

    /// Size every returned vector must have
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Embeds `text`, returning `None` on any failure
    ///
    /// The text is trimmed and truncated to [`MAX_EMBEDDING_CHARS`] first.
    pub async fn embed(&self, text: &str) -> Option<Vec<f32>> {
        match self.try_embed(text).await {
            Ok(vector) => {
                tracing::debug!(dimension = vector.len(), "Generated embedding");
                Some(vector)
            }
            Err(e) => {
                tracing::warn!(error = %e, model = %self.model, "Embedding failed");
                None
            }
        }
    }

    /// Embeds `text`, reporting why it failed
    pub async fn try_embed(&self, text: &str) -> Result<Vec<f32>, VectorError> {
        let request = EmbeddingRequest {
            model: &self.model,
            prompt: prepare_text(text),
        };

        let response = self
            .client
            .post(format!("{}/api/embeddings", self.base_url))
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(VectorError::Status { status, body: text });
        }

        let parsed: EmbeddingResponse = serde_json::from_str(&text)?;
        if parsed.embedding.is_empty() {
            return Err(VectorError::EmptyEmbedding);
        }
        if parsed.embedding.len() != self.dimension {
            return Err(VectorError::DimensionMismatch {
                expected: self.dimension,
                actual: parsed.embedding.len(),
            });
        }
        Ok(parsed.embedding)
    }
}

/// Trims `text` and cuts it at [`MAX_EMBEDDING_CHARS`] on a char boundary
pub fn prepare_text(text: &str) -> &str {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(MAX_EMBEDDING_CHARS) {
        Some((byte_index, _)) => &trimmed[..byte_index],
        None => trimmed,
    }
}
