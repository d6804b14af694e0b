//! Qdrant-backed semantic index
//!
//! Every public operation is best-effort: failures are logged and reported as
//! `false`, `None` or an empty result, never as an error, with the exception
//! of [`VectorDatabase::ensure_collection`] which runs once at startup.

use chrono::Utc;
use reqwest::{Client, Method, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use uuid::Uuid;

use super::embedding::EmbeddingClient;
use super::projection::text_for_embedding;
use super::types::{DocumentPayload, DocumentType, SearchHit, VectorDocument};
use super::VectorError;
use crate::config::VectorConfig;

/// Default number of search results
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

#[derive(Debug, Serialize)]
struct UpsertRequest<'a> {
    points: [&'a VectorDocument; 1],
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    vector: &'a [f32],
    limit: usize,
    with_payload: bool,
    with_vector: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    result: Vec<SearchHit>,
}

/// Client for a single Qdrant collection plus the embedder that feeds it
#[derive(Debug, Clone)]
pub struct VectorDatabase {
    client: Client,
    qdrant_url: String,
    collection_name: String,
    api_key: Option<String>,
    timeout: Duration,
    embedder: EmbeddingClient,
}

impl VectorDatabase {
    /// Create a new VectorDatabase from the vector settings
    pub fn new(config: &VectorConfig) -> Self {
        let client = Client::new();
        Self {
            embedder: EmbeddingClient::with_client(client.clone(), config),
            client,
            qdrant_url: config.qdrant_url.trim_end_matches('/').to_string(),
            collection_name: config.collection_name.clone(),
            api_key: config.qdrant_api_key.clone(),
            timeout: config.request_timeout(),
        }
    }

    /// Base URL of the Qdrant server
    pub fn url(&self) -> &str {
        &self.qdrant_url
    }

    /// Name of the collection documents are stored in
    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    fn collection_url(&self) -> String {
        format!("{}/collections/{}", self.qdrant_url, self.collection_name)
    }

    /// Builds a request carrying the per-call timeout and the API key, if any
    fn request(&self, method: Method, url: String) -> RequestBuilder {
        let builder = self.client.request(method, url).timeout(self.timeout);
        match &self.api_key {
            Some(key) => builder.header("api-key", key),
            None => builder,
        }
    }

    /// Sends a request and returns the JSON body of a successful response
    async fn send_json(&self, builder: RequestBuilder) -> Result<Value, VectorError> {
        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(VectorError::Status { status, body: text });
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    /// Single liveness probe against the Qdrant server
    pub async fn test_connection(&self) -> bool {
        let url = format!("{}/collections", self.qdrant_url);
        match self.send_json(self.request(Method::GET, url)).await {
            Ok(_) => {
                tracing::info!(url = %self.qdrant_url, "Qdrant connection successful");
                true
            }
            Err(e) => {
                tracing::warn!(url = %self.qdrant_url, error = %e, "Qdrant connection failed");
                false
            }
        }
    }

    /// Creates the collection with cosine distance if it doesn't exist
    ///
    /// When the collection already exists its vector size is compared with
    /// `vector_size` and a mismatch is reported as
    /// [`VectorError::DimensionMismatch`].
    pub async fn ensure_collection(&self, vector_size: usize) -> Result<(), VectorError> {
        let response = self
            .request(Method::GET, self.collection_url())
            .send()
            .await?;

        if response.status().is_success() {
            let info: Value = response.json().await?;
            return match info
                .pointer("/result/config/params/vectors/size")
                .and_then(Value::as_u64)
            {
                Some(actual) if actual as usize != vector_size => {
                    Err(VectorError::DimensionMismatch {
                        expected: vector_size,
                        actual: actual as usize,
                    })
                }
                Some(_) => {
                    tracing::info!(collection = %self.collection_name, "Collection already exists");
                    Ok(())
                }
                None => {
                    tracing::warn!(
                        collection = %self.collection_name,
                        "Collection exists but its vector size could not be read"
                    );
                    Ok(())
                }
            };
        }

        let body = json!({
            "vectors": {
                "size": vector_size,
                "distance": "Cosine"
            }
        });
        self.send_json(self.request(Method::PUT, self.collection_url()).json(&body))
            .await?;

        tracing::info!(collection = %self.collection_name, vector_size, "Created collection");
        Ok(())
    }

    /// Embeds `text` with the configured model
    pub async fn embed(&self, text: &str) -> Option<Vec<f32>> {
        self.embedder.embed(text).await
    }

    /// Indexes `content` for `ticker` as a new point
    ///
    /// # Arguments
    /// * `ticker` - Stock ticker symbol
    /// * `document_type` - Selects the text projection that gets embedded
    /// * `content` - Structured content, stored verbatim in the payload
    /// * `metadata` - Extra payload fields, e.g. `{"source": "finnhub"}`
    ///
    /// # Returns
    /// `true` if the point was upserted; `false` if embedding or the upsert failed
    pub async fn store(
        &self,
        ticker: &str,
        document_type: DocumentType,
        content: &Value,
        metadata: Option<Value>,
    ) -> bool {
        match self.try_store(ticker, document_type, content, metadata).await {
            Ok(id) => {
                tracing::info!(ticker, %document_type, %id, "Stored document in vector database");
                true
            }
            Err(e) => {
                tracing::warn!(ticker, %document_type, error = %e, "Failed to store document");
                false
            }
        }
    }

    async fn try_store(
        &self,
        ticker: &str,
        document_type: DocumentType,
        content: &Value,
        metadata: Option<Value>,
    ) -> Result<String, VectorError> {
        let text = text_for_embedding(content, document_type);
        let vector = self.embedder.try_embed(&text).await?;

        let document = VectorDocument {
            id: Uuid::new_v4().to_string(),
            vector,
            payload: DocumentPayload {
                ticker: ticker.to_string(),
                document_type,
                content: content.clone(),
                metadata: metadata.unwrap_or_else(|| json!({})),
                timestamp: Utc::now(),
                embedding_source_text: text,
            },
        };

        let url = format!("{}/points", self.collection_url());
        let body = UpsertRequest {
            points: [&document],
        };
        self.send_json(self.request(Method::PUT, url).json(&body))
            .await?;
        Ok(document.id)
    }

    /// Finds the documents most similar to `query`
    ///
    /// Optional `ticker` and `document_type` narrow the search to exact
    /// payload matches. Hits keep the service's ordering. Any failure yields
    /// an empty list.
    pub async fn search(
        &self,
        query: &str,
        ticker: Option<&str>,
        document_type: Option<DocumentType>,
        limit: usize,
    ) -> Vec<SearchHit> {
        match self.try_search(query, ticker, document_type, limit).await {
            Ok(hits) => {
                tracing::info!(count = hits.len(), "Found similar documents");
                hits
            }
            Err(e) => {
                tracing::warn!(error = %e, "Similarity search failed");
                Vec::new()
            }
        }
    }

    async fn try_search(
        &self,
        query: &str,
        ticker: Option<&str>,
        document_type: Option<DocumentType>,
        limit: usize,
    ) -> Result<Vec<SearchHit>, VectorError> {
        let vector = self.embedder.try_embed(query).await?;

        let body = SearchRequest {
            vector: &vector,
            limit,
            with_payload: true,
            with_vector: false,
            filter: match_filter(ticker, document_type),
        };

        let url = format!("{}/points/search", self.collection_url());
        let response = self.send_json(self.request(Method::POST, url).json(&body)).await?;
        let parsed: SearchResponse = serde_json::from_value(response)?;
        Ok(parsed.result)
    }

    /// Deletes every point for `ticker`, optionally only of `document_type`
    pub async fn delete(&self, ticker: &str, document_type: Option<DocumentType>) -> bool {
        let Some(filter) = match_filter(Some(ticker), document_type) else {
            return false;
        };
        let url = format!("{}/points/delete", self.collection_url());
        let body = json!({ "filter": filter });

        match self.send_json(self.request(Method::POST, url).json(&body)).await {
            Ok(_) => {
                tracing::info!(ticker, "Deleted documents");
                true
            }
            Err(e) => {
                tracing::warn!(ticker, error = %e, "Failed to delete documents");
                false
            }
        }
    }

    /// Fetches a single point by id
    pub async fn get_document(&self, id: &str) -> Option<Value> {
        let url = format!("{}/points/{}", self.collection_url(), id);
        match self.send_json(self.request(Method::GET, url)).await {
            Ok(mut body) => Some(body.get_mut("result").map(Value::take).unwrap_or(Value::Null)),
            Err(e) => {
                tracing::warn!(%id, error = %e, "Failed to retrieve document");
                None
            }
        }
    }

    /// Raw collection description as reported by Qdrant
    pub async fn collection_info(&self) -> Option<Value> {
        match self.send_json(self.request(Method::GET, self.collection_url())).await {
            Ok(info) => Some(info),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to get collection info");
                None
            }
        }
    }
}

/// `{"must": [...]}` equality filter, or `None` when there is nothing to match
fn match_filter(ticker: Option<&str>, document_type: Option<DocumentType>) -> Option<Value> {
    let mut must = Vec::new();
    if let Some(ticker) = ticker {
        must.push(json!({"key": "ticker", "match": {"value": ticker}}));
    }
    if let Some(document_type) = document_type {
        must.push(json!({"key": "document_type", "match": {"value": document_type.as_str()}}));
    }
    (!must.is_empty()).then(|| json!({ "must": must }))
}
