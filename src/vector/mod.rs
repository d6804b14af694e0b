//! Semantic storage tier
//!
//! Documents are projected to text, embedded through an Ollama-compatible
//! service and indexed in a Qdrant collection over its REST API.

mod database;
mod embedding;
mod projection;
mod types;

pub use database::{VectorDatabase, DEFAULT_SEARCH_LIMIT};
pub use embedding::{prepare_text, EmbeddingClient, MAX_EMBEDDING_CHARS};
pub use projection::text_for_embedding;
pub use types::{DocumentPayload, DocumentType, PointId, SearchHit, VectorDocument};

use thiserror::Error;

/// Errors talking to the embedding service or the vector database
#[derive(Error, Debug)]
pub enum VectorError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Failed to parse response: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Service returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Embedding service returned an empty vector")]
    EmptyEmbedding,

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}
