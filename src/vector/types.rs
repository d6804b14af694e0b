//! Documents, payloads and search hits exchanged with the vector database

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Kind of document indexed in the vector database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    /// Market data for a ticker (price, volume, ratios)
    FinancialData,
    /// News and sentiment
    News,
    /// A generated investment report
    Report,
}

impl DocumentType {
    /// Name stored in the `document_type` payload field
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::FinancialData => "financial_data",
            DocumentType::News => "news",
            DocumentType::Report => "report",
        }
    }

    /// Parses a payload or command-line name
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "financial_data" => Some(DocumentType::FinancialData),
            "news" => Some(DocumentType::News),
            "report" => Some(DocumentType::Report),
            _ => None,
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload attached to every indexed point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentPayload {
    pub ticker: String,
    pub document_type: DocumentType,
    /// The original structured content
    pub content: Value,
    pub metadata: Value,
    pub timestamp: DateTime<Utc>,
    /// The text projection the vector was computed from
    pub embedding_source_text: String,
}

/// A point as sent to the vector database
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VectorDocument {
    /// Fresh UUID v4
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: DocumentPayload,
}

/// Point identifier; Qdrant accepts UUID strings and unsigned integers
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PointId {
    Uuid(String),
    Num(u64),
}

impl fmt::Display for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PointId::Uuid(id) => f.write_str(id),
            PointId::Num(id) => write!(f, "{}", id),
        }
    }
}

/// One similarity search result, in the order the service returned it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: PointId,
    pub score: f32,
    #[serde(default)]
    pub payload: Value,
}
