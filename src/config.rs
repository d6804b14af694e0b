//! Storage configuration
//!
//! Every component receives its settings explicitly through these structs;
//! nothing is read from process-wide state. Defaults mirror a local
//! development setup (Qdrant on 6333, Ollama on 11434).

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

/// Default time-to-live for cache and temp entries in seconds
pub const DEFAULT_TTL_SECS: u64 = 600;

/// Dimensionality of `nomic-embed-text` vectors
pub const DEFAULT_VECTOR_DIMENSION: usize = 768;

/// Top-level configuration for a [`StorageManager`](crate::StorageManager)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root of the namespaced TTL cache
    pub cache_dir: PathBuf,
    /// Root of the redundant timestamped temp store
    pub temp_dir: PathBuf,
    /// Default TTL in seconds for reads and writes that don't override it
    pub default_ttl: u64,
    /// Whether to index fresh data in the vector database
    pub enable_vector_storage: bool,
    /// Embedding and vector database settings
    pub vector: VectorConfig,
}

/// Settings for the embedding service and the vector database
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorConfig {
    /// Base URL of the Qdrant REST API
    pub qdrant_url: String,
    /// Optional API key sent as the `api-key` header
    pub qdrant_api_key: Option<String>,
    /// Collection holding all documents
    pub collection_name: String,
    /// Base URL of the Ollama-compatible embedding service
    pub embedding_url: String,
    /// Embedding model identifier
    pub embedding_model: String,
    /// Size of every embedding vector; must match the collection
    pub vector_dimension: usize,
    /// Timeout for vector database calls in seconds
    pub request_timeout_secs: u64,
    /// Timeout for embedding calls in seconds
    pub embedding_timeout_secs: u64,
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            qdrant_url: "http://localhost:6333".to_string(),
            qdrant_api_key: None,
            collection_name: "firs_financial_data".to_string(),
            embedding_url: "http://localhost:11434".to_string(),
            embedding_model: "nomic-embed-text:latest".to_string(),
            vector_dimension: DEFAULT_VECTOR_DIMENSION,
            request_timeout_secs: 30,
            embedding_timeout_secs: 60,
        }
    }
}

impl VectorConfig {
    /// Timeout applied to each vector database request
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Timeout applied to each embedding request
    pub fn embedding_timeout(&self) -> Duration {
        Duration::from_secs(self.embedding_timeout_secs)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let base = ProjectDirs::from("", "", "firs")
            .map(|dirs| dirs.cache_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        Self {
            cache_dir: base.join("cache"),
            temp_dir: base.join("temp"),
            default_ttl: DEFAULT_TTL_SECS,
            enable_vector_storage: false,
            vector: VectorConfig::default(),
        }
    }
}

/// A config document may hold the storage settings at the top level or
/// under a `storage` key alongside unrelated application settings.
#[derive(Deserialize)]
#[serde(untagged)]
enum ConfigDocument {
    Wrapped { storage: StorageConfig },
    Bare(StorageConfig),
}

impl StorageConfig {
    /// Creates a config rooted at a single directory, with `cache/` and `temp/` beneath it
    pub fn with_root(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            cache_dir: root.join("cache"),
            temp_dir: root.join("temp"),
            ..Self::default()
        }
    }

    /// Loads configuration from a JSON file
    ///
    /// Missing fields take their defaults. The result is validated before it
    /// is returned.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        let config = match serde_json::from_str::<ConfigDocument>(&content) {
            Ok(ConfigDocument::Wrapped { storage }) => storage,
            Ok(ConfigDocument::Bare(config)) => config,
            // Re-parse strictly so the error names the offending field
            Err(_) => serde_json::from_str::<StorageConfig>(&content)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Default TTL as a [`Duration`]
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl)
    }

    /// Checks the settings that have no safe fallback
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_ttl == 0 {
            return Err(ConfigError::InvalidTtl(self.default_ttl));
        }
        if self.cache_dir.as_os_str().is_empty() {
            return Err(ConfigError::MissingSetting("cache_dir"));
        }
        if self.temp_dir.as_os_str().is_empty() {
            return Err(ConfigError::MissingSetting("temp_dir"));
        }

        let vector = &self.vector;
        if vector.vector_dimension == 0 {
            return Err(ConfigError::InvalidDimension(vector.vector_dimension));
        }
        if vector.qdrant_url.trim().is_empty() {
            return Err(ConfigError::MissingSetting("qdrant_url"));
        }
        if vector.collection_name.trim().is_empty() {
            return Err(ConfigError::MissingSetting("collection_name"));
        }
        if vector.embedding_url.trim().is_empty() {
            return Err(ConfigError::MissingSetting("embedding_url"));
        }
        if vector.embedding_model.trim().is_empty() {
            return Err(ConfigError::MissingSetting("embedding_model"));
        }
        Ok(())
    }
}
