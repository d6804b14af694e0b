//! FIRS storage core
//!
//! A disk TTL cache, a redundant timestamped temp store and an optional
//! semantic index, coordinated by [`StorageManager`] with read-through
//! fetching and fallback to stale data when upstream sources fail.

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
mod fsutil;
pub mod manager;
pub mod stats;
pub mod temp;
pub mod vector;

pub use cache::{CacheEntry, CacheManager, Fingerprint, Namespace};
pub use config::{StorageConfig, VectorConfig};
pub use error::{ConfigError, StorageError};
pub use manager::StorageManager;
pub use stats::{CleanupStats, StorageStats, TierStats};
pub use temp::{TempKind, TempLookup, TempStorage};
pub use vector::{DocumentType, EmbeddingClient, SearchHit, VectorDatabase, VectorError};
