//! Statistics and cleanup summaries reported by the storage tiers

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// File count and on-disk size of one cache namespace or temp subdirectory
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TierStats {
    /// Number of entries
    pub count: usize,
    /// Total size in megabytes
    pub size_mb: f64,
}

/// Per-directory statistics keyed by namespace or subdirectory name
pub type TierStatsMap = BTreeMap<String, TierStats>;

/// Number of files removed by a cleanup pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupStats {
    pub cache_files_removed: usize,
    pub temp_files_removed: usize,
}

/// Whether the vector index is active, and where it points
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorDbStatus {
    /// `enabled` or `disabled`
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Aggregate statistics for a [`StorageManager`](crate::StorageManager)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageStats {
    pub cache: TierStatsMap,
    pub temp_storage: TierStatsMap,
    pub vector_storage_enabled: bool,
    pub vector_db: VectorDbStatus,
}
