//! Error types shared by the storage tiers
//!
//! Most storage operations are best-effort and never surface these errors to
//! callers of the manager; they exist so each tier can report *why* a write or
//! read failed before the failure is logged and downgraded to a miss.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while validating configuration or preparing storage directories
///
/// These are the only errors that are fatal: they are returned at startup and
/// there is no safe default to fall back to.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A TTL of zero would make every entry expire on write
    #[error("Invalid TTL: {0} seconds (must be greater than zero)")]
    InvalidTtl(u64),

    /// The vector collection cannot have zero dimensions
    #[error("Invalid vector dimension: {0}")]
    InvalidDimension(usize),

    /// A required setting was left empty
    #[error("Missing required setting: {0}")]
    MissingSetting(&'static str),

    /// A storage directory could not be created
    #[error("Storage directory {path} is not usable: {source}")]
    UnusableDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file could not be read
    #[error("Failed to read config file {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON for this crate
    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] serde_json::Error),

    /// An existing vector collection was created with a different size
    #[error("Vector collection '{collection}' has dimension {actual}, configured dimension is {expected}")]
    DimensionMismatch {
        collection: String,
        expected: usize,
        actual: usize,
    },
}

/// Errors that can occur while reading or writing the file-backed tiers
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem read/write failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Record could not be serialized or deserialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
