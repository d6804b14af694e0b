//! Command-line interface parsing for firs-storage
//!
//! This module handles parsing of CLI arguments using clap and turns them into
//! a validated [`StorageConfig`] plus a maintenance or lookup command.

use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;
use thiserror::Error;

use crate::cache::{Fingerprint, Namespace};
use crate::config::StorageConfig;
use crate::error::ConfigError;
use crate::vector::{DocumentType, DEFAULT_SEARCH_LIMIT};

/// Error types for CLI argument handling
#[derive(Debug, Error)]
pub enum CliError {
    /// The specified namespace is not recognized
    #[error("Invalid namespace: '{0}'. Valid namespaces: llm, api, reports")]
    InvalidNamespace(String),

    /// The specified document type is not recognized
    #[error("Invalid document type: '{0}'. Valid types: financial_data, news, report")]
    InvalidDocumentType(String),

    /// The resulting configuration is unusable
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// FIRS storage - inspect and maintain the cache, temp store and vector index
#[derive(Parser, Debug)]
#[command(name = "firs-storage")]
#[command(about = "Inspect and maintain FIRS multi-tier storage")]
#[command(version)]
pub struct Cli {
    /// JSON config file; either the bare storage settings or a document with a `storage` section
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Override the cache directory
    #[arg(long, global = true, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Override the temp storage directory
    #[arg(long, global = true, value_name = "DIR")]
    pub temp_dir: Option<PathBuf>,

    /// Override the default TTL in seconds
    #[arg(long, global = true, value_name = "SECONDS")]
    pub ttl: Option<u64>,

    /// Log filter, e.g. `debug` or `firs_storage=trace`; RUST_LOG is used when absent
    #[arg(long, global = true, value_name = "FILTER")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Show entry counts and sizes for every tier
    Stats,

    /// Remove expired cache entries and temp records
    Cleanup,

    /// Clear one cache namespace, or every cache entry and temp record
    Clear {
        /// Only clear this cache namespace (llm, api, reports)
        #[arg(long)]
        namespace: Option<String>,
    },

    /// Print a fresh cache entry
    ///
    /// Examples:
    ///   firs-storage get llm "Summarize AAPL"
    ///   firs-storage get reports '{"ticker": "AAPL"}'
    Get {
        /// Cache namespace (llm, api, reports)
        namespace: String,
        /// Prompt text, or a JSON object of parameters
        fingerprint: String,
    },

    /// Semantic search over indexed documents (enables vector storage)
    Search {
        /// Free-text query
        query: String,
        /// Only match documents for this ticker
        #[arg(long)]
        ticker: Option<String>,
        /// Only match this document type (financial_data, news, report)
        #[arg(long = "type", value_name = "TYPE")]
        document_type: Option<String>,
        /// Maximum number of results
        #[arg(long, default_value_t = DEFAULT_SEARCH_LIMIT)]
        limit: usize,
    },
}

/// Parses a namespace argument
///
/// # Returns
/// * `Ok(Namespace)` if the string names a namespace
/// * `Err(CliError::InvalidNamespace)` otherwise
pub fn parse_namespace_arg(s: &str) -> Result<Namespace, CliError> {
    Namespace::from_str(s).ok_or_else(|| CliError::InvalidNamespace(s.to_string()))
}

/// Parses a document type argument
pub fn parse_document_type_arg(s: &str) -> Result<DocumentType, CliError> {
    DocumentType::from_str(s).ok_or_else(|| CliError::InvalidDocumentType(s.to_string()))
}

/// Parses a fingerprint argument
///
/// JSON objects become structured fingerprints; anything else is taken as
/// literal text, so a prompt doesn't need quoting as a JSON string.
pub fn parse_fingerprint_arg(s: &str) -> Fingerprint {
    match serde_json::from_str::<Value>(s) {
        Ok(value @ Value::Object(_)) => Fingerprint::from_value(value),
        _ => Fingerprint::from(s),
    }
}

/// Builds the storage configuration from the config file and CLI overrides
///
/// # Returns
/// * `Ok(StorageConfig)` validated after overrides are applied
/// * `Err(CliError)` if the file can't be loaded or the result is invalid
pub fn resolve_config(cli: &Cli) -> Result<StorageConfig, CliError> {
    let mut config = match &cli.config {
        Some(path) => StorageConfig::from_file(path)?,
        None => StorageConfig::default(),
    };

    if let Some(dir) = &cli.cache_dir {
        config.cache_dir = dir.clone();
    }
    if let Some(dir) = &cli.temp_dir {
        config.temp_dir = dir.clone();
    }
    if let Some(ttl) = cli.ttl {
        config.default_ttl = ttl;
    }
    if matches!(cli.command, Command::Search { .. }) {
        config.enable_vector_storage = true;
    }

    config.validate()?;
    Ok(config)
}
