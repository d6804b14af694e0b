//! Storage manager
//!
//! Ties the three tiers together. Reads go cache, then temp, then the
//! caller's fetch or generate function; fresh results are written through to
//! both file tiers and, when enabled, indexed in the vector database. A failed
//! fetch falls back to the newest temp record even if it is stale.

use serde_json::{json, Map, Value};
use std::fmt;
use std::future::Future;

use crate::cache::{CacheManager, Fingerprint, Namespace};
use crate::config::StorageConfig;
use crate::error::{ConfigError, StorageError};
use crate::stats::{CleanupStats, StorageStats, VectorDbStatus};
use crate::temp::{TempLookup, TempStorage};
use crate::vector::{DocumentType, SearchHit, VectorDatabase, VectorError};

/// Metadata source recorded for sections split out of a report
const REPORT_SECTION_SOURCE: &str = "comprehensive_report";

/// Which read-through path a call is resolving
#[derive(Debug, Clone, Copy)]
enum Target<'a> {
    Api { api_name: &'a str },
    Report,
}

impl Target<'_> {
    fn namespace(&self) -> Namespace {
        match self {
            Target::Api { .. } => Namespace::Api,
            Target::Report => Namespace::Reports,
        }
    }

    fn fingerprint(&self, ticker: &str) -> Fingerprint {
        match self {
            Target::Api { api_name } => api_fingerprint(api_name, &ticker_params(ticker)),
            Target::Report => report_fingerprint(ticker),
        }
    }

    fn failure_message(&self) -> &'static str {
        match self {
            Target::Api { .. } => "Failed to fetch data",
            Target::Report => "Failed to generate report",
        }
    }
}

/// A resolved value and whether it came from the caller's function
struct Resolved {
    value: Value,
    fresh: bool,
}

/// Multi-tier storage with read-through fetching and graceful degradation
///
/// The vector tier is optional. It starts enabled only when the config asks
/// for it, and [`StorageManager::initialize`] turns it off for the rest of the
/// process if the database can't be reached. It is never turned back on.
#[derive(Debug)]
pub struct StorageManager {
    config: StorageConfig,
    cache: CacheManager,
    temp: TempStorage,
    vector_db: Option<VectorDatabase>,
}

impl StorageManager {
    /// Creates a manager and the directories of both file tiers
    ///
    /// # Errors
    /// Returns [`ConfigError`] for invalid settings or unusable directories.
    pub fn new(config: StorageConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let cache = CacheManager::from_config(&config)?;
        let temp = TempStorage::from_config(&config)?;
        let vector_db = config
            .enable_vector_storage
            .then(|| VectorDatabase::new(&config.vector));

        tracing::info!(
            vector_storage = vector_db.is_some(),
            "Storage manager created"
        );

        Ok(Self {
            config,
            cache,
            temp,
            vector_db,
        })
    }

    /// Probes the vector database and prepares its collection
    ///
    /// # Returns
    /// * `Ok(true)` - Initialization completed, with or without vector storage
    /// * `Ok(false)` - The collection could not be prepared; the failure is logged
    /// * `Err(ConfigError::DimensionMismatch)` - The existing collection has a
    ///   different vector size than configured
    pub async fn initialize(&mut self) -> Result<bool, ConfigError> {
        let Some(db) = &self.vector_db else {
            tracing::info!("Storage manager initialization complete (vector storage disabled)");
            return Ok(true);
        };

        if !db.test_connection().await {
            tracing::warn!("Vector database connection failed, disabling vector storage");
            self.vector_db = None;
            return Ok(true);
        }

        let dimension = self.config.vector.vector_dimension;
        match db.ensure_collection(dimension).await {
            Ok(()) => {
                tracing::info!("Storage manager initialization complete");
                Ok(true)
            }
            Err(VectorError::DimensionMismatch { expected, actual }) => {
                Err(ConfigError::DimensionMismatch {
                    collection: db.collection_name().to_string(),
                    expected,
                    actual,
                })
            }
            Err(e) => {
                tracing::error!(error = %e, "Storage manager initialization failed");
                Ok(false)
            }
        }
    }

    /// The configuration this manager was built from
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// The cache tier
    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    /// The temp tier
    pub fn temp(&self) -> &TempStorage {
        &self.temp
    }

    /// Whether fresh data is currently being indexed
    pub fn vector_storage_enabled(&self) -> bool {
        self.vector_db.is_some()
    }

    // Cache pass-throughs

    /// Returns a cached LLM response for `prompt`, if fresh
    pub fn get_cached_llm_response(&self, prompt: &str, ttl_secs: Option<u64>) -> Option<Value> {
        self.cache
            .get_response(Namespace::Llm, &Fingerprint::from(prompt), ttl_secs)
    }

    /// Caches an LLM response under `prompt`
    pub fn cache_llm_response(&self, prompt: &str, response: &Value) -> bool {
        self.cache
            .put(Namespace::Llm, &Fingerprint::from(prompt), response)
    }

    /// Returns a cached API response for `api_name` called with `params`, if fresh
    pub fn get_cached_api_response(
        &self,
        api_name: &str,
        params: &Map<String, Value>,
        ttl_secs: Option<u64>,
    ) -> Option<Value> {
        self.cache
            .get_response(Namespace::Api, &api_fingerprint(api_name, params), ttl_secs)
    }

    /// Caches an API response for `api_name` called with `params`
    pub fn cache_api_response(
        &self,
        api_name: &str,
        params: &Map<String, Value>,
        response: &Value,
    ) -> bool {
        self.cache
            .put(Namespace::Api, &api_fingerprint(api_name, params), response)
    }

    /// Returns the cached report for `ticker`, if fresh
    pub fn get_cached_report(&self, ticker: &str, ttl_secs: Option<u64>) -> Option<Value> {
        self.cache
            .get_response(Namespace::Reports, &report_fingerprint(ticker), ttl_secs)
    }

    /// Caches a report for `ticker`
    pub fn cache_report(&self, ticker: &str, report: &Value) -> bool {
        self.cache
            .put(Namespace::Reports, &report_fingerprint(ticker), report)
    }

    // Vector pass-throughs

    /// Indexes market data; `false` when vector storage is disabled or the write fails
    pub async fn store_financial_data(
        &self,
        ticker: &str,
        data: &Value,
        metadata: Option<Value>,
    ) -> bool {
        self.index(ticker, DocumentType::FinancialData, data, metadata)
            .await
    }

    /// Indexes news; `false` when vector storage is disabled or the write fails
    pub async fn store_news_data(&self, ticker: &str, news: &Value, metadata: Option<Value>) -> bool {
        self.index(ticker, DocumentType::News, news, metadata).await
    }

    /// Indexes a report; `false` when vector storage is disabled or the write fails
    pub async fn store_report_data(&self, ticker: &str, report: &Value) -> bool {
        self.index(ticker, DocumentType::Report, report, None).await
    }

    async fn index(
        &self,
        ticker: &str,
        document_type: DocumentType,
        content: &Value,
        metadata: Option<Value>,
    ) -> bool {
        match &self.vector_db {
            Some(db) => db.store(ticker, document_type, content, metadata).await,
            None => false,
        }
    }

    /// Semantic search across everything indexed
    ///
    /// Empty when vector storage is disabled or the search fails.
    pub async fn search(&self, query: &str, ticker: Option<&str>, limit: usize) -> Vec<SearchHit> {
        self.search_documents(query, ticker, None, limit).await
    }

    /// Semantic search narrowed by ticker and document type
    pub async fn search_documents(
        &self,
        query: &str,
        ticker: Option<&str>,
        document_type: Option<DocumentType>,
        limit: usize,
    ) -> Vec<SearchHit> {
        match &self.vector_db {
            Some(db) => db.search(query, ticker, document_type, limit).await,
            None => Vec::new(),
        }
    }

    // Read-through

    /// Returns data for `ticker` from `api_name`, fetching only when needed
    ///
    /// # Arguments
    /// * `ticker` - Stock ticker symbol
    /// * `api_name` - Source API, part of the cache and temp identity
    /// * `fetch_fn` - Called with the ticker on a miss
    /// * `force_refresh` - Skip fresh cache and temp hits
    /// * `ttl_secs` - TTL for reads and writes; the default TTL when `None`
    ///
    /// # Returns
    /// The cached, stored or fetched data. If the fetch fails, the newest temp
    /// record (even a stale one), else `{"error": ..., "ticker": ...}`.
    pub async fn get_or_fetch<F, Fut, E>(
        &self,
        ticker: &str,
        api_name: &str,
        fetch_fn: F,
        force_refresh: bool,
        ttl_secs: Option<u64>,
    ) -> Value
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<Value, E>>,
        E: fmt::Display,
    {
        let target = Target::Api { api_name };
        let resolved = self
            .resolve(target, ticker, fetch_fn, force_refresh, ttl_secs)
            .await;

        if resolved.fresh {
            self.store_financial_data(ticker, &resolved.value, Some(json!({"source": api_name})))
                .await;
        }
        resolved.value
    }

    /// Returns the report for `ticker`, generating it only when needed
    ///
    /// Same tiering as [`StorageManager::get_or_fetch`]. A freshly generated
    /// report is indexed whole, and its `financial_summary` and `web_data`
    /// sections are indexed separately when present.
    pub async fn get_or_generate<F, Fut, E>(
        &self,
        ticker: &str,
        generate_fn: F,
        force_refresh: bool,
        ttl_secs: Option<u64>,
    ) -> Value
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<Value, E>>,
        E: fmt::Display,
    {
        let resolved = self
            .resolve(Target::Report, ticker, generate_fn, force_refresh, ttl_secs)
            .await;

        if resolved.fresh && self.vector_db.is_some() {
            let report = &resolved.value;
            self.store_report_data(ticker, report).await;

            let section_metadata = || Some(json!({"source": REPORT_SECTION_SOURCE}));
            if let Some(financial) = report.get("financial_summary") {
                self.store_financial_data(ticker, financial, section_metadata())
                    .await;
            }
            if let Some(web) = report.get("web_data") {
                self.store_news_data(ticker, web, section_metadata()).await;
            }
        }
        resolved.value
    }

    async fn resolve<F, Fut, E>(
        &self,
        target: Target<'_>,
        ticker: &str,
        produce: F,
        force_refresh: bool,
        ttl_secs: Option<u64>,
    ) -> Resolved
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<Value, E>>,
        E: fmt::Display,
    {
        let namespace = target.namespace();
        let fingerprint = target.fingerprint(ticker);

        if !force_refresh {
            if let Some(value) = self.cache.get_response(namespace, &fingerprint, ttl_secs) {
                tracing::info!(ticker, %namespace, "Using cached data");
                return Resolved { value, fresh: false };
            }
        }

        let stored = self.latest_temp(target, ticker, ttl_secs);
        if !force_refresh {
            if let Some(lookup) = stored.as_ref().filter(|lookup| !lookup.is_expired) {
                tracing::info!(ticker, %namespace, "Using stored data, promoting to cache");
                self.write_cache(namespace, &fingerprint, &lookup.data, ttl_secs);
                return Resolved {
                    value: lookup.data.clone(),
                    fresh: false,
                };
            }
        }

        tracing::info!(ticker, %namespace, force_refresh, "Fetching fresh data");
        match produce(ticker.to_string()).await {
            Ok(value) => {
                self.write_cache(namespace, &fingerprint, &value, ttl_secs);
                if let Err(e) = self.write_temp(target, ticker, &value, ttl_secs) {
                    tracing::warn!(ticker, %namespace, error = %e, "Failed to store data in temp storage");
                }
                Resolved { value, fresh: true }
            }
            Err(e) => {
                tracing::error!(ticker, %namespace, error = %e, "Fetch failed");
                match stored {
                    Some(lookup) => {
                        tracing::warn!(
                            ticker,
                            %namespace,
                            stale = lookup.is_expired,
                            "Falling back to stored data"
                        );
                        Resolved {
                            value: lookup.data,
                            fresh: false,
                        }
                    }
                    None => Resolved {
                        value: json!({
                            "error": format!("{}: {}", target.failure_message(), e),
                            "ticker": ticker,
                        }),
                        fresh: false,
                    },
                }
            }
        }
    }

    fn latest_temp(
        &self,
        target: Target<'_>,
        ticker: &str,
        ttl_secs: Option<u64>,
    ) -> Option<TempLookup> {
        match target {
            Target::Api { api_name } => self.temp.latest_api_response(ticker, api_name, ttl_secs),
            Target::Report => self.temp.latest_report(ticker, ttl_secs),
        }
    }

    fn write_temp(
        &self,
        target: Target<'_>,
        ticker: &str,
        value: &Value,
        ttl_secs: Option<u64>,
    ) -> Result<(), StorageError> {
        match target {
            Target::Api { api_name } => {
                self.temp.put_api_response(ticker, api_name, value, ttl_secs)?;
            }
            Target::Report => {
                self.temp.put_report(ticker, value, ttl_secs)?;
            }
        }
        Ok(())
    }

    fn write_cache(
        &self,
        namespace: Namespace,
        fingerprint: &Fingerprint,
        value: &Value,
        ttl_secs: Option<u64>,
    ) -> bool {
        match ttl_secs {
            Some(ttl) => self.cache.put_with_ttl(namespace, fingerprint, value, ttl),
            None => self.cache.put(namespace, fingerprint, value),
        }
    }

    // Maintenance

    /// Sweeps expired entries from both file tiers
    pub fn cleanup_expired_data(&self) -> CleanupStats {
        let stats = CleanupStats {
            cache_files_removed: self.cache.sweep_expired(),
            temp_files_removed: self.temp.sweep_expired(),
        };
        tracing::info!(
            cache_files_removed = stats.cache_files_removed,
            temp_files_removed = stats.temp_files_removed,
            "Cleanup completed"
        );
        stats
    }

    /// Per-tier counts and sizes plus vector storage status
    pub fn get_storage_stats(&self) -> StorageStats {
        let vector_db = match &self.vector_db {
            Some(db) => VectorDbStatus {
                status: "enabled".to_string(),
                url: Some(db.url().to_string()),
            },
            None => VectorDbStatus {
                status: "disabled".to_string(),
                url: None,
            },
        };

        StorageStats {
            cache: self.cache.stats(),
            temp_storage: self.temp.stats(),
            vector_storage_enabled: self.vector_db.is_some(),
            vector_db,
        }
    }

    /// Empties the cache and the temp tier; the vector index is left as is
    pub fn clear_all_storage(&self) -> bool {
        let cache_cleared = self.cache.clear(None);
        let temp_cleared = self.temp.clear_all();

        if cache_cleared && temp_cleared {
            tracing::info!("All storage cleared");
            true
        } else {
            tracing::warn!(cache_cleared, temp_cleared, "Some storage clearing operations failed");
            false
        }
    }
}

fn ticker_params(ticker: &str) -> Map<String, Value> {
    let mut params = Map::new();
    params.insert("ticker".to_string(), Value::String(ticker.to_string()));
    params
}

fn api_fingerprint(api_name: &str, params: &Map<String, Value>) -> Fingerprint {
    let mut fields = Map::new();
    fields.insert("api".to_string(), Value::String(api_name.to_string()));
    fields.insert("params".to_string(), Value::Object(params.clone()));
    Fingerprint::Fields(fields)
}

fn report_fingerprint(ticker: &str) -> Fingerprint {
    Fingerprint::Fields(ticker_params(ticker))
}
