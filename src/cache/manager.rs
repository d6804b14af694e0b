//! Cache manager for persisting responses to disk
//!
//! Provides a `CacheManager` that stores opaque JSON responses in one file per
//! key, grouped by namespace, and gates reads on the file's age.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::key::{Fingerprint, Namespace};
use crate::config::StorageConfig;
use crate::error::{ConfigError, StorageError};
use crate::fsutil;
use crate::stats::{TierStats, TierStatsMap};

/// File extension for cache entries
const CACHE_EXTENSION: &str = "cache";

/// Wrapper struct for cached data stored on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The cached response
    pub response: Value,
    /// When the response was cached
    pub cached_at: DateTime<Utc>,
    /// Hex digest the entry is stored under
    pub cache_key: String,
    /// Namespace the entry belongs to
    pub cache_type: Namespace,
    /// TTL in seconds in effect when the entry was written; used by the sweep
    #[serde(default)]
    pub ttl: Option<u64>,
}

/// Manages reading and writing cached responses to disk
///
/// Each namespace is a subdirectory of the cache root holding
/// `<key>.cache` files. An entry is fresh while `now - mtime < ttl`; entries
/// are never modified in place, only replaced wholesale, and every
/// replacement is an atomic rename so readers never see a torn file.
#[derive(Debug, Clone)]
pub struct CacheManager {
    /// Directory where cache files are stored
    cache_dir: PathBuf,
    /// TTL applied when a read or write doesn't specify one
    default_ttl: Duration,
}

impl CacheManager {
    /// Creates a new CacheManager rooted at `cache_dir`
    ///
    /// Creates the namespace subdirectories. An unusable directory is a
    /// configuration error because there is no safe fallback location.
    pub fn new(cache_dir: impl Into<PathBuf>, default_ttl: Duration) -> Result<Self, ConfigError> {
        if default_ttl.is_zero() {
            return Err(ConfigError::InvalidTtl(0));
        }

        let manager = Self {
            cache_dir: cache_dir.into(),
            default_ttl,
        };
        manager.ensure_dirs()?;

        tracing::info!(dir = %manager.cache_dir.display(), "Cache manager initialized");
        Ok(manager)
    }

    /// Creates a CacheManager from the storage configuration
    pub fn from_config(config: &StorageConfig) -> Result<Self, ConfigError> {
        Self::new(config.cache_dir.clone(), config.default_ttl())
    }

    /// Root directory of the cache
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// TTL used when none is given
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Ensures the namespace directories exist
    fn ensure_dirs(&self) -> Result<(), ConfigError> {
        for namespace in Namespace::ALL {
            let dir = self.namespace_dir(namespace);
            fs::create_dir_all(&dir)
                .map_err(|source| ConfigError::UnusableDirectory { path: dir, source })?;
        }
        Ok(())
    }

    fn namespace_dir(&self, namespace: Namespace) -> PathBuf {
        self.cache_dir.join(namespace.as_str())
    }

    /// Returns the path to a cache file for the given key
    fn cache_path(&self, namespace: Namespace, key: &str) -> PathBuf {
        self.namespace_dir(namespace)
            .join(format!("{}.{}", key, CACHE_EXTENSION))
    }

    /// A missing or zero TTL means the default
    fn effective_ttl(&self, ttl_secs: Option<u64>) -> Duration {
        ttl_secs
            .filter(|&secs| secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(self.default_ttl)
    }

    /// Reads a fresh entry from the cache
    ///
    /// # Arguments
    /// * `namespace` - Namespace to look in
    /// * `fingerprint` - Key material the entry was written under
    /// * `ttl_secs` - Maximum age in seconds; the default TTL when `None` or zero
    ///
    /// # Returns
    /// * `Some(CacheEntry)` if the entry exists and is younger than the TTL
    /// * `None` if it is missing, expired, or cannot be read or parsed
    pub fn get(
        &self,
        namespace: Namespace,
        fingerprint: &Fingerprint,
        ttl_secs: Option<u64>,
    ) -> Option<CacheEntry> {
        let key = fingerprint.key(namespace);
        let path = self.cache_path(namespace, &key);
        let ttl = self.effective_ttl(ttl_secs);

        match self.read_fresh(&path, ttl) {
            Ok(Some(entry)) => {
                tracing::debug!(%namespace, %key, "Cache hit");
                Some(entry)
            }
            Ok(None) => {
                tracing::debug!(%namespace, %key, "Cache miss (expired or not found)");
                None
            }
            Err(e) => {
                tracing::warn!(%namespace, %key, error = %e, "Error reading cache entry");
                None
            }
        }
    }

    /// Reads only the cached response, see [`CacheManager::get`]
    pub fn get_response(
        &self,
        namespace: Namespace,
        fingerprint: &Fingerprint,
        ttl_secs: Option<u64>,
    ) -> Option<Value> {
        self.get(namespace, fingerprint, ttl_secs)
            .map(|entry| entry.response)
    }

    fn read_fresh(&self, path: &Path, ttl: Duration) -> Result<Option<CacheEntry>, StorageError> {
        if !path.exists() {
            return Ok(None);
        }
        if fsutil::file_age(path)? >= ttl {
            return Ok(None);
        }
        let content = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Writes a response to the cache under the default TTL
    ///
    /// Returns `true` on success. Failures are logged, never raised.
    pub fn put(&self, namespace: Namespace, fingerprint: &Fingerprint, response: &Value) -> bool {
        self.put_entry(namespace, fingerprint, response, None)
    }

    /// Writes a response to the cache, recording `ttl_secs` for the sweep
    pub fn put_with_ttl(
        &self,
        namespace: Namespace,
        fingerprint: &Fingerprint,
        response: &Value,
        ttl_secs: u64,
    ) -> bool {
        self.put_entry(namespace, fingerprint, response, Some(ttl_secs))
    }

    fn put_entry(
        &self,
        namespace: Namespace,
        fingerprint: &Fingerprint,
        response: &Value,
        ttl_secs: Option<u64>,
    ) -> bool {
        match self.write(namespace, fingerprint, response, ttl_secs) {
            Ok(key) => {
                tracing::debug!(%namespace, %key, "Cached response");
                true
            }
            Err(e) => {
                tracing::warn!(%namespace, error = %e, "Error caching response");
                false
            }
        }
    }

    fn write(
        &self,
        namespace: Namespace,
        fingerprint: &Fingerprint,
        response: &Value,
        ttl_secs: Option<u64>,
    ) -> Result<String, StorageError> {
        let key = fingerprint.key(namespace);
        let entry = CacheEntry {
            response: response.clone(),
            cached_at: Utc::now(),
            cache_key: key.clone(),
            cache_type: namespace,
            ttl: Some(self.effective_ttl(ttl_secs).as_secs()),
        };

        let json = serde_json::to_vec(&entry)?;
        fs::create_dir_all(self.namespace_dir(namespace))?;
        fsutil::write_atomic(&self.cache_path(namespace, &key), &json)?;
        Ok(key)
    }

    /// Removes a single entry
    ///
    /// Returns `true` only if an entry existed and was removed.
    pub fn invalidate(&self, namespace: Namespace, fingerprint: &Fingerprint) -> bool {
        let key = fingerprint.key(namespace);
        let path = self.cache_path(namespace, &key);
        if !path.exists() {
            return false;
        }
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!(%namespace, %key, "Invalidated cache entry");
                true
            }
            Err(e) => {
                tracing::warn!(%namespace, %key, error = %e, "Error invalidating cache entry");
                false
            }
        }
    }

    /// Clears one namespace, or all of them when `namespace` is `None`
    pub fn clear(&self, namespace: Option<Namespace>) -> bool {
        let namespaces: Vec<Namespace> = match namespace {
            Some(ns) => vec![ns],
            None => Namespace::ALL.to_vec(),
        };

        let mut ok = true;
        for ns in namespaces {
            for path in fsutil::files_with_extension(&self.namespace_dir(ns), CACHE_EXTENSION) {
                if let Err(e) = fs::remove_file(&path) {
                    tracing::warn!(path = %path.display(), error = %e, "Error clearing cache file");
                    ok = false;
                }
            }
        }

        match namespace {
            Some(ns) => tracing::info!(namespace = %ns, "Cleared cache namespace"),
            None => tracing::info!("Cleared all caches"),
        }
        ok
    }

    /// Entry count and size per namespace
    pub fn stats(&self) -> TierStatsMap {
        Namespace::ALL
            .iter()
            .map(|ns| {
                let files = fsutil::files_with_extension(&self.namespace_dir(*ns), CACHE_EXTENSION);
                let stats = TierStats {
                    count: files.len(),
                    size_mb: fsutil::total_size_mb(&files),
                };
                (ns.as_str().to_string(), stats)
            })
            .collect()
    }

    /// Removes entries older than the TTL they were written with
    ///
    /// Entries without a recorded TTL, or that can't be parsed, are judged
    /// against the default TTL. Returns the number of files removed.
    pub fn sweep_expired(&self) -> usize {
        let mut removed = 0;

        for ns in Namespace::ALL {
            for path in fsutil::files_with_extension(&self.namespace_dir(ns), CACHE_EXTENSION) {
                let Ok(age) = fsutil::file_age(&path) else {
                    continue;
                };
                let ttl = self.recorded_ttl(&path).unwrap_or(self.default_ttl);
                if age < ttl {
                    continue;
                }
                match fs::remove_file(&path) {
                    Ok(()) => {
                        removed += 1;
                        tracing::debug!(path = %path.display(), "Removed expired cache entry");
                    }
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "Error removing expired cache entry");
                    }
                }
            }
        }

        tracing::info!(removed, "Cache sweep complete");
        removed
    }

    fn recorded_ttl(&self, path: &Path) -> Option<Duration> {
        let content = fs::read_to_string(path).ok()?;
        let entry: CacheEntry = serde_json::from_str(&content).ok()?;
        entry.ttl.filter(|&secs| secs > 0).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fsutil::backdate;
    use serde_json::json;
    use tempfile::TempDir;

    fn create_test_cache() -> (CacheManager, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let cache = CacheManager::new(temp_dir.path().join("cache"), Duration::from_secs(600))
            .expect("Cache should initialize");
        (cache, temp_dir)
    }

    fn aapl() -> Fingerprint {
        Fingerprint::from(json!({"ticker": "AAPL"}))
    }

    #[test]
    fn test_new_creates_namespace_directories() {
        let (cache, _temp_dir) = create_test_cache();

        for ns in ["llm", "api", "reports"] {
            assert!(cache.cache_dir().join(ns).is_dir(), "{} dir should exist", ns);
        }
    }

    #[test]
    fn test_new_rejects_zero_ttl() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let result = CacheManager::new(temp_dir.path(), Duration::ZERO);
        assert!(matches!(result, Err(ConfigError::InvalidTtl(0))));
    }

    #[test]
    fn test_new_fails_for_unusable_directory() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let blocker = temp_dir.path().join("file");
        fs::write(&blocker, b"not a dir").unwrap();

        let result = CacheManager::new(&blocker, Duration::from_secs(600));
        assert!(matches!(result, Err(ConfigError::UnusableDirectory { .. })));
    }

    #[test]
    fn test_put_creates_file_in_namespace_directory() {
        let (cache, _temp_dir) = create_test_cache();
        let fp = aapl();

        assert!(cache.put(Namespace::Api, &fp, &json!({"price": 150.25})));

        let expected_path = cache
            .cache_dir()
            .join("api")
            .join(format!("{}.cache", fp.key(Namespace::Api)));
        assert!(expected_path.exists(), "Cache file should exist");

        let content = fs::read_to_string(&expected_path).expect("Should read file");
        assert!(content.contains("\"cache_type\":\"api\""));
        assert!(content.contains("150.25"));
    }

    #[test]
    fn test_get_returns_none_for_missing_key() {
        let (cache, _temp_dir) = create_test_cache();

        assert!(cache.get(Namespace::Llm, &Fingerprint::from("nope"), None).is_none());
    }

    #[test]
    fn test_put_then_get_returns_response() {
        let (cache, _temp_dir) = create_test_cache();
        let response = json!({"summary": "strong quarter", "scores": [1, 2, 3], "nested": {"ok": true}});

        cache.put(Namespace::Reports, &aapl(), &response);
        let entry = cache
            .get(Namespace::Reports, &aapl(), None)
            .expect("Should read fresh cache");

        assert_eq!(entry.response, response);
        assert_eq!(entry.cache_type, Namespace::Reports);
        assert_eq!(entry.cache_key, aapl().key(Namespace::Reports));
    }

    #[test]
    fn test_get_is_order_independent_for_mappings() {
        let (cache, _temp_dir) = create_test_cache();

        cache.put(Namespace::Api, &Fingerprint::from(json!({"a": 1, "b": 2})), &json!("v"));

        let hit = cache.get_response(Namespace::Api, &Fingerprint::from(json!({"b": 2, "a": 1})), None);
        assert_eq!(hit, Some(json!("v")));
    }

    #[test]
    fn test_aapl_price_scenario() {
        let (cache, _temp_dir) = create_test_cache();

        cache.put(Namespace::Api, &aapl(), &json!({"price": 150.25}));
        assert_eq!(
            cache.get_response(Namespace::Api, &aapl(), Some(600)),
            Some(json!({"price": 150.25}))
        );

        let path = cache
            .cache_dir()
            .join("api")
            .join(format!("{}.cache", aapl().key(Namespace::Api)));
        backdate(&path, Duration::from_secs(601));

        assert!(cache.get(Namespace::Api, &aapl(), Some(600)).is_none());
    }

    #[test]
    fn test_expired_entry_stays_expired_until_rewritten() {
        let (cache, _temp_dir) = create_test_cache();
        let fp = Fingerprint::from("prompt");
        cache.put(Namespace::Llm, &fp, &json!("first"));

        let path = cache
            .cache_dir()
            .join("llm")
            .join(format!("{}.cache", fp.key(Namespace::Llm)));
        backdate(&path, Duration::from_secs(30));

        assert!(cache.get(Namespace::Llm, &fp, Some(10)).is_none());
        assert!(cache.get(Namespace::Llm, &fp, Some(10)).is_none());

        cache.put(Namespace::Llm, &fp, &json!("second"));
        assert_eq!(cache.get_response(Namespace::Llm, &fp, Some(10)), Some(json!("second")));
    }

    #[test]
    fn test_zero_ttl_read_uses_default() {
        let (cache, _temp_dir) = create_test_cache();
        let fp = Fingerprint::from("p");
        cache.put(Namespace::Llm, &fp, &json!(1));

        assert_eq!(cache.get_response(Namespace::Llm, &fp, Some(0)), Some(json!(1)));

        let path = cache
            .cache_dir()
            .join("llm")
            .join(format!("{}.cache", fp.key(Namespace::Llm)));
        backdate(&path, Duration::from_secs(601));
        assert!(cache.get(Namespace::Llm, &fp, Some(0)).is_none());
    }

    #[test]
    fn test_zero_ttl_write_records_default_and_survives_sweep() {
        let (cache, _temp_dir) = create_test_cache();
        let fp = Fingerprint::from("p");
        assert!(cache.put_with_ttl(Namespace::Api, &fp, &json!(1), 0));

        let entry = cache.get(Namespace::Api, &fp, None).expect("Entry should be fresh");
        assert_eq!(entry.ttl, Some(600));
        assert_eq!(cache.sweep_expired(), 0);
        assert!(cache.get(Namespace::Api, &fp, None).is_some());
    }

    #[test]
    fn test_corrupt_entry_is_a_miss() {
        let (cache, _temp_dir) = create_test_cache();
        let fp = Fingerprint::from("corrupt");
        let path = cache
            .cache_dir()
            .join("llm")
            .join(format!("{}.cache", fp.key(Namespace::Llm)));
        fs::write(&path, b"not json at all").unwrap();

        assert!(cache.get(Namespace::Llm, &fp, None).is_none());
    }

    #[test]
    fn test_overwrite_existing_cache() {
        let (cache, _temp_dir) = create_test_cache();

        cache.put(Namespace::Api, &aapl(), &json!({"price": 1}));
        cache.put(Namespace::Api, &aapl(), &json!({"price": 2}));

        assert_eq!(
            cache.get_response(Namespace::Api, &aapl(), None),
            Some(json!({"price": 2}))
        );
        assert_eq!(cache.stats()["api"].count, 1);
    }

    #[test]
    fn test_invalidate_removes_entry() {
        let (cache, _temp_dir) = create_test_cache();
        cache.put(Namespace::Api, &aapl(), &json!(1));

        assert!(cache.invalidate(Namespace::Api, &aapl()));
        assert!(cache.get(Namespace::Api, &aapl(), None).is_none());
        assert!(!cache.invalidate(Namespace::Api, &aapl()), "Second invalidate finds nothing");
    }

    #[test]
    fn test_clear_single_namespace() {
        let (cache, _temp_dir) = create_test_cache();
        cache.put(Namespace::Api, &aapl(), &json!(1));
        cache.put(Namespace::Llm, &Fingerprint::from("p"), &json!(2));

        assert!(cache.clear(Some(Namespace::Api)));

        let stats = cache.stats();
        assert_eq!(stats["api"].count, 0);
        assert_eq!(stats["llm"].count, 1);
    }

    #[test]
    fn test_clear_all_namespaces() {
        let (cache, _temp_dir) = create_test_cache();
        cache.put(Namespace::Api, &aapl(), &json!(1));
        cache.put(Namespace::Llm, &Fingerprint::from("p"), &json!(2));
        cache.put(Namespace::Reports, &aapl(), &json!(3));

        assert!(cache.clear(None));

        assert!(cache.stats().values().all(|s| s.count == 0));
    }

    #[test]
    fn test_stats_counts_entries_and_size() {
        let (cache, _temp_dir) = create_test_cache();
        cache.put(Namespace::Llm, &Fingerprint::from("a"), &json!("x"));
        cache.put(Namespace::Llm, &Fingerprint::from("b"), &json!("y"));

        let stats = cache.stats();

        assert_eq!(stats.len(), 3);
        assert_eq!(stats["llm"].count, 2);
        assert!(stats["llm"].size_mb > 0.0);
        assert_eq!(stats["reports"], TierStats::default());
    }

    #[test]
    fn test_sweep_honors_per_entry_ttl() {
        let (cache, _temp_dir) = create_test_cache();
        let short = Fingerprint::from("short");
        let long = Fingerprint::from("long");
        cache.put_with_ttl(Namespace::Llm, &short, &json!(1), 60);
        cache.put_with_ttl(Namespace::Llm, &long, &json!(2), 7200);

        for fp in [&short, &long] {
            let path = cache
                .cache_dir()
                .join("llm")
                .join(format!("{}.cache", fp.key(Namespace::Llm)));
            backdate(&path, Duration::from_secs(900));
        }

        assert_eq!(cache.sweep_expired(), 1);
        assert_eq!(cache.stats()["llm"].count, 1);
    }

    #[test]
    fn test_sweep_keeps_fresh_entries() {
        let (cache, _temp_dir) = create_test_cache();
        cache.put_with_ttl(Namespace::Api, &aapl(), &json!(1), 86_400);

        assert_eq!(cache.sweep_expired(), 0);
        assert!(cache.get(Namespace::Api, &aapl(), None).is_some());
    }

    #[test]
    fn test_sweep_uses_default_ttl_for_unreadable_entries() {
        let (cache, _temp_dir) = create_test_cache();
        let path = cache.cache_dir().join("api").join("garbage.cache");
        fs::write(&path, b"garbage").unwrap();
        backdate(&path, Duration::from_secs(601));

        assert_eq!(cache.sweep_expired(), 1);
        assert!(!path.exists());
    }
}
