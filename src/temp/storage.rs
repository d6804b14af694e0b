//! Timestamped temporary storage for API responses, reports and embeddings
//!
//! Unlike the cache, every write here creates a new file, so several records
//! may exist for the same ticker. Reads always pick the newest one and judge
//! it against the TTL the record declared for itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::config::StorageConfig;
use crate::error::{ConfigError, StorageError};
use crate::fsutil;
use crate::stats::{TierStats, TierStatsMap};

/// File extension for temp records
const RECORD_EXTENSION: &str = "json";

/// Kind of data held by a temp record; each kind has its own subdirectory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TempKind {
    ApiResponse,
    Report,
    Embeddings,
}

impl TempKind {
    /// All kinds, in directory order
    pub const ALL: [TempKind; 3] = [TempKind::ApiResponse, TempKind::Report, TempKind::Embeddings];

    /// Subdirectory holding records of this kind
    pub fn dir_name(&self) -> &'static str {
        match self {
            TempKind::ApiResponse => "api_responses",
            TempKind::Report => "reports",
            TempKind::Embeddings => "embeddings",
        }
    }
}

/// A single record as stored on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TempRecord {
    pub ticker: String,
    pub kind: TempKind,
    /// Source API, only for [`TempKind::ApiResponse`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_name: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// Seconds this record considers itself fresh
    pub ttl: u64,
    pub data: Value,
}

/// Result of looking up the newest record, fresh or not
#[derive(Debug, Clone, PartialEq)]
pub struct TempLookup {
    /// The stored payload
    pub data: Value,
    /// When the record was written
    pub timestamp: DateTime<Utc>,
    /// Whether the record is older than its effective max age
    pub is_expired: bool,
    /// File the record was read from
    pub path: PathBuf,
}

/// Manages the redundant, timestamped temp tier
#[derive(Debug, Clone)]
pub struct TempStorage {
    temp_dir: PathBuf,
    default_ttl: Duration,
}

impl TempStorage {
    /// Creates temp storage rooted at `temp_dir`, creating its subdirectories
    pub fn new(temp_dir: impl Into<PathBuf>, default_ttl: Duration) -> Result<Self, ConfigError> {
        if default_ttl.is_zero() {
            return Err(ConfigError::InvalidTtl(0));
        }

        let storage = Self {
            temp_dir: temp_dir.into(),
            default_ttl,
        };
        storage.ensure_dirs()?;

        tracing::info!(dir = %storage.temp_dir.display(), "Temporary storage initialized");
        Ok(storage)
    }

    /// Creates temp storage from the storage configuration
    pub fn from_config(config: &StorageConfig) -> Result<Self, ConfigError> {
        Self::new(config.temp_dir.clone(), config.default_ttl())
    }

    /// Root directory of the temp tier
    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    fn ensure_dirs(&self) -> Result<(), ConfigError> {
        for kind in TempKind::ALL {
            let dir = self.kind_dir(kind);
            fs::create_dir_all(&dir)
                .map_err(|source| ConfigError::UnusableDirectory { path: dir, source })?;
        }
        Ok(())
    }

    fn kind_dir(&self, kind: TempKind) -> PathBuf {
        self.temp_dir.join(kind.dir_name())
    }

    /// Stores an API response
    ///
    /// # Arguments
    /// * `ticker` - Stock ticker symbol
    /// * `api_name` - Source API (e.g. "alpha_vantage", "finnhub")
    /// * `data` - Response payload
    /// * `ttl_secs` - TTL override; the default TTL when `None`
    ///
    /// # Returns
    /// * `Ok(PathBuf)` - Path of the new record
    /// * `Err(StorageError)` - If the record could not be written
    pub fn put_api_response(
        &self,
        ticker: &str,
        api_name: &str,
        data: &Value,
        ttl_secs: Option<u64>,
    ) -> Result<PathBuf, StorageError> {
        let path = self.write_record(TempKind::ApiResponse, ticker, Some(api_name), data, ttl_secs)?;
        tracing::info!(ticker, api_name, path = %path.display(), "Stored API response");
        Ok(path)
    }

    /// Returns the newest fresh API response for `ticker` from `api_name`
    ///
    /// When `max_age_secs` is `None` the record's own TTL decides freshness.
    pub fn get_api_response(
        &self,
        ticker: &str,
        api_name: &str,
        max_age_secs: Option<u64>,
    ) -> Option<Value> {
        self.latest_api_response(ticker, api_name, max_age_secs)
            .and_then(fresh_data)
    }

    /// Returns the newest API response regardless of age, flagged with `is_expired`
    pub fn latest_api_response(
        &self,
        ticker: &str,
        api_name: &str,
        max_age_secs: Option<u64>,
    ) -> Option<TempLookup> {
        self.latest(TempKind::ApiResponse, ticker, Some(api_name), max_age_secs)
    }

    /// Stores a generated report
    pub fn put_report(
        &self,
        ticker: &str,
        report: &Value,
        ttl_secs: Option<u64>,
    ) -> Result<PathBuf, StorageError> {
        let path = self.write_record(TempKind::Report, ticker, None, report, ttl_secs)?;
        tracing::info!(ticker, path = %path.display(), "Stored report");
        Ok(path)
    }

    /// Returns the newest fresh report for `ticker`
    pub fn get_report(&self, ticker: &str, max_age_secs: Option<u64>) -> Option<Value> {
        self.latest_report(ticker, max_age_secs).and_then(fresh_data)
    }

    /// Returns the newest report regardless of age, flagged with `is_expired`
    pub fn latest_report(&self, ticker: &str, max_age_secs: Option<u64>) -> Option<TempLookup> {
        self.latest(TempKind::Report, ticker, None, max_age_secs)
    }

    /// Stores embeddings for audit and debugging; there is no read path
    pub fn put_embeddings(
        &self,
        ticker: &str,
        embeddings: &Value,
        ttl_secs: Option<u64>,
    ) -> Result<PathBuf, StorageError> {
        let path = self.write_record(TempKind::Embeddings, ticker, None, embeddings, ttl_secs)?;
        tracing::info!(ticker, path = %path.display(), "Stored embeddings");
        Ok(path)
    }

    fn write_record(
        &self,
        kind: TempKind,
        ticker: &str,
        api_name: Option<&str>,
        data: &Value,
        ttl_secs: Option<u64>,
    ) -> Result<PathBuf, StorageError> {
        let now = Utc::now();
        let record = TempRecord {
            ticker: ticker.to_string(),
            kind,
            api_name: api_name.map(str::to_string),
            timestamp: now,
            ttl: non_zero(ttl_secs).unwrap_or(self.default_ttl.as_secs()),
            data: data.clone(),
        };

        let dir = self.kind_dir(kind);
        fs::create_dir_all(&dir)?;

        let prefix = file_prefix(kind, ticker, api_name);
        let stamp = now.format("%Y%m%d_%H%M%S_%9f");
        let mut path = dir.join(format!("{}{}.{}", prefix, stamp, RECORD_EXTENSION));
        let mut attempt = 1;
        while path.exists() {
            path = dir.join(format!("{}{}_{}.{}", prefix, stamp, attempt, RECORD_EXTENSION));
            attempt += 1;
        }

        let json = serde_json::to_vec_pretty(&record)?;
        fsutil::write_atomic(&path, &json)?;
        Ok(path)
    }

    /// Finds the newest record matching the identity and reports its freshness
    fn latest(
        &self,
        kind: TempKind,
        ticker: &str,
        api_name: Option<&str>,
        max_age_secs: Option<u64>,
    ) -> Option<TempLookup> {
        let prefix = file_prefix(kind, ticker, api_name);

        let mut candidates: Vec<(SystemTime, PathBuf)> =
            fsutil::files_with_extension(&self.kind_dir(kind), RECORD_EXTENSION)
                .into_iter()
                .filter(|path| {
                    path.file_name()
                        .is_some_and(|name| name.to_string_lossy().starts_with(&prefix))
                })
                .filter_map(|path| {
                    let modified = fs::metadata(&path).and_then(|m| m.modified()).ok()?;
                    Some((modified, path))
                })
                .collect();

        if candidates.is_empty() {
            tracing::debug!(ticker, kind = kind.dir_name(), "No stored record found");
            return None;
        }

        // Newest first; file names embed the write time, so they break mtime ties
        candidates.sort_by(|a, b| b.cmp(a));

        for (_, path) in candidates {
            let record = match read_record(&path) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable temp record");
                    continue;
                }
            };
            if record.ticker != ticker
                || record.kind != kind
                || record.api_name.as_deref() != api_name
            {
                continue;
            }

            let max_age = Duration::from_secs(non_zero(max_age_secs).unwrap_or(record.ttl));
            let is_expired = match fsutil::file_age(&path) {
                Ok(age) => age > max_age,
                Err(_) => true,
            };
            if is_expired {
                tracing::debug!(ticker, kind = kind.dir_name(), "Stored record is expired");
            }

            return Some(TempLookup {
                data: record.data,
                timestamp: record.timestamp,
                is_expired,
                path,
            });
        }

        None
    }

    /// Removes records whose own TTL has elapsed
    ///
    /// Records that can't be read are left alone. Returns the number of files
    /// removed.
    pub fn sweep_expired(&self) -> usize {
        let mut removed = 0;

        for kind in TempKind::ALL {
            for path in fsutil::files_with_extension(&self.kind_dir(kind), RECORD_EXTENSION) {
                let ttl = match read_record(&path) {
                    Ok(record) => Duration::from_secs(record.ttl),
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "Error checking temp file");
                        continue;
                    }
                };
                let Ok(age) = fsutil::file_age(&path) else {
                    continue;
                };
                if age <= ttl {
                    continue;
                }
                match fs::remove_file(&path) {
                    Ok(()) => {
                        removed += 1;
                        tracing::debug!(path = %path.display(), "Removed expired temp file");
                    }
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "Error removing temp file");
                    }
                }
            }
        }

        tracing::info!(removed, "Temp sweep complete");
        removed
    }

    /// Record count and size per subdirectory
    pub fn stats(&self) -> TierStatsMap {
        TempKind::ALL
            .iter()
            .map(|kind| {
                let files = fsutil::files_with_extension(&self.kind_dir(*kind), RECORD_EXTENSION);
                let stats = TierStats {
                    count: files.len(),
                    size_mb: fsutil::total_size_mb(&files),
                };
                (kind.dir_name().to_string(), stats)
            })
            .collect()
    }

    /// Deletes every record and recreates any missing subdirectory
    ///
    /// Only record files inside the kind subdirectories are removed; anything
    /// else under the temp root is left alone.
    pub fn clear_all(&self) -> bool {
        let mut ok = true;
        for kind in TempKind::ALL {
            for path in fsutil::files_with_extension(&self.kind_dir(kind), RECORD_EXTENSION) {
                if let Err(e) = fs::remove_file(&path) {
                    tracing::error!(path = %path.display(), error = %e, "Error clearing temp file");
                    ok = false;
                }
            }
        }
        if let Err(e) = self.ensure_dirs() {
            tracing::error!(error = %e, "Error recreating temporary storage");
            return false;
        }
        if !ok {
            return false;
        }

        tracing::info!("Cleared all temporary storage");
        true
    }
}

/// A zero TTL or max age means "not given"
fn non_zero(secs: Option<u64>) -> Option<u64> {
    secs.filter(|&secs| secs > 0)
}

fn fresh_data(lookup: TempLookup) -> Option<Value> {
    (!lookup.is_expired).then_some(lookup.data)
}

fn read_record(path: &Path) -> Result<TempRecord, StorageError> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// `<ticker>_<kind>_` with path-unsafe characters replaced
fn file_prefix(kind: TempKind, ticker: &str, api_name: Option<&str>) -> String {
    let label = match kind {
        TempKind::ApiResponse => api_name.unwrap_or("api"),
        TempKind::Report => "report",
        TempKind::Embeddings => "embeddings",
    };
    format!("{}_{}_", file_component(ticker), file_component(label))
}

fn file_component(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fsutil::backdate;
    use serde_json::json;
    use tempfile::TempDir;

    fn create_test_storage() -> (TempStorage, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let storage = TempStorage::new(temp_dir.path().join("temp"), Duration::from_secs(600))
            .expect("Temp storage should initialize");
        (storage, temp_dir)
    }

    #[test]
    fn test_new_creates_subdirectories() {
        let (storage, _temp_dir) = create_test_storage();
        for dir in ["api_responses", "reports", "embeddings"] {
            assert!(storage.temp_dir().join(dir).is_dir());
        }
    }

    #[test]
    fn test_put_api_response_writes_named_record() {
        let (storage, _temp_dir) = create_test_storage();

        let path = storage
            .put_api_response("AAPL", "finnhub", &json!({"price": 150.25}), Some(300))
            .expect("Write should succeed");

        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("AAPL_finnhub_"), "unexpected name {}", name);
        assert!(name.ends_with(".json"));

        let record: TempRecord =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).expect("Valid record");
        assert_eq!(record.ticker, "AAPL");
        assert_eq!(record.kind, TempKind::ApiResponse);
        assert_eq!(record.api_name.as_deref(), Some("finnhub"));
        assert_eq!(record.ttl, 300);
        assert_eq!(record.data, json!({"price": 150.25}));
    }

    #[test]
    fn test_get_api_response_missing() {
        let (storage, _temp_dir) = create_test_storage();
        assert!(storage.get_api_response("AAPL", "finnhub", None).is_none());
    }

    #[test]
    fn test_most_recent_wins() {
        let (storage, _temp_dir) = create_test_storage();

        storage.put_api_response("T", "x", &json!("A"), None).unwrap();
        storage.put_api_response("T", "x", &json!("B"), None).unwrap();

        assert_eq!(storage.get_api_response("T", "x", None), Some(json!("B")));
        assert_eq!(storage.stats()["api_responses"].count, 2, "History is retained");
    }

    #[test]
    fn test_api_name_isolation() {
        let (storage, _temp_dir) = create_test_storage();

        storage.put_api_response("AAPL", "finnhub", &json!(1), None).unwrap();
        storage.put_api_response("AAPL", "alpha_vantage", &json!(2), None).unwrap();

        assert_eq!(storage.get_api_response("AAPL", "finnhub", None), Some(json!(1)));
        assert_eq!(storage.get_api_response("AAPL", "alpha_vantage", None), Some(json!(2)));
        assert!(storage.get_api_response("MSFT", "finnhub", None).is_none());
    }

    #[test]
    fn test_prefix_collision_is_resolved_by_record_identity() {
        let (storage, _temp_dir) = create_test_storage();

        // "A" + "x_y" and "A_x" + "y" share the "A_x_y_" file prefix
        storage.put_api_response("A_x", "y", &json!("other"), None).unwrap();

        assert!(storage.get_api_response("A", "x_y", None).is_none());
        assert_eq!(storage.get_api_response("A_x", "y", None), Some(json!("other")));
    }

    #[test]
    fn test_record_ttl_decides_freshness() {
        let (storage, _temp_dir) = create_test_storage();
        let path = storage
            .put_api_response("AAPL", "finnhub", &json!(1), Some(60))
            .unwrap();
        backdate(&path, Duration::from_secs(120));

        assert!(storage.get_api_response("AAPL", "finnhub", None).is_none());
        // An explicit max age overrides the record's TTL
        assert_eq!(
            storage.get_api_response("AAPL", "finnhub", Some(3600)),
            Some(json!(1))
        );
    }

    #[test]
    fn test_latest_returns_expired_record_with_flag() {
        let (storage, _temp_dir) = create_test_storage();
        let path = storage
            .put_api_response("AAPL", "finnhub", &json!({"stale": true}), Some(60))
            .unwrap();
        backdate(&path, Duration::from_secs(120));

        let lookup = storage
            .latest_api_response("AAPL", "finnhub", None)
            .expect("Expired record is still returned");
        assert!(lookup.is_expired);
        assert_eq!(lookup.data, json!({"stale": true}));
        assert_eq!(lookup.path, path);
    }

    #[test]
    fn test_newest_record_is_judged_even_if_older_one_is_fresh() {
        let (storage, _temp_dir) = create_test_storage();
        let old = storage.put_api_response("T", "x", &json!("old"), Some(3600)).unwrap();
        let new = storage.put_api_response("T", "x", &json!("new"), Some(10)).unwrap();
        backdate(&old, Duration::from_secs(60));
        backdate(&new, Duration::from_secs(30));

        // Newest by mtime is "new", which has outlived its own 10 s TTL
        assert!(storage.get_api_response("T", "x", None).is_none());
    }

    #[test]
    fn test_unreadable_newest_record_is_skipped() {
        let (storage, _temp_dir) = create_test_storage();
        storage.put_api_response("T", "x", &json!("good"), None).unwrap();
        fs::write(
            storage
                .temp_dir()
                .join("api_responses")
                .join("T_x_99991231_235959_000000000.json"),
            b"{broken",
        )
        .unwrap();

        assert_eq!(storage.get_api_response("T", "x", None), Some(json!("good")));
    }

    #[test]
    fn test_reports_round_trip() {
        let (storage, _temp_dir) = create_test_storage();
        let path = storage
            .put_report("MSFT", &json!({"executive_summary": "Buy"}), None)
            .unwrap();

        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("MSFT_report_"));
        assert_eq!(
            storage.get_report("MSFT", None),
            Some(json!({"executive_summary": "Buy"}))
        );
        assert!(storage.get_report("AAPL", None).is_none());
    }

    #[test]
    fn test_put_embeddings_is_write_only() {
        let (storage, _temp_dir) = create_test_storage();
        let path = storage
            .put_embeddings("AAPL", &json!({"vector": [0.1, 0.2]}), None)
            .unwrap();

        assert!(path.starts_with(storage.temp_dir().join("embeddings")));
        assert_eq!(storage.stats()["embeddings"].count, 1);
    }

    #[test]
    fn test_tickers_with_path_characters_stay_in_directory() {
        let (storage, _temp_dir) = create_test_storage();
        let path = storage.put_report("../evil", &json!(1), None).unwrap();

        assert_eq!(path.parent().unwrap(), storage.temp_dir().join("reports"));
        assert_eq!(storage.get_report("../evil", None), Some(json!(1)));
    }

    #[test]
    fn test_sweep_removes_only_expired_records() {
        let (storage, _temp_dir) = create_test_storage();
        let expired = storage.put_api_response("AAPL", "finnhub", &json!(1), Some(60)).unwrap();
        let fresh = storage.put_report("AAPL", &json!(2), Some(86_400)).unwrap();
        backdate(&expired, Duration::from_secs(120));
        backdate(&fresh, Duration::from_secs(120));

        assert_eq!(storage.sweep_expired(), 1);
        assert!(!expired.exists());
        assert!(fresh.exists());
    }

    #[test]
    fn test_sweep_skips_unreadable_records() {
        let (storage, _temp_dir) = create_test_storage();
        let path = storage.temp_dir().join("reports").join("junk.json");
        fs::write(&path, b"junk").unwrap();
        backdate(&path, Duration::from_secs(100_000));

        assert_eq!(storage.sweep_expired(), 0);
        assert!(path.exists());
    }

    #[test]
    fn test_clear_all_recreates_layout() {
        let (storage, _temp_dir) = create_test_storage();
        storage.put_api_response("AAPL", "finnhub", &json!(1), None).unwrap();
        storage.put_report("AAPL", &json!(2), None).unwrap();

        assert!(storage.clear_all());

        assert!(storage.stats().values().all(|s| s.count == 0));
        assert!(storage.temp_dir().join("api_responses").is_dir());
    }

    #[test]
    fn test_clear_all_leaves_unrelated_files() {
        let (storage, _temp_dir) = create_test_storage();
        storage.put_report("AAPL", &json!(2), None).unwrap();
        let unrelated = storage.temp_dir().join("notes.txt");
        fs::write(&unrelated, b"keep me").unwrap();
        let nested = storage.temp_dir().join("reports").join("draft.txt");
        fs::write(&nested, b"keep me too").unwrap();

        assert!(storage.clear_all());

        assert!(unrelated.is_file());
        assert!(nested.is_file());
        assert_eq!(storage.stats()["reports"].count, 0);
    }

    #[test]
    fn test_clear_all_recreates_removed_subdirectory() {
        let (storage, _temp_dir) = create_test_storage();
        fs::remove_dir_all(storage.temp_dir().join("embeddings")).unwrap();

        assert!(storage.clear_all());
        assert!(storage.temp_dir().join("embeddings").is_dir());
    }

    #[test]
    fn test_zero_ttl_falls_back_to_default() {
        let (storage, _temp_dir) = create_test_storage();
        let path = storage
            .put_api_response("AAPL", "finnhub", &json!(1), Some(0))
            .unwrap();

        let record: TempRecord =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).expect("Valid record");
        assert_eq!(record.ttl, 600);
        assert_eq!(storage.get_api_response("AAPL", "finnhub", Some(0)), Some(json!(1)));
        assert_eq!(storage.sweep_expired(), 0);
    }
}
