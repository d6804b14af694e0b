//! Filesystem helpers shared by the cache and temp tiers

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Writes `contents` to `path` by writing a sibling temp file and renaming it
/// over the destination, so readers see either the old file or the new one.
pub fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let tmp_path = staging_path(path);

    let result = (|| {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(contents)?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

/// Staging files start with a dot so directory scans for `*.cache` / `*.json` skip them
fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4().simple()))
}

/// Age of a file measured from its modification time
///
/// A modification time in the future counts as age zero.
pub fn file_age(path: &Path) -> std::io::Result<Duration> {
    let modified = fs::metadata(path)?.modified()?;
    Ok(SystemTime::now()
        .duration_since(modified)
        .unwrap_or(Duration::ZERO))
}

/// Lists regular files in `dir` whose extension matches `ext`
///
/// A missing directory yields an empty list.
pub fn files_with_extension(dir: &Path, ext: &str) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };

    entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path.extension().is_some_and(|e| e == ext)
                && !path
                    .file_name()
                    .is_some_and(|n| n.to_string_lossy().starts_with('.'))
        })
        .collect()
}

/// Total size in megabytes of the given files
pub fn total_size_mb(files: &[PathBuf]) -> f64 {
    let bytes: u64 = files
        .iter()
        .filter_map(|path| fs::metadata(path).ok())
        .map(|meta| meta.len())
        .sum();
    bytes as f64 / (1024.0 * 1024.0)
}

/// Moves a file's modification time into the past to simulate elapsed time
#[cfg(test)]
pub(crate) fn backdate(path: &Path, by: Duration) {
    let file = fs::File::options()
        .write(true)
        .open(path)
        .expect("Should open file to backdate");
    file.set_modified(SystemTime::now() - by)
        .expect("Should set modification time");
}
