// src/cache/mod.rs
//
// Content-addressed cache with LRU eviction (C8). Two sibling files per
// entry (`{hex}.{ext}` + `{hex}.meta`); best-effort writes; every read
// degrades to a miss rather than erroring, per SPEC_FULL.md §4.7.
//
// Grounded on `other_examples/.../tehtorq-looky__src-thumbnail.rs.rs`'s
// cache_dir/cache_key/cache_file_path/save_to_cache shape (sibling files,
// best-effort disk writes, hand-rolled hex); XDG resolution follows
// `other_examples/.../alexzah-roqtune__src-image_pipeline.rs.rs`'s use of a
// platform cache-dir convention, adapted here to the literal
// `XDG_CACHE_HOME`/`HOME` env-var resolution SPEC_FULL.md §6 names directly.

pub mod key;
pub mod meta;

use crate::error::OptimizerError;
use crate::format::ImageFormat;
use crate::metric::MetricKind;
use key::CacheKey;
use meta::CacheMetadata;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Eviction and `clear` are both bounded so a single call can never take
/// unbounded time regardless of how large the cache directory has grown.
const MAX_EVICTIONS_PER_CALL: usize = 1_000;
const MAX_CLEAR_ENTRIES: usize = 100_000;
const DEFAULT_MAX_SIZE_BYTES: u64 = 1_000_000_000;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub directory: PathBuf,
    pub max_size_bytes: u64,
    pub enabled: bool,
}

impl CacheConfig {
    pub fn with_defaults() -> Self {
        Self {
            directory: default_cache_dir(),
            max_size_bytes: DEFAULT_MAX_SIZE_BYTES,
            enabled: true,
        }
    }
}

/// Resolve the default cache directory: `$XDG_CACHE_HOME` if set and
/// non-empty, else `$HOME/.cache/pyjamaz`.
pub fn default_cache_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CACHE_HOME") {
        if !xdg.is_empty() {
            return PathBuf::from(xdg).join("pyjamaz");
        }
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".cache").join("pyjamaz")
}

#[derive(Debug, Clone)]
pub struct CachedResult {
    pub bytes: Vec<u8>,
    pub metadata: CacheMetadata,
}

pub struct Cache {
    config: CacheConfig,
}

impl Cache {
    /// Ensure the cache directory exists and return a handle. Directory
    /// creation failure is not fatal to the caller's job — it only disables
    /// caching for callers that check the result.
    pub fn init(config: CacheConfig) -> Result<Self, OptimizerError> {
        if config.enabled {
            fs::create_dir_all(&config.directory)
                .map_err(|e| OptimizerError::cache(format!("failed to create cache dir: {e}")))?;
        }
        Ok(Self { config })
    }

    /// Plain drop — no background flush thread, per SPEC_FULL.md §4.7.
    pub fn deinit(self) {}

    fn bytes_path(&self, key: &CacheKey, format: ImageFormat) -> PathBuf {
        self.config.directory.join(format!("{}.{}", key::hex_encode(key), format.extension()))
    }

    fn meta_path(&self, key: &CacheKey) -> PathBuf {
        self.config.directory.join(format!("{}.meta", key::hex_encode(key)))
    }

    pub fn get(&self, key: &CacheKey, format: ImageFormat) -> Option<CachedResult> {
        if !self.config.enabled {
            return None;
        }

        let bytes_path = self.bytes_path(key, format);
        let meta_path = self.meta_path(key);

        let bytes = match fs::read(&bytes_path) {
            Ok(b) => b,
            Err(e) => {
                tracing::debug!(key = %key::hex_encode(key), error = %e, "cache miss: bytes file unreadable");
                return None;
            }
        };
        let meta_raw = match fs::read_to_string(&meta_path) {
            Ok(m) => m,
            Err(e) => {
                tracing::debug!(key = %key::hex_encode(key), error = %e, "cache miss: metadata file unreadable");
                return None;
            }
        };
        let mut metadata = match CacheMetadata::parse(&meta_raw) {
            Some(m) => m,
            None => {
                tracing::debug!(key = %key::hex_encode(key), "cache miss: metadata malformed");
                return None;
            }
        };

        metadata.timestamp = now_unix();
        metadata.access_count = metadata.access_count.saturating_add(1);
        let _ = fs::write(&meta_path, metadata.serialize());

        Some(CachedResult { bytes, metadata })
    }

    pub fn put(&self, key: &CacheKey, format: ImageFormat, bytes: &[u8], mut metadata: CacheMetadata) {
        if !self.config.enabled {
            return;
        }

        if self.config.max_size_bytes > 0 {
            if let Ok(current) = self.current_size() {
                if current + bytes.len() as u64 > self.config.max_size_bytes {
                    self.evict(current + bytes.len() as u64);
                }
            }
        }

        metadata.timestamp = now_unix();
        let bytes_path = self.bytes_path(key, format);
        let meta_path = self.meta_path(key);

        if let Err(e) = fs::write(&bytes_path, bytes) {
            tracing::warn!(key = %key::hex_encode(key), error = %e, "cache write failed for bytes file");
            return;
        }
        if let Err(e) = fs::write(&meta_path, metadata.serialize()) {
            tracing::warn!(key = %key::hex_encode(key), error = %e, "cache write failed for metadata file");
        }
    }

    pub fn clear(&self) -> Result<(), OptimizerError> {
        let entries = fs::read_dir(&self.config.directory)
            .map_err(|e| OptimizerError::cache(format!("failed to read cache dir: {e}")))?;

        for entry in entries.take(MAX_CLEAR_ENTRIES).flatten() {
            let _ = fs::remove_file(entry.path());
        }
        Ok(())
    }

    fn current_size(&self) -> std::io::Result<u64> {
        let paths: Vec<PathBuf> = fs::read_dir(&self.config.directory)?
            .flatten()
            .map(|e| e.path())
            .filter(|p| is_bytes_file(p))
            .collect();

        // Bulk directory scans stat every entry independently, so fan the
        // metadata reads out across rayon's pool the same way the pack's own
        // thumbnail cache parallelizes batch directory work.
        use rayon::prelude::*;
        let total = paths.par_iter().filter_map(|p| fs::metadata(p).ok()).map(|m| m.len()).sum();
        Ok(total)
    }

    /// Delete the oldest bytes files (by mtime) and their metadata siblings
    /// until the cache would fit `incoming_total`, or the deletion cap is hit.
    fn evict(&self, incoming_total: u64) {
        let Ok(entries) = fs::read_dir(&self.config.directory) else {
            return;
        };

        use rayon::prelude::*;
        let paths: Vec<PathBuf> = entries.flatten().map(|e| e.path()).filter(|p| is_bytes_file(p)).collect();
        let mut files: Vec<(PathBuf, std::time::SystemTime, u64)> = paths
            .into_par_iter()
            .filter_map(|path| {
                let meta = fs::metadata(&path).ok()?;
                let mtime = meta.modified().ok()?;
                let size = meta.len();
                Some((path, mtime, size))
            })
            .collect();

        files.sort_by_key(|(_, mtime, _)| *mtime);

        let mut remaining = incoming_total;
        let mut deletions = 0;
        for (path, _, size) in files {
            if remaining <= self.config.max_size_bytes || deletions >= MAX_EVICTIONS_PER_CALL {
                break;
            }
            let _ = fs::remove_file(&path);
            if let Some(stem) = path.file_stem() {
                let meta_path = self.config.directory.join(format!("{}.meta", stem.to_string_lossy()));
                let _ = fs::remove_file(meta_path);
            }
            remaining = remaining.saturating_sub(size);
            deletions += 1;
        }
    }
}

fn is_bytes_file(path: &Path) -> bool {
    path.extension().map(|ext| ext != "meta").unwrap_or(false)
}

fn now_unix() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

/// Convenience wrapper combining key derivation with a `get`.
pub fn lookup(
    cache: &Cache,
    input_bytes: &[u8],
    max_bytes: Option<u64>,
    max_diff: Option<f64>,
    metric: MetricKind,
    format: ImageFormat,
) -> Option<CachedResult> {
    let k = key::compute_key(input_bytes, max_bytes, max_diff, metric, format);
    cache.get(&k, format)
}
