//! Read-through file cache keyed by file freshness metadata.
//!
//! A lookup stats the file and compares `(mtime, size)` with the stored
//! fingerprint. On a match the cached parse is returned without touching
//! the file contents. Anything else reads and parses the file again.
//!
//! Equal size within the same mtime granularity is indistinguishable from
//! "unchanged". That is accepted: this is a freshness heuristic, not a
//! content hash.
//!
//! The table of entries lives behind an [`ArcSwap`]. Readers load an
//! immutable snapshot without locking; a miss parses outside of any lock and
//! publishes a new table with `rcu`. Two racing misses may both parse, and
//! the last publish wins. Both parses come from the same file so either
//! result is acceptable, and no reader ever sees a partial entry.

use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use thiserror::Error;

use crate::observability::metrics;

/// Failures of the cache itself (parse failures belong to the caller).
#[derive(Debug, Error)]
pub enum CacheError {
    /// The file does not exist. Callers decide whether that is fatal.
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl CacheError {
    fn from_io(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            Self::NotFound(path.to_path_buf())
        } else {
            Self::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }
}

/// File identity used for freshness checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fingerprint {
    pub modified: SystemTime,
    pub len: u64,
}

impl Fingerprint {
    /// Stat `path`.
    pub fn of(path: &Path) -> Result<Self, CacheError> {
        let meta = fs::metadata(path).map_err(|e| CacheError::from_io(path, e))?;
        let modified = meta.modified().map_err(|e| CacheError::from_io(path, e))?;
        Ok(Self {
            modified,
            len: meta.len(),
        })
    }
}

struct CacheEntry<T> {
    fingerprint: Fingerprint,
    value: Arc<T>,
}

/// Hit/miss counters, mostly for tests and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    /// Every miss is one file read.
    pub misses: u64,
}

/// Generic read-through cache of parsed file contents.
pub struct FileCache<T> {
    entries: ArcSwap<HashMap<PathBuf, Arc<CacheEntry<T>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<T> FileCache<T> {
    pub fn new() -> Self {
        Self {
            entries: ArcSwap::from_pointee(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Return the parsed contents of `path`, parsing only when the file
    /// changed since the last successful parse.
    ///
    /// Parse failures are returned as-is and are not cached, so a broken
    /// file is retried on every call until it is fixed.
    pub fn get<E, F>(&self, path: &Path, parse: F) -> Result<Arc<T>, E>
    where
        F: FnOnce(&str) -> Result<T, E>,
        E: From<CacheError>,
    {
        let fingerprint = Fingerprint::of(path)?;

        if let Some(entry) = self.entries.load().get(path) {
            if entry.fingerprint == fingerprint {
                self.hits.fetch_add(1, Ordering::Relaxed);
                metrics::record_cache_lookup(true);
                return Ok(Arc::clone(&entry.value));
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        metrics::record_cache_lookup(false);

        let content = fs::read_to_string(path).map_err(|e| CacheError::from_io(path, e))?;
        let value = Arc::new(parse(&content)?);

        let entry = Arc::new(CacheEntry {
            fingerprint,
            value: Arc::clone(&value),
        });
        self.entries.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.insert(path.to_path_buf(), Arc::clone(&entry));
            next
        });

        tracing::debug!(path = %path.display(), len = fingerprint.len, "File cache refreshed");
        Ok(value)
    }

    /// Drop the entry for `path`, forcing a reparse on next access.
    pub fn invalidate(&self, path: &Path) {
        self.entries.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.remove(path);
            next
        });
    }

    pub fn clear(&self) {
        self.entries.store(Arc::new(HashMap::new()));
    }

    /// Number of cached files.
    pub fn len(&self) -> usize {
        self.entries.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl<T> Default for FileCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for FileCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileCache")
            .field("files", &self.len())
            .field("stats", &self.stats())
            .finish()
    }
}
