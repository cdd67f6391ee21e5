//! Explicit dataset cache keyed by file path and modification time.

use crate::error::{ForecastError, Result};
use crate::ingest::{load_transactions, Transaction};
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

/// Hit and miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

struct Entry {
    modified: SystemTime,
    data: Arc<Vec<Transaction>>,
}

struct Inner {
    entries: LruCache<PathBuf, Entry>,
    stats: CacheStats,
}

/// Loaded transaction files, shared as `Arc`s.
///
/// A file is reloaded when its modification time differs from the cached
/// one. The least recently used file is evicted once `capacity` is reached.
pub struct DatasetCache {
    inner: Mutex<Inner>,
}

impl DatasetCache {
    pub fn new(capacity: usize) -> Result<Self> {
        let capacity = NonZeroUsize::new(capacity).ok_or_else(|| {
            ForecastError::InvalidOptions("cache capacity must be at least 1".into())
        })?;
        Ok(Self {
            inner: Mutex::new(Inner {
                entries: LruCache::new(capacity),
                stats: CacheStats::default(),
            }),
        })
    }

    /// Transactions in `path`, loading the file on a miss or after it changed.
    pub fn get_or_load(&self, path: impl AsRef<Path>) -> Result<Arc<Vec<Transaction>>> {
        let path = path.as_ref().to_path_buf();
        let modified = std::fs::metadata(&path)?.modified()?;

        {
            let mut inner = self.inner.lock();
            let cached = inner
                .entries
                .get(&path)
                .filter(|entry| entry.modified == modified)
                .map(|entry| Arc::clone(&entry.data));
            if let Some(data) = cached {
                inner.stats.hits += 1;
                return Ok(data);
            }
            inner.stats.misses += 1;
        }

        // Parse outside the lock so other files stay available meanwhile.
        let data = Arc::new(load_transactions(&path)?);
        self.inner.lock().entries.put(
            path,
            Entry {
                modified,
                data: Arc::clone(&data),
            },
        );
        Ok(data)
    }

    /// Drop a cached file.
    pub fn invalidate(&self, path: impl AsRef<Path>) {
        self.inner.lock().entries.pop(path.as_ref());
    }

    pub fn clear(&self) {
        self.inner.lock().entries.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;

    fn write_dataset(path: &Path, price: f64) {
        let json = format!(r#"[{{"deal_date":"2024-02-01","price":{price},"area":50.0}}]"#);
        fs::write(path, json).unwrap();
    }

    #[test]
    fn second_load_is_a_hit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sales.json");
        write_dataset(&path, 5_000_000.0);

        let cache = DatasetCache::new(2).unwrap();
        let first = cache.get_or_load(&path).unwrap();
        let second = cache.get_or_load(&path).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1 });
    }

    #[test]
    fn changed_file_is_reloaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sales.json");
        write_dataset(&path, 5_000_000.0);

        let cache = DatasetCache::new(2).unwrap();
        let before = cache.get_or_load(&path).unwrap();

        write_dataset(&path, 6_000_000.0);
        let file = fs::File::options().write(true).open(&path).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(60))
            .unwrap();

        let after = cache.get_or_load(&path).unwrap();
        assert_eq!(before[0].price, 5_000_000.0);
        assert_eq!(after[0].price, 6_000_000.0);
        assert_eq!(cache.stats().misses, 2);
    }

    #[test]
    fn least_recently_used_file_is_evicted() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<PathBuf> = (0..3)
            .map(|i| {
                let path = dir.path().join(format!("sales-{i}.json"));
                write_dataset(&path, 1_000_000.0 * (i + 1) as f64);
                path
            })
            .collect();

        let cache = DatasetCache::new(2).unwrap();
        for path in &paths {
            cache.get_or_load(path).unwrap();
        }
        assert_eq!(cache.len(), 2);

        cache.get_or_load(&paths[0]).unwrap();
        assert_eq!(cache.stats().misses, 4);

        cache.invalidate(&paths[0]);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        assert!(DatasetCache::new(0).is_err());
    }
}
