//! Process-wide parse cache.
//!
//! Parsed bodies are cached by the exact original frame bytes. Every hit
//! hands out an independent copy (plugins mutate freely) and bumps the
//! entry's refcount; a background reaper decrements all counts once per
//! epoch and evicts entries that reach zero. The cache is shared across
//! all sessions; the single-threaded cooperative scheduler keeps critical
//! sections short and never held across an await.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use bytes::Bytes;
use starbridge_proto::ValueMap;
use tokio::task::JoinHandle;

/// Refcounted parse results keyed by raw frame bytes. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct ParseCache {
    inner: Arc<Mutex<HashMap<Bytes, CacheEntry>>>,
}

#[derive(Debug)]
struct CacheEntry {
    refcount: u32,
    values: ValueMap,
}

impl ParseCache {
    /// New empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the cached parse for `key`, bumping its refcount.
    pub fn fetch(&self, key: &Bytes) -> Option<ValueMap> {
        let mut inner = self.lock();
        let entry = inner.get_mut(key)?;
        entry.refcount += 1;
        Some(entry.values.clone())
    }

    /// Insert a fresh parse with refcount 1.
    pub fn store(&self, key: Bytes, values: ValueMap) {
        self.lock().insert(key, CacheEntry { refcount: 1, values });
    }

    /// One reaper epoch: decrement every refcount, evict the zeroes.
    /// Returns how many entries were evicted.
    pub fn reap(&self) -> usize {
        let mut inner = self.lock();
        let before = inner.len();
        inner.retain(|_, entry| {
            entry.refcount = entry.refcount.saturating_sub(1);
            entry.refcount > 0
        });
        before - inner.len()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True when the cache holds nothing.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Start the process-wide reaper task. Keep the handle; dropping it
    /// stops the task.
    pub fn spawn_reaper(&self, period: Duration) -> ReaperHandle {
        let cache = self.clone();
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // the first tick completes immediately; skip it
            interval.tick().await;
            loop {
                interval.tick().await;
                let evicted = cache.reap();
                if evicted > 0 {
                    tracing::debug!(evicted, "parse cache reaped");
                }
            }
        });
        ReaperHandle { task }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Bytes, CacheEntry>> {
        // a poisoned lock only means another task died mid-insert; the
        // map itself is still usable
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Owner handle for the reaper task; aborts it on drop.
#[derive(Debug)]
pub struct ReaperHandle {
    task: JoinHandle<()>,
}

impl ReaperHandle {
    /// Stop the reaper.
    pub fn shutdown(self) {
        self.task.abort();
    }
}

impl Drop for ReaperHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use starbridge_proto::Value;

    use super::*;

    fn sample_values() -> ValueMap {
        let mut values = ValueMap::new();
        values.insert("n".to_owned(), Value::Int(1));
        values
    }

    #[test]
    fn fetch_returns_independent_copies() {
        let cache = ParseCache::new();
        let key = Bytes::from_static(b"frame");
        cache.store(key.clone(), sample_values());

        let mut first = cache.fetch(&key).unwrap();
        let second = cache.fetch(&key).unwrap();
        assert_eq!(first, second);

        first.insert("n".to_owned(), Value::Int(99));
        let third = cache.fetch(&key).unwrap();
        assert_eq!(third.get("n"), Some(&Value::Int(1)));
    }

    #[test]
    fn reap_evicts_after_refcount_drains() {
        let cache = ParseCache::new();
        let key = Bytes::from_static(b"frame");
        cache.store(key.clone(), sample_values());
        let _ = cache.fetch(&key); // refcount 2

        assert_eq!(cache.reap(), 0); // 2 -> 1
        assert_eq!(cache.reap(), 1); // 1 -> 0, evicted
        assert!(cache.is_empty());
        assert!(cache.fetch(&key).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn reaper_task_evicts_idle_entries() {
        let cache = ParseCache::new();
        cache.store(Bytes::from_static(b"frame"), sample_values());
        let reaper = cache.spawn_reaper(Duration::from_secs(60));

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(cache.is_empty());

        reaper.shutdown();
    }
}
