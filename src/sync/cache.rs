use crate::error::{RosterError, RosterResult};
use moka::future::Cache;
use std::{
    fmt,
    hash::Hash,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

#[derive(Clone)]
struct Entry<V> {
    value: V,
    fetched_at: Instant,
}

/// Results of API reads, keyed by whatever identifies the read.
///
/// Entries are only served while they are younger than the caller's freshness window.
/// Every entry and every pending load lives under the generation it started in, and
/// [`QueryCache::invalidate_all`] moves to a new generation. A read issued after an
/// invalidation therefore never joins a load that began before it.
#[derive(Clone)]
pub struct QueryCache<K, V> {
    name: &'static str,
    entries: Cache<(u64, K), Entry<V>>,
    generation: Arc<AtomicU64>,
}

impl<K, V> QueryCache<K, V>
where
    K: Hash + Eq + Clone + fmt::Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(name: &'static str, capacity: u64) -> Self {
        Self {
            name,
            entries: Cache::builder().max_capacity(capacity).build(),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    fn current(&self, key: K) -> (u64, K) {
        (self.generation.load(Ordering::Acquire), key)
    }

    pub async fn get_fresh(&self, key: &K, window: Duration) -> Option<V> {
        let entry = self.entries.get(&self.current(key.clone())).await?;
        (entry.fetched_at.elapsed() < window).then_some(entry.value)
    }

    /// Serves a fresh entry, or runs `fetch`. Concurrent callers for the same key within one
    /// generation share one `fetch`.
    pub async fn get_or_fetch<F>(&self, key: K, window: Duration, fetch: F) -> RosterResult<V>
    where
        F: Future<Output = RosterResult<V>>,
    {
        let key = self.current(key);
        let cached = self.entries.get(&key).await;
        if let Some(entry) = cached.filter(|entry| entry.fetched_at.elapsed() < window) {
            debug!(cache = self.name, ?key, "cache hit");
            return Ok(entry.value);
        }

        debug!(cache = self.name, ?key, "cache miss");
        // stale entries would otherwise be handed straight back by the loader
        self.entries.invalidate(&key).await;

        let entry = self
            .entries
            .try_get_with(key, async move {
                let value = fetch.await?;
                Ok::<_, RosterError>(Entry {
                    value,
                    fetched_at: Instant::now(),
                })
            })
            .await
            .map_err(RosterError::from_shared)?;

        Ok(entry.value)
    }

    pub async fn insert(&self, key: K, value: V) {
        let entry = Entry {
            value,
            fetched_at: Instant::now(),
        };
        self.entries.insert(self.current(key), entry).await;
    }

    pub async fn invalidate(&self, key: &K) {
        debug!(cache = self.name, ?key, "invalidating");
        self.entries.invalidate(&self.current(key.clone())).await;
    }

    pub fn invalidate_all(&self) {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(cache = self.name, generation, "invalidating everything");
        self.entries.invalidate_all();
    }
}

impl<K, V> fmt::Debug for QueryCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCache")
            .field("name", &self.name)
            .field("generation", &self.generation.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
