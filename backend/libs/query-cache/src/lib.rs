//! Tag-invalidated read cache
//!
//! A `QueryCache` stores JSON-serialized query results under a structured key.
//! Every entry carries a set of structured tags describing the data it embeds
//! (a post, an author profile, a viewer's feed, ...). Mutations invalidate by
//! tag, so only entries that actually contain the changed data are dropped.
//!
//! ```
//! use query_cache::QueryCache;
//! use std::time::Duration;
//!
//! #[derive(Debug, Clone, PartialEq, Eq, Hash)]
//! enum Key { Post(u32) }
//! #[derive(Debug, Clone, PartialEq, Eq, Hash)]
//! enum Tag { Post(u32) }
//!
//! let cache: QueryCache<Key, Tag> = QueryCache::new(Duration::from_secs(30));
//! cache.insert(Key::Post(1), [Tag::Post(1)], &"caption").unwrap();
//! assert_eq!(cache.get::<String>(&Key::Post(1)).unwrap().as_deref(), Some("caption"));
//!
//! cache.invalidate(&Tag::Post(1));
//! assert!(cache.get::<String>(&Key::Post(1)).unwrap().is_none());
//! ```

mod error;
mod stats;

pub use error::{CacheError, CacheResult};
pub use stats::CacheStats;

use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashSet;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

use stats::StatsCollector;

/// Inserts between two sweeps of expired entries
const SWEEP_INTERVAL: u64 = 128;

struct CacheEntry<T> {
    value: serde_json::Value,
    tags: HashSet<T>,
    stored_at: Instant,
    read_generation: u64,
}

/// Taken before reading the source of truth. A value read under a token is
/// only cached if none of its tags was invalidated after the token was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadToken {
    generation: u64,
    taken_at: Instant,
}

/// Read cache keyed by `K`, invalidated by tags of type `T`.
///
/// Safe to share between worker threads behind an `Arc`.
pub struct QueryCache<K, T> {
    entries: DashMap<K, CacheEntry<T>>,
    /// Generation and time of the last invalidation of each tag
    invalidated: DashMap<T, (u64, Instant)>,
    generation: AtomicU64,
    inserts: AtomicU64,
    ttl: Duration,
    stats: StatsCollector,
}

impl<K, T> QueryCache<K, T>
where
    K: Eq + Hash + Clone + Debug,
    T: Eq + Hash + Clone + Debug,
{
    /// A zero `ttl` turns every lookup into a miss.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            invalidated: DashMap::new(),
            generation: AtomicU64::new(0),
            inserts: AtomicU64::new(0),
            ttl,
            stats: StatsCollector::default(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fetch a live entry, deserializing it into `V`.
    pub fn get<V: DeserializeOwned>(&self, key: &K) -> CacheResult<Option<V>> {
        let expired = match self.entries.get(key) {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => {
                self.stats.record_hit();
                let value = serde_json::from_value(entry.value.clone())?;
                return Ok(Some(value));
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            let ttl = self.ttl;
            self.entries
                .remove_if(key, |_, entry| entry.stored_at.elapsed() >= ttl);
        }

        self.stats.record_miss();
        Ok(None)
    }

    pub fn read_token(&self) -> ReadToken {
        ReadToken {
            generation: self.generation.load(Ordering::SeqCst),
            taken_at: Instant::now(),
        }
    }

    /// Store `value` under `key`, replacing any previous entry and its tags.
    pub fn insert<V, I>(&self, key: K, tags: I, value: &V) -> CacheResult<()>
    where
        V: Serialize + ?Sized,
        I: IntoIterator<Item = T>,
    {
        self.insert_fresh(self.read_token(), key, tags, value)?;
        Ok(())
    }

    /// Store `value` read under `token`, unless one of `tags` was invalidated
    /// since. Returns whether the value was kept.
    pub fn insert_fresh<V, I>(
        &self,
        token: ReadToken,
        key: K,
        tags: I,
        value: &V,
    ) -> CacheResult<bool>
    where
        V: Serialize + ?Sized,
        I: IntoIterator<Item = T>,
    {
        if self.ttl.is_zero() {
            return Ok(false);
        }

        let tags: HashSet<T> = tags.into_iter().collect();
        if self.is_stale(&token, &tags) {
            debug!(?key, "dropping query result read before an invalidation");
            return Ok(false);
        }

        let entry = CacheEntry {
            value: serde_json::to_value(value)?,
            tags,
            stored_at: Instant::now(),
            read_generation: token.generation,
        };
        let recheck: Vec<T> = entry.tags.iter().cloned().collect();
        self.entries.insert(key.clone(), entry);

        // An invalidation may have run between the check and the insert
        if self.is_stale(&token, recheck.iter()) {
            self.entries
                .remove_if(&key, |_, entry| entry.read_generation == token.generation);
            return Ok(false);
        }

        if self.inserts.fetch_add(1, Ordering::Relaxed) % SWEEP_INTERVAL == SWEEP_INTERVAL - 1 {
            self.purge_expired();
        }
        Ok(true)
    }

    fn is_stale<'a, I>(&self, token: &ReadToken, tags: I) -> bool
    where
        I: IntoIterator<Item = &'a T>,
        T: 'a,
    {
        // Invalidation records are kept for one ttl only
        if token.taken_at.elapsed() >= self.ttl {
            return true;
        }
        tags.into_iter().any(|tag| {
            self.invalidated
                .get(tag)
                .map_or(false, |record| record.0 > token.generation)
        })
    }

    /// Drop every entry carrying `tag`. Returns the number of entries removed.
    pub fn invalidate(&self, tag: &T) -> usize {
        self.invalidate_all(std::iter::once(tag))
    }

    /// Drop every entry carrying any of `tags`.
    pub fn invalidate_all<'a, I>(&self, tags: I) -> usize
    where
        I: IntoIterator<Item = &'a T>,
        T: 'a,
    {
        let tags: Vec<&T> = tags.into_iter().collect();
        if tags.is_empty() {
            return 0;
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let now = Instant::now();
        for tag in &tags {
            self.invalidated.insert((*tag).clone(), (generation, now));
        }

        let before = self.entries.len();
        self.entries
            .retain(|_, entry| !tags.iter().any(|tag| entry.tags.contains(*tag)));
        let removed = before.saturating_sub(self.entries.len());

        if removed > 0 {
            debug!(?tags, removed, "query cache invalidated");
        }
        self.stats.record_invalidations(removed as u64);
        removed
    }

    /// Drop expired entries and invalidation records older than the ttl.
    /// Returns the number of entries removed.
    pub fn purge_expired(&self) -> usize {
        let ttl = self.ttl;
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.stored_at.elapsed() < ttl);
        self.invalidated.retain(|_, record| record.1.elapsed() < ttl);

        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(removed, "query cache swept expired entries");
        }
        removed
    }

    pub fn remove(&self, key: &K) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }
}
