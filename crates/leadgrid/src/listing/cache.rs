//! Short-lived cache for the prospect listing query.
//!
//! Sits alongside the job subsystem but is independent of it: the only
//! coupling is that a stop's delayed refresh signal (and any realtime
//! mutation signal) flushes it. The TTL is a freshness bound, not strict
//! consistency; writers in other sessions may be briefly invisible.

use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::listing::status::ProspectStatus;

/// Cache key: one entry per distinct listing query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListingKey {
    pub view: String,
    pub search_term: String,
    pub status_filter: Option<ProspectStatus>,
}

impl ListingKey {
    /// Builds a key with the search term trimmed and the status filter
    /// normalized through the alias table, so "qualified" and "interested"
    /// share an entry.
    pub fn new(view: &str, search_term: &str, status_filter: Option<&str>) -> Self {
        Self {
            view: view.to_string(),
            search_term: search_term.trim().to_string(),
            status_filter: status_filter.and_then(ProspectStatus::parse),
        }
    }
}

/// A realtime signal that the underlying rows changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationSignal {
    /// Change-feed or refresh signal from another channel.
    RowsChanged,
    /// Explicit user mutation (status, priority, assignment).
    UserEdit,
}

/// Time-boxed cache over listing query results.
pub struct ListingCache<V> {
    inner: Cache<ListingKey, Arc<V>>,
}

impl<V: Send + Sync + 'static> ListingCache<V> {
    /// Creates a cache with the default 10 second freshness bound.
    pub fn new() -> Self {
        Self::with_ttl(Duration::from_secs(10))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            inner: Cache::builder().time_to_live(ttl).max_capacity(64).build(),
        }
    }

    pub fn get(&self, key: &ListingKey) -> Option<Arc<V>> {
        self.inner.get(key)
    }

    pub fn insert(&self, key: ListingKey, value: V) {
        self.inner.insert(key, Arc::new(value));
    }

    /// Returns the cached page or computes and caches it.
    pub fn get_or_insert_with(&self, key: ListingKey, init: impl FnOnce() -> V) -> Arc<V> {
        self.inner.get_with(key, || Arc::new(init()))
    }

    /// Flushes every entry. Called on any mutation signal so a hit is never
    /// staler than the last known mutation.
    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }

    /// Records a mutation signal.
    pub fn note_mutation(&self, signal: MutationSignal) {
        log::debug!("Listing cache flushed ({:?})", signal);
        self.invalidate_all();
    }

    /// Spawns a task that flushes the cache on every received signal.
    pub fn spawn_invalidator(
        self: Arc<Self>,
        mut rx: broadcast::Receiver<MutationSignal>,
    ) -> JoinHandle<()> {
        let cache = self;
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(signal) => cache.note_mutation(signal),
                    Err(broadcast::error::RecvError::Lagged(_)) => {
                        // Missing a signal only means an extra flush is due.
                        cache.invalidate_all();
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

impl<V: Send + Sync + 'static> Default for ListingCache<V> {
    fn default() -> Self {
        Self::new()
    }
}
