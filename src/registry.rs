//! Name -> Entry registry, with an unbounded and an LRU-bounded variant.

use std::sync::Arc;

use dashmap::DashMap;

use crate::entry::FileEntry;
use crate::error::Result;
use crate::state::StateId;

/// Name -> [`FileEntry`] registry.
///
/// *Created* on first successful create or by reload when an operation
/// references an on-disk file whose entry has not been instantiated yet.
/// *Mutated* only while the corresponding entry's own lock is held.
/// *Destroyed* on successful delete, or evicted by the LRU variant when
/// capacity is exceeded (map-only: the on-disk file and any open handles
/// persist). [`crate::store::Store`] holds one of these behind `Box<dyn
/// EntryMap>`, so the trait stays object-safe (no generic methods).
pub trait EntryMap: Send + Sync {
    /// Looks up `name`, touching recency for the LRU variant.
    fn get(&self, name: &str) -> Option<Arc<FileEntry>>;

    /// Inserts `entry` under `name`, replacing whatever was there.
    fn insert(&self, name: String, entry: Arc<FileEntry>);

    /// Returns the entry for `name` if present; otherwise runs `init`
    /// exactly once and inserts its result, sharing that single instance
    /// with every other caller racing on the same `name`.
    ///
    /// This is the only safe way to populate the map from a reload probe:
    /// two threads independently doing get-miss -> construct -> insert
    /// would each build their own `FileEntry` (with its own, distinct
    /// per-entry lock) for the same on-disk file, breaking the
    /// same-entry linearizability the per-entry lock exists to provide.
    /// `init` runs at most once and its failure inserts nothing.
    fn get_or_try_insert(
        &self,
        name: &str,
        init: &mut dyn FnMut() -> Result<Arc<FileEntry>>,
    ) -> Result<Arc<FileEntry>>;

    /// Removes `name` unconditionally (used after a successful delete).
    fn remove(&self, name: &str);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Unbounded map with a single coarse (sharded) structural lock; once an
/// entry is obtained, its own lock governs further synchronization.
#[derive(Default)]
pub struct UnboundedMap {
    inner: DashMap<String, Arc<FileEntry>>,
}

impl UnboundedMap {
    pub fn new() -> Self {
        Self { inner: DashMap::new() }
    }
}

impl EntryMap for UnboundedMap {
    fn get(&self, name: &str) -> Option<Arc<FileEntry>> {
        self.inner.get(name).map(|e| e.clone())
    }

    fn insert(&self, name: String, entry: Arc<FileEntry>) {
        self.inner.insert(name, entry);
    }

    fn get_or_try_insert(
        &self,
        name: &str,
        init: &mut dyn FnMut() -> Result<Arc<FileEntry>>,
    ) -> Result<Arc<FileEntry>> {
        if let Some(entry) = self.inner.get(name) {
            return Ok(entry.clone());
        }
        // `entry()` holds the shard's write lock for the whole match arm,
        // so only one racing caller ever observes `Vacant` and runs `init`.
        match self.inner.entry(name.to_owned()) {
            dashmap::mapref::entry::Entry::Occupied(slot) => Ok(slot.get().clone()),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                let entry = init()?;
                Ok(slot.insert(entry).clone())
            }
        }
    }

    fn remove(&self, name: &str) {
        self.inner.remove(name);
    }

    fn len(&self) -> usize {
        self.inner.len()
    }
}

/// Bounded-size map with recency ordering updated on every access
/// (including resolving lookups). When size exceeds capacity, the least
/// recently used entry is evicted from the map only: the on-disk file
/// persists and any outstanding handles remain valid.
pub struct LruMap {
    inner: moka::sync::Cache<String, Arc<FileEntry>>,
}

impl LruMap {
    /// `moka`'s default eviction policy (`tiny_lfu`) weighs recent access
    /// frequency, not pure recency; this variant promises strict
    /// least-recently-used eviction, so the policy is pinned explicitly.
    pub fn new(capacity: u64) -> Self {
        let inner = moka::sync::Cache::builder()
            .max_capacity(capacity)
            .eviction_policy(moka::policy::EvictionPolicy::lru())
            .build();
        Self { inner }
    }
}

impl EntryMap for LruMap {
    fn get(&self, name: &str) -> Option<Arc<FileEntry>> {
        self.inner.get(name)
    }

    fn insert(&self, name: String, entry: Arc<FileEntry>) {
        self.inner.insert(name, entry);
    }

    fn get_or_try_insert(
        &self,
        name: &str,
        init: &mut dyn FnMut() -> Result<Arc<FileEntry>>,
    ) -> Result<Arc<FileEntry>> {
        // `try_get_with` runs `init` at most once per key even under
        // concurrent misses, sharing the winner's result (or its error,
        // wrapped in `Arc`) with every other caller racing on `name`.
        self.inner
            .try_get_with(name.to_owned(), || init())
            .map_err(|arc_err| arc_err.duplicate())
    }

    fn remove(&self, name: &str) {
        self.inner.invalidate(name);
    }

    fn len(&self) -> usize {
        self.inner.run_pending_tasks();
        self.inner.entry_count() as usize
    }
}

/// Used internally by [`crate::store::Store`] to tell which [`StateId`]s a
/// reload probe found `name`'s main file under.
pub type ReloadHits = Vec<StateId>;
