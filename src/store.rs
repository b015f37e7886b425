//! Top-level store: wires states, an entry factory, and an entry map
//! together, and is the entry point for [`crate::operation::FileOperation`].

use std::sync::Arc;

use crate::allocator::BufferPool;
use crate::config::StoreConfig;
use crate::entry::FileEntry;
use crate::error::{Error, Result};
use crate::factory::EntryFactory;
use crate::operation::FileOperation;
use crate::registry::{EntryMap, LruMap, ReloadHits, UnboundedMap};
use crate::state::{StateId, States};

/// Constructs a [`Store`] programmatically. The `Store::from_config` path
/// is what an embedding daemon's config loader would use instead.
pub struct Builder {
    states: Vec<crate::state::State>,
    factory: Arc<dyn EntryFactory>,
    lru_capacity: Option<u64>,
    chunk_size: usize,
    chunk_count: usize,
}

impl Builder {
    pub fn new(factory: impl EntryFactory + 'static) -> Self {
        Self { states: Vec::new(), factory: Arc::new(factory), lru_capacity: None, chunk_size: 0, chunk_count: 0 }
    }

    /// Same as [`Builder::new`] but for a factory already boxed by a
    /// dynamic construction path (e.g. [`StoreConfig`](crate::config::StoreConfig)).
    pub(crate) fn new_boxed(factory: Box<dyn EntryFactory>) -> Self {
        Self { states: Vec::new(), factory: Arc::from(factory), lru_capacity: None, chunk_size: 0, chunk_count: 0 }
    }

    pub fn with_state(mut self, name: impl Into<String>, directory: impl Into<std::path::PathBuf>) -> Self {
        self.states.push(crate::state::State::new(name, directory));
        self
    }

    /// Bounds the entry map to `capacity` entries, enabling the LRU variant.
    pub fn with_lru_capacity(mut self, capacity: u64) -> Self {
        self.lru_capacity = Some(capacity);
        self
    }

    /// Enables pooled chunked I/O for readers/writers opened with a
    /// non-zero part size.
    pub fn with_buffer_pool(mut self, chunk_size: usize, chunk_count: usize) -> Self {
        self.chunk_size = chunk_size;
        self.chunk_count = chunk_count;
        self
    }

    pub fn build(self) -> Store {
        let map: Box<dyn EntryMap> = match self.lru_capacity {
            Some(capacity) => Box::new(LruMap::new(capacity)),
            None => Box::new(UnboundedMap::new()),
        };
        let pool = if self.chunk_size > 0 && self.chunk_count > 0 {
            Some(BufferPool::new(self.chunk_size, self.chunk_count))
        } else {
            None
        };
        Store { states: States::new(self.states), factory: self.factory, map, pool }
    }
}

/// The stateful local file store.
///
/// Owns the fixed [`States`] list, the [`EntryFactory`], and the
/// [`EntryMap`] registry (cache of on-disk truth). All public verbs are
/// reached through [`Store::new_file_op`].
pub struct Store {
    states: States,
    factory: Arc<dyn EntryFactory>,
    map: Box<dyn EntryMap>,
    pool: Option<BufferPool>,
}

impl Store {
    pub fn builder(factory: impl EntryFactory + 'static) -> Builder {
        Builder::new(factory)
    }

    /// Builds a [`Store`] from a deserialized [`StoreConfig`] — the
    /// construction path an embedding daemon's config loader would use.
    pub fn from_config(config: &StoreConfig) -> Result<Store> {
        config.build()
    }

    /// Starts a new [`FileOperation`] against this store.
    pub fn new_file_op(&self) -> FileOperation<'_> {
        FileOperation::new(self)
    }

    pub fn state_id(&self, name: &str) -> Option<StateId> {
        self.states.find(name)
    }

    pub(crate) fn states(&self) -> &States {
        &self.states
    }

    pub(crate) fn factory(&self) -> &dyn EntryFactory {
        self.factory.as_ref()
    }

    pub(crate) fn pool_for(&self, part_size: usize) -> Option<BufferPool> {
        if part_size == 0 {
            None
        } else {
            self.pool.clone()
        }
    }

    pub(crate) fn remove_entry(&self, name: &str) {
        self.map.remove(name);
    }

    /// Probes every known state's on-disk path for `name`, returning the
    /// state ids at which a file is currently present. Pure read of disk,
    /// no map interaction.
    fn probe_hits(&self, name: &str) -> Result<Vec<StateId>> {
        let rel = self.factory.relative_path(name)?;
        let mut hits = Vec::new();
        for (id, state) in self.states.iter() {
            let path = state.directory().join(&rel);
            if path.symlink_metadata().is_ok() {
                hits.push(id);
            }
        }
        Ok(hits)
    }

    /// Looks `name` up in the map; on miss, probes every known state's
    /// on-disk path. Zero hits is `NotFound`, exactly one hit instantiates
    /// and caches an `Entry`, more than one is `Corrupt`.
    ///
    /// The probe-and-insert runs through `EntryMap::get_or_try_insert` so
    /// that two threads racing a reload of the same not-yet-cached `name`
    /// share one constructed `FileEntry` (and its one per-entry lock)
    /// instead of each building and registering their own.
    pub(crate) fn lookup_or_reload(&self, name: &str) -> Result<Arc<FileEntry>> {
        let mut probe = || -> Result<Arc<FileEntry>> {
            match self.probe_hits(name)?.as_slice() {
                [] => Err(Error::NotFound(name.to_owned())),
                [only] => {
                    tracing::warn!(name, state = %only, "reloading entry not present in registry");
                    Ok(Arc::new(FileEntry::new(name.to_owned(), *only)))
                }
                many => Err(Error::Corrupt { name: name.to_owned(), states: many.to_vec() }),
            }
        };
        self.map.get_or_try_insert(name, &mut probe)
    }

    /// Same lookup-or-reload as above, but used by `create_file`: a clean
    /// miss (no hits on disk) constructs a fresh entry bound to `target`
    /// instead of failing with `NotFound`.
    ///
    /// Routing construction through `EntryMap::get_or_try_insert` here too
    /// means two threads racing `create_file` on a brand-new `name` share
    /// one constructed `FileEntry` (and its one per-entry lock) instead of
    /// each building and registering their own — the second racer's insert
    /// would otherwise clobber whatever a concurrent `lookup_or_reload`
    /// (triggered by e.g. `GetFileStat`/`MoveFile`) had already registered.
    /// The actual on-disk creation still happens afterwards, under the
    /// returned entry's own lock, so filesystem exclusive-create remains
    /// the sole arbiter of which concurrent `create_file` call wins.
    pub(crate) fn get_or_create_entry(&self, name: &str, target: StateId) -> Result<Arc<FileEntry>> {
        let mut probe = || -> Result<Arc<FileEntry>> {
            match self.probe_hits(name)?.as_slice() {
                [] => Ok(Arc::new(FileEntry::new(name.to_owned(), target))),
                [only] => {
                    tracing::warn!(name, state = %only, "reloading entry not present in registry");
                    Ok(Arc::new(FileEntry::new(name.to_owned(), *only)))
                }
                many => Err(Error::Corrupt { name: name.to_owned(), states: many.to_vec() }),
            }
        };
        self.map.get_or_try_insert(name, &mut probe)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
