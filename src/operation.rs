//! Transient command object binding an acceptable-state set to one verb.

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::handle::{ReadWriter, Reader};
use crate::metadata::{ByteRangeUpdate, MetadataDescriptor};
use crate::state::{AcceptSet, StateId};
use crate::store::Store;

/// Stat snapshot returned by [`FileOperation::get_file_stat`].
#[derive(Debug, Clone, Copy)]
pub struct FileStat {
    pub state: StateId,
    pub size: u64,
}

/// Fluent builder: `store.new_file_op().accept_state(s1).accept_state(s2)...verb(args)`.
///
/// An operation with an empty accepted-state set accepts any state (used by
/// verbs whose target state is supplied separately, like `create_file`).
/// Every mutating verb: looks the entry up (reloading from disk on miss),
/// takes its lock, validates state (except `create_file`), performs the
/// filesystem call, updates the registry, releases the lock.
pub struct FileOperation<'a> {
    store: &'a Store,
    accept: AcceptSet,
}

impl<'a> FileOperation<'a> {
    pub(crate) fn new(store: &'a Store) -> Self {
        Self { store, accept: AcceptSet::new() }
    }

    /// Widens the acceptable source-state set. The only way to do so.
    pub fn accept_state(mut self, id: StateId) -> Self {
        self.accept.push(id);
        self
    }

    /// Creates `name` in `target` with `size` bytes (sparse allowed).
    /// Unrestricted by the accepted-state set; races are resolved by the
    /// filesystem's exclusive-create, so exactly one racer succeeds.
    pub fn create_file(self, name: &str, target: StateId, size: u64) -> Result<()> {
        tracing::debug!(name, target = %target, size, "create_file");
        let entry = self.store.get_or_create_entry(name, target)?;
        let mut inner = entry.lock();
        inner.create(self.store.states(), self.store.factory(), name, target, size)
    }

    /// Moves `name` to `target`, gated by the accepted-state set.
    pub fn move_file(self, name: &str, target: StateId) -> Result<()> {
        tracing::debug!(name, target = %target, "move_file");
        let entry = self.store.lookup_or_reload(name)?;
        let mut inner = entry.lock();
        inner.verify(name, &self.accept)?;
        inner.move_to(self.store.states(), self.store.factory(), name, target)
    }

    /// Hard-links `name`'s current main file at `absolute_dst`.
    pub fn link_file_to(self, name: &str, absolute_dst: &Path) -> Result<()> {
        tracing::debug!(name, dst = %absolute_dst.display(), "link_file_to");
        let entry = self.store.lookup_or_reload(name)?;
        let inner = entry.lock();
        inner.verify(name, &self.accept)?;
        inner.link_to(self.store.states(), self.store.factory(), name, absolute_dst)
    }

    /// Removes `name`'s main file, its sidecars, and its registry entry.
    /// Outstanding handles remain usable until closed.
    pub fn delete_file(self, name: &str) -> Result<()> {
        tracing::debug!(name, "delete_file");
        let entry = self.store.lookup_or_reload(name)?;
        {
            let mut inner = entry.lock();
            inner.verify(name, &self.accept)?;
            inner.delete(self.store.states(), self.store.factory(), name)?;
        }
        self.store.remove_entry(name);
        Ok(())
    }

    /// Returns the entry's current state and main-file size.
    pub fn get_file_stat(self, name: &str) -> Result<FileStat> {
        tracing::trace!(name, "get_file_stat");
        let entry = self.store.lookup_or_reload(name)?;
        let inner = entry.lock();
        inner.verify(name, &self.accept)?;
        let path = inner.resolve_path(self.store.states(), self.store.factory(), name)?;
        let size = std::fs::metadata(&path)?.len();
        Ok(FileStat { state: inner.state(), size })
    }

    /// Opens a read-only handle. `read_part_size` of `0` selects buffered
    /// whole-file I/O; `>0` selects pooled, fixed-size chunked I/O.
    pub fn get_file_reader(self, name: &str, read_part_size: usize) -> Result<Reader> {
        tracing::trace!(name, read_part_size, "get_file_reader");
        let entry = self.store.lookup_or_reload(name)?;
        let path: PathBuf;
        {
            let inner = entry.lock();
            inner.verify(name, &self.accept)?;
            path = inner.resolve_path(self.store.states(), self.store.factory(), name)?;
        }
        let file = std::fs::File::open(&path)?;
        entry.inc_ref();
        Ok(Reader::new(file, entry, self.store.pool_for(read_part_size)))
    }

    /// Opens a read-write handle. Part sizes of `0` select buffered
    /// whole-file I/O; `>0` selects pooled, fixed-size chunked I/O.
    pub fn get_file_read_writer(
        self,
        name: &str,
        read_part_size: usize,
        write_part_size: usize,
    ) -> Result<ReadWriter> {
        tracing::trace!(name, read_part_size, write_part_size, "get_file_read_writer");
        let entry = self.store.lookup_or_reload(name)?;
        let path: PathBuf;
        {
            let inner = entry.lock();
            inner.verify(name, &self.accept)?;
            path = inner.resolve_path(self.store.states(), self.store.factory(), name)?;
        }
        let file = std::fs::OpenOptions::new().read(true).write(true).open(&path)?;
        entry.inc_ref();
        Ok(ReadWriter::new(
            file,
            entry,
            self.store.pool_for(read_part_size),
            self.store.pool_for(write_part_size),
        ))
    }

    pub fn get_file_metadata(self, name: &str, descriptor: &mut dyn MetadataDescriptor) -> Result<()> {
        tracing::trace!(name, kind = descriptor.kind(), "get_file_metadata");
        let entry = self.store.lookup_or_reload(name)?;
        let mut inner = entry.lock();
        inner.verify(name, &self.accept)?;
        inner.get_metadata(self.store.states(), self.store.factory(), name, descriptor)
    }

    pub fn get_or_set_file_metadata(
        self,
        name: &str,
        descriptor: &mut dyn MetadataDescriptor,
    ) -> Result<()> {
        tracing::trace!(name, kind = descriptor.kind(), "get_or_set_file_metadata");
        let entry = self.store.lookup_or_reload(name)?;
        let mut inner = entry.lock();
        inner.verify(name, &self.accept)?;
        inner.get_or_set_metadata(self.store.states(), self.store.factory(), name, descriptor)
    }

    pub fn set_file_metadata(self, name: &str, descriptor: &dyn MetadataDescriptor) -> Result<bool> {
        tracing::debug!(name, kind = descriptor.kind(), "set_file_metadata");
        let entry = self.store.lookup_or_reload(name)?;
        let mut inner = entry.lock();
        inner.verify(name, &self.accept)?;
        inner.set_metadata(self.store.states(), self.store.factory(), name, descriptor)
    }

    pub fn set_file_metadata_at(self, name: &str, descriptor: &dyn ByteRangeUpdate) -> Result<bool> {
        tracing::debug!(name, kind = descriptor.kind(), offset = descriptor.offset(), "set_file_metadata_at");
        let entry = self.store.lookup_or_reload(name)?;
        let mut inner = entry.lock();
        inner.verify(name, &self.accept)?;
        inner.set_metadata_at(self.store.states(), self.store.factory(), name, descriptor)
    }

    /// Idempotent: succeeds even if the sidecar never existed.
    pub fn delete_file_metadata(self, name: &str, descriptor: &dyn MetadataDescriptor) -> Result<()> {
        tracing::debug!(name, kind = descriptor.kind(), "delete_file_metadata");
        let entry = self.store.lookup_or_reload(name)?;
        let mut inner = entry.lock();
        inner.verify(name, &self.accept)?;
        inner.delete_metadata(self.store.states(), self.store.factory(), name, descriptor)
    }
}
