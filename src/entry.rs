//! Per-file record: current state, metadata cache, refcount, lock.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::{Mutex, MutexGuard};

use crate::error::{Error, FileStateError, Result};
use crate::factory::EntryFactory;
use crate::metadata::{list_sidecar_kinds, sidecar_path, ByteRangeUpdate, MetadataDescriptor};
use crate::state::{AcceptSet, StateId, States};

/// Renames `src` to `dst`, failing rather than silently replacing `dst` if
/// it already exists.
///
/// `std::fs::rename` overwrites an existing destination on POSIX, which
/// would let a target created between a stat check and the rename clobber
/// silently; this uses the kernel's atomic no-replace rename where
/// available instead of a check-then-act probe.
#[cfg(target_os = "linux")]
fn rename_no_replace(src: &Path, dst: &Path) -> std::io::Result<()> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let to_cstring = |p: &Path| {
        CString::new(p.as_os_str().as_bytes())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
    };
    let src = to_cstring(src)?;
    let dst = to_cstring(dst)?;
    let ret = unsafe {
        libc::renameat2(
            libc::AT_FDCWD,
            src.as_ptr(),
            libc::AT_FDCWD,
            dst.as_ptr(),
            libc::RENAME_NOREPLACE,
        )
    };
    if ret == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

/// Portable fallback for platforms without `renameat2`. `link` is exclusive
/// by itself (fails if `dst` exists), so link-then-unlink is the standard
/// no-replace-rename idiom where the syscall isn't available; the brief
/// window with two names for the same inode is harmless since both resolve
/// to the file being moved.
#[cfg(not(target_os = "linux"))]
fn rename_no_replace(src: &Path, dst: &Path) -> std::io::Result<()> {
    fs::hard_link(src, dst)?;
    fs::remove_file(src)
}

/// A cached sidecar: its last-known bytes and whether its kind follows the
/// main file across state transitions.
#[derive(Clone)]
struct Cached {
    bytes: Vec<u8>,
    movable: bool,
}

/// Mutable part of a [`FileEntry`], guarded by its lock.
pub struct Inner {
    state: StateId,
    metadata_cache: std::collections::HashMap<String, Cached>,
}

impl Inner {
    /// Current state of the entry.
    pub fn state(&self) -> StateId {
        self.state
    }

    fn main_path(&self, states: &States, factory: &dyn EntryFactory, name: &str) -> Result<PathBuf> {
        let rel = factory.relative_path(name)?;
        Ok(states.get(self.state).directory().join(rel))
    }

    /// Fails with [`FileStateError`] if the current state is not accepted.
    pub fn verify(&self, name: &str, accept: &AcceptSet) -> Result<()> {
        if accept.accepts(self.state) {
            Ok(())
        } else {
            let err = FileStateError { current: self.state, accepted: accept.as_slice().to_vec() };
            tracing::warn!(name, current = %err.current, accepted = ?err.accepted, "state gate rejected operation");
            Err(Error::FileState(err))
        }
    }

    /// Creates the main file at `target`. Precondition: `self.state == target`
    /// (the entry was constructed bound to `target` before this call); a
    /// mismatch means an entry for `name` already exists elsewhere, which is
    /// reported the same way a physical collision would be.
    pub fn create(
        &mut self,
        states: &States,
        factory: &dyn EntryFactory,
        name: &str,
        target: StateId,
        size: u64,
    ) -> Result<()> {
        if self.state != target {
            return Err(Error::FileExists(name.to_owned()));
        }
        let path = self.main_path(states, factory, name)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = fs::OpenOptions::new().write(true).create_new(true).open(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::AlreadyExists {
                Error::FileExists(name.to_owned())
            } else {
                Error::Io(e)
            }
        })?;
        file.set_len(size)?;
        Ok(())
    }

    /// Renames the main file (and each cached movable sidecar) to `target`'s
    /// directory. Not atomic as a group: a crash mid-move may leave a
    /// subset of sidecars relocated; the next reload tolerates this by
    /// re-deriving the main file's location from disk.
    pub fn move_to(
        &mut self,
        states: &States,
        factory: &dyn EntryFactory,
        name: &str,
        target: StateId,
    ) -> Result<()> {
        let current_path = self.main_path(states, factory, name)?;
        let target_rel = factory.relative_path(name)?;
        let target_path = states.get(target).directory().join(&target_rel);

        if let Some(parent) = target_path.parent() {
            fs::create_dir_all(parent)?;
        }
        // Enumerated from disk, not `metadata_cache`: a sidecar this
        // `FileEntry` instance never loaded (fresh process, post-eviction
        // reload) must still follow the main file.
        let sidecar_kinds = list_sidecar_kinds(&current_path)?;

        rename_no_replace(&current_path, &target_path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::AlreadyExists {
                Error::FileExists(name.to_owned())
            } else {
                Error::Io(e)
            }
        })?;
        self.state = target;

        let mut first_sidecar_err = None;
        for kind in sidecar_kinds {
            // Movability is only known once a descriptor of this kind has
            // been loaded; an uncached kind defaults to movable, matching
            // `MetadataDescriptor::movable`'s own default.
            let movable = self.metadata_cache.get(&kind).map(|c| c.movable).unwrap_or(true);
            if !movable {
                continue;
            }
            let src = sidecar_path(&current_path, &kind);
            let dst = sidecar_path(&target_path, &kind);
            if src.symlink_metadata().is_err() {
                continue;
            }
            if let Some(parent) = dst.parent() {
                if let Err(e) = fs::create_dir_all(parent) {
                    first_sidecar_err.get_or_insert(Error::Io(e));
                    continue;
                }
            }
            if let Err(e) = fs::rename(&src, &dst) {
                first_sidecar_err.get_or_insert(Error::Io(e));
            }
        }
        match first_sidecar_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Hard-links the entry's current main file at `dst`. Does not mutate
    /// entry state; sidecars are not linked.
    pub fn link_to(
        &self,
        states: &States,
        factory: &dyn EntryFactory,
        name: &str,
        dst: &Path,
    ) -> Result<()> {
        let current_path = self.main_path(states, factory, name)?;
        if dst.symlink_metadata().is_ok() {
            return Err(Error::FileExists(dst.display().to_string()));
        }
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::hard_link(&current_path, dst)?;
        Ok(())
    }

    /// Removes the main file and every sidecar found on disk next to it
    /// (not just the ones this instance happened to cache in memory).
    pub fn delete(&mut self, states: &States, factory: &dyn EntryFactory, name: &str) -> Result<()> {
        let path = self.main_path(states, factory, name)?;
        let sidecar_kinds = list_sidecar_kinds(&path)?;
        fs::remove_file(&path)?;
        for kind in sidecar_kinds {
            let _ = fs::remove_file(sidecar_path(&path, &kind));
        }
        self.metadata_cache.clear();
        Ok(())
    }

    pub fn get_metadata(
        &mut self,
        states: &States,
        factory: &dyn EntryFactory,
        name: &str,
        descriptor: &mut dyn MetadataDescriptor,
    ) -> Result<()> {
        let kind = descriptor.kind().to_owned();
        if let Some(cached) = self.metadata_cache.get(&kind) {
            descriptor.from_bytes(&cached.bytes);
            return Ok(());
        }
        let bytes = self.read_sidecar(states, factory, name, &kind)?;
        descriptor.from_bytes(&bytes);
        self.metadata_cache.insert(kind, Cached { bytes, movable: descriptor.movable() });
        Ok(())
    }

    /// If the kind is present, loads it into `descriptor`; otherwise writes
    /// `descriptor`'s current bytes. Either way, `descriptor` ends holding
    /// the authoritative bytes.
    pub fn get_or_set_metadata(
        &mut self,
        states: &States,
        factory: &dyn EntryFactory,
        name: &str,
        descriptor: &mut dyn MetadataDescriptor,
    ) -> Result<()> {
        match self.get_metadata(states, factory, name, descriptor) {
            Ok(()) => Ok(()),
            Err(Error::NotFound(_)) => self.set_metadata(states, factory, name, descriptor).map(|_| ()),
            Err(e) => Err(e),
        }
    }

    /// Writes unconditionally; returns whether the bytes changed.
    pub fn set_metadata(
        &mut self,
        states: &States,
        factory: &dyn EntryFactory,
        name: &str,
        descriptor: &dyn MetadataDescriptor,
    ) -> Result<bool> {
        let kind = descriptor.kind().to_owned();
        let new_bytes = descriptor.to_bytes();
        let prior = match self.metadata_cache.get(&kind) {
            Some(cached) => Some(cached.bytes.clone()),
            None => self.read_sidecar(states, factory, name, &kind).ok(),
        };
        let updated = prior.as_deref() != Some(new_bytes.as_slice());

        let path = self.main_path(states, factory, name)?;
        let side = sidecar_path(&path, &kind);
        if let Some(parent) = side.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&side, &new_bytes)?;
        self.metadata_cache.insert(kind, Cached { bytes: new_bytes, movable: descriptor.movable() });
        Ok(updated)
    }

    /// In-place overwrite of `[offset, offset + patch.len())` in the
    /// sidecar; the sidecar must already exist and the range must lie
    /// within its current length.
    pub fn set_metadata_at(
        &mut self,
        states: &States,
        factory: &dyn EntryFactory,
        name: &str,
        descriptor: &dyn ByteRangeUpdate,
    ) -> Result<bool> {
        let kind = descriptor.kind().to_owned();
        let patch = descriptor.patch();
        let offset = descriptor.offset() as usize;

        let mut bytes = match self.metadata_cache.get(&kind) {
            Some(cached) => cached.bytes.clone(),
            None => self.read_sidecar(states, factory, name, &kind)?,
        };
        let end = offset
            .checked_add(patch.len())
            .filter(|&end| end <= bytes.len())
            .ok_or_else(|| Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidInput, "byte range outside sidecar")))?;

        let updated = bytes[offset..end] != *patch;
        if updated {
            bytes[offset..end].copy_from_slice(patch);
            let path = self.main_path(states, factory, name)?;
            let side = sidecar_path(&path, &kind);
            fs::write(&side, &bytes)?;
        }
        self.metadata_cache.insert(kind, Cached { bytes, movable: descriptor.movable() });
        Ok(updated)
    }

    /// Best-effort removal; succeeds even if the sidecar never existed. A
    /// genuine I/O failure removing an existing sidecar still surfaces.
    pub fn delete_metadata(
        &mut self,
        states: &States,
        factory: &dyn EntryFactory,
        name: &str,
        descriptor: &dyn MetadataDescriptor,
    ) -> Result<()> {
        let kind = descriptor.kind().to_owned();
        let path = self.main_path(states, factory, name)?;
        let side = sidecar_path(&path, &kind);
        match fs::remove_file(side) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(Error::Io(e)),
        }
        self.metadata_cache.remove(&kind);
        Ok(())
    }

    fn read_sidecar(
        &self,
        states: &States,
        factory: &dyn EntryFactory,
        name: &str,
        kind: &str,
    ) -> Result<Vec<u8>> {
        let path = self.main_path(states, factory, name)?;
        let side = sidecar_path(&path, kind);
        fs::read(&side).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::NotFound(format!("{name}:{kind}"))
            } else {
                Error::Io(e)
            }
        })
    }

    /// Main file path in the entry's current state, exposed for opening
    /// reader/writer handles.
    pub fn resolve_path(&self, states: &States, factory: &dyn EntryFactory, name: &str) -> Result<PathBuf> {
        self.main_path(states, factory, name)
    }
}

/// Per-file record. Identity (`name`) is immutable; the rest lives behind
/// [`FileEntry::lock`]. `refcount` is tracked outside the lock so closing a
/// handle never needs it (spec: reader/writer I/O does not take the entry
/// lock).
pub struct FileEntry {
    name: String,
    inner: Mutex<Inner>,
    refcount: AtomicUsize,
}

impl FileEntry {
    pub fn new(name: String, state: StateId) -> Self {
        Self {
            name,
            inner: Mutex::new(Inner { state, metadata_cache: std::collections::HashMap::new() }),
            refcount: AtomicUsize::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Acquires the per-entry lock for the duration of one verb.
    pub fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock()
    }

    pub fn state(&self) -> StateId {
        self.inner.lock().state
    }

    pub fn refcount(&self) -> usize {
        self.refcount.load(Ordering::SeqCst)
    }

    pub(crate) fn inc_ref(&self) -> usize {
        self.refcount.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn dec_ref(&self) -> usize {
        self.refcount.fetch_sub(1, Ordering::SeqCst) - 1
    }
}
