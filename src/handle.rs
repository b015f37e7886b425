//! Reader/writer handles, decoupled from the entry's on-disk path.
//!
//! A handle's lifetime is independent of the entry's: `delete_file` and
//! `move_file` both operate on the entry while handles opened before the
//! call remain valid (the open `File` keeps its inode on delete; the
//! handle was opened against the path at open time, not re-resolved on
//! every read, so a concurrent rename does not disturb it either). The
//! entry lock is never held across a read or write syscall — only the
//! refcount, tracked outside the lock, is touched on open/close.

use std::io::{Read, Seek, SeekFrom, Write};
use std::sync::Arc;

use crate::allocator::BufferPool;
use crate::entry::FileEntry;
use crate::error::Result;

/// Read-only handle opened by [`crate::operation::FileOperation::get_file_reader`].
pub struct Reader {
    file: std::fs::File,
    entry: Arc<FileEntry>,
    pool: Option<BufferPool>,
    closed: bool,
}

impl Reader {
    pub(crate) fn new(file: std::fs::File, entry: Arc<FileEntry>, pool: Option<BufferPool>) -> Self {
        Self { file, entry, pool, closed: false }
    }

    /// Reads up to one part (or the whole buffer, if this handle was
    /// opened with `read_part_size == 0`) starting at `offset`.
    pub fn read_at(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let len = match &self.pool {
            Some(pool) => len.min(pool.chunk_size()),
            None => len,
        };
        self.file.seek(SeekFrom::Start(offset))?;
        let mut out = match &self.pool {
            Some(pool) => {
                let mut chunk = pool.acquire();
                let n = self.file.read(&mut chunk.as_mut_slice()[..len])?;
                chunk.as_slice()[..n].to_vec()
            }
            None => {
                let mut buf = vec![0u8; len];
                let n = self.file.read(&mut buf)?;
                buf.truncate(n);
                buf
            }
        };
        out.shrink_to_fit();
        Ok(out)
    }

    pub fn len(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    /// Releases the handle. Idempotent; also runs on drop.
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !self.closed {
            self.closed = true;
            self.entry.dec_ref();
        }
    }
}

impl Drop for Reader {
    fn drop(&mut self) {
        self.release();
    }
}

/// Cursor-based `Read`/`Seek`, alongside the positional `read_at` above —
/// both operate on the same underlying descriptor and share its cursor.
impl Read for Reader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.file.read(buf)
    }
}

impl Seek for Reader {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.file.seek(pos)
    }
}

/// Read-write handle opened by [`crate::operation::FileOperation::get_file_read_writer`].
pub struct ReadWriter {
    file: std::fs::File,
    entry: Arc<FileEntry>,
    read_pool: Option<BufferPool>,
    write_pool: Option<BufferPool>,
    closed: bool,
}

impl ReadWriter {
    pub(crate) fn new(
        file: std::fs::File,
        entry: Arc<FileEntry>,
        read_pool: Option<BufferPool>,
        write_pool: Option<BufferPool>,
    ) -> Self {
        Self { file, entry, read_pool, write_pool, closed: false }
    }

    pub fn read_at(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let len = match &self.read_pool {
            Some(pool) => len.min(pool.chunk_size()),
            None => len,
        };
        self.file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; len];
        let n = self.file.read(&mut buf)?;
        buf.truncate(n);
        Ok(buf)
    }

    /// Writes `data` at `offset`. `data` is split into pool-sized chunks
    /// first when this handle was opened with a non-zero write part size.
    pub fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        match &self.write_pool {
            Some(pool) => {
                for (start, end) in pool.plan(data.len()) {
                    self.file.write_all(&data[start..end])?;
                }
            }
            None => self.file.write_all(data)?,
        }
        Ok(())
    }

    pub fn set_len(&mut self, len: u64) -> Result<()> {
        self.file.set_len(len)?;
        Ok(())
    }

    pub fn len(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !self.closed {
            self.closed = true;
            self.entry.dec_ref();
        }
    }
}

impl Drop for ReadWriter {
    fn drop(&mut self) {
        self.release();
    }
}

/// Cursor-based `Read`/`Write`/`Seek`, alongside the positional `read_at`/
/// `write_at` above — both forms operate on the same descriptor and cursor.
impl Read for ReadWriter {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.file.read(buf)
    }
}

impl Write for ReadWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.file.flush()
    }
}

impl Seek for ReadWriter {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        self.file.seek(pos)
    }
}
