//! Reusable buffer pool backing chunked (part-sized) reader/writer I/O.
//!
//! A [`crate::handle::Reader`]/[`crate::handle::ReadWriter`] opened with
//! `read_part_size`/`write_part_size` of `0` does buffered whole-file I/O;
//! any value `>0` selects pooled, fixed-size chunks handed out from here.
//! Adapted from the teacher's intrusive buffer-chain allocator, simplified
//! to a safe `Vec<u8>` pool since chunked store I/O has no need for the
//! zero-copy DST layout that allocator served in the NFS wire path.

use std::sync::Arc;

use crossbeam_queue::ArrayQueue;

/// A reusable, fixed-size byte chunk. Returned to its pool on drop.
pub struct Chunk {
    buf: Vec<u8>,
    pool: Arc<ArrayQueue<Vec<u8>>>,
}

impl Chunk {
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

impl Drop for Chunk {
    fn drop(&mut self) {
        let buf = std::mem::take(&mut self.buf);
        // Bounded pool: if full (shrunk concurrently), just drop the buffer.
        let _ = self.pool.push(buf);
    }
}

/// Pool of equally-sized byte buffers, checked out as [`Chunk`]s.
#[derive(Clone)]
pub struct BufferPool {
    size: usize,
    pool: Arc<ArrayQueue<Vec<u8>>>,
}

impl BufferPool {
    /// Creates a pool of `count` buffers of `size` bytes each.
    pub fn new(size: usize, count: usize) -> Self {
        let pool = Arc::new(ArrayQueue::new(count.max(1)));
        for _ in 0..count {
            let _ = pool.push(vec![0u8; size]);
        }
        Self { size, pool }
    }

    /// Size, in bytes, of every buffer this pool hands out.
    pub fn chunk_size(&self) -> usize {
        self.size
    }

    /// Checks out a buffer, allocating a fresh one if the pool is empty.
    pub fn acquire(&self) -> Chunk {
        let buf = self.pool.pop().unwrap_or_else(|| vec![0u8; self.size]);
        Chunk { buf, pool: self.pool.clone() }
    }

    /// Splits `total_len` bytes into the chunk boundaries this pool would
    /// hand out, used by readers/writers to plan part-sized transfers.
    pub fn plan(&self, total_len: usize) -> Vec<(usize, usize)> {
        let mut ranges = Vec::new();
        let mut offset = 0;
        while offset < total_len {
            let end = (offset + self.size).min(total_len);
            ranges.push((offset, end));
            offset = end;
        }
        ranges
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquired_chunk_returns_to_pool_on_drop() {
        let pool = BufferPool::new(16, 1);
        {
            let chunk = pool.acquire();
            assert_eq!(chunk.len(), 16);
        }
        let chunk = pool.acquire();
        assert_eq!(chunk.len(), 16);
    }

    #[test]
    fn plan_splits_into_chunk_sized_ranges() {
        let pool = BufferPool::new(4, 2);
        assert_eq!(pool.plan(10), vec![(0, 4), (4, 8), (8, 10)]);
        assert_eq!(pool.plan(0), Vec::<(usize, usize)>::new());
    }
}
