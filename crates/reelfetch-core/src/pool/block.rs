//! Owned handle to one arena block.

use bytes::BytesMut;
use std::fmt;
use std::sync::Arc;

use super::PoolShared;

/// Opaque identifier of a block inside its pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub(super) usize);

impl BlockId {
    /// Position of the block in the arena (0-based).
    pub fn index(self) -> usize {
        self.0
    }
}

/// Exclusive handle to one fixed-size block of a [`BlockPool`](super::BlockPool).
///
/// Move-only: there is never more than one live `Block` per arena block, so
/// the payload is written through it without any pool lock. Dropping the
/// handle returns the block to the pool it came from.
pub struct Block {
    pub(super) id: BlockId,
    pub(super) buf: BytesMut,
    pub(super) len: usize,
    pub(super) pool: Arc<PoolShared>,
}

impl Block {
    pub fn id(&self) -> BlockId {
        self.id
    }

    /// Bytes of payload currently stored.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Block size of the owning pool.
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Copy `data` into the block, replacing previous contents.
    /// Copies at most `capacity()` bytes; returns the number copied.
    pub fn fill(&mut self, data: &[u8]) -> usize {
        let n = data.len().min(self.buf.len());
        self.buf[..n].copy_from_slice(&data[..n]);
        self.len = n;
        n
    }

    /// Stored payload, borrowed straight from the arena.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub(super) fn belongs_to(&self, pool: &Arc<PoolShared>) -> bool {
        Arc::ptr_eq(&self.pool, pool)
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("id", &self.id)
            .field("len", &self.len)
            .field("capacity", &self.buf.len())
            .finish()
    }
}

impl Drop for Block {
    fn drop(&mut self) {
        let buf = std::mem::take(&mut self.buf);
        self.pool.release(self.id.0, buf);
    }
}
