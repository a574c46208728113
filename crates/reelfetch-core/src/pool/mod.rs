//! Fixed-size block allocator over a single pre-allocated arena.
//!
//! The arena is one zeroed allocation carved into `block_size` pieces at
//! construction; the pool never grows. Allocation hands out a move-only
//! [`Block`] that owns its piece until it is dropped or passed back to
//! [`BlockPool::deallocate`]. One mutex guards the free table; payload bytes
//! are written through the `Block` without it.

mod block;
mod mlock;

use bytes::BytesMut;
use std::sync::{Arc, Mutex};

use crate::sync::lock;

pub use block::{Block, BlockId};

use mlock::LockedRegion;

/// Free table: `Some` = free piece parked in the pool, `None` = handed out.
struct FreeTable {
    slots: Vec<Option<BytesMut>>,
    free: usize,
}

pub(crate) struct PoolShared {
    // Declared first so the arena is unpinned before its pieces are freed.
    locked: Option<LockedRegion>,
    block_size: usize,
    total_blocks: usize,
    table: Mutex<FreeTable>,
}

impl PoolShared {
    fn release(&self, index: usize, buf: BytesMut) {
        let mut table = lock(&self.table);
        match table.slots.get_mut(index) {
            Some(slot @ None) => {
                *slot = Some(buf);
                table.free += 1;
            }
            _ => tracing::debug!(index, "ignoring release of unknown or already-free block"),
        }
    }
}

/// Shared handle to a block pool. Cheap to clone; all clones see the same arena.
#[derive(Clone)]
pub struct BlockPool {
    shared: Arc<PoolShared>,
}

impl BlockPool {
    /// Carve `total_bytes / block_size` blocks out of one allocation.
    /// A zero `block_size` yields an empty pool.
    pub fn new(total_bytes: usize, block_size: usize) -> Self {
        Self::build(total_bytes, block_size, false)
    }

    /// Like [`new`](Self::new) but also tries to pin the arena in RAM
    /// (`mlock`). Pinning failure is logged and otherwise ignored.
    pub fn with_memory_lock(total_bytes: usize, block_size: usize) -> Self {
        Self::build(total_bytes, block_size, true)
    }

    fn build(total_bytes: usize, block_size: usize, pin: bool) -> Self {
        let total_blocks = if block_size == 0 {
            0
        } else {
            total_bytes / block_size
        };
        let arena_len = total_blocks * block_size;
        let mut arena = BytesMut::zeroed(arena_len);
        let locked = if pin {
            LockedRegion::lock(arena.as_ptr(), arena_len)
        } else {
            None
        };

        let mut slots = Vec::with_capacity(total_blocks);
        for _ in 0..total_blocks {
            slots.push(Some(arena.split_to(block_size)));
        }

        tracing::debug!(total_blocks, block_size, "block pool initialized");

        Self {
            shared: Arc::new(PoolShared {
                locked,
                block_size,
                total_blocks,
                table: Mutex::new(FreeTable {
                    slots,
                    free: total_blocks,
                }),
            }),
        }
    }

    /// Take the first free block able to hold `size` bytes.
    ///
    /// Returns `None` if `size` exceeds the block size or every block is in
    /// use; never blocks and never grows the arena. The scan for a free block
    /// is linear in the number of blocks.
    pub fn allocate(&self, size: usize) -> Option<Block> {
        if size > self.shared.block_size {
            tracing::debug!(size, block_size = self.shared.block_size, "allocation larger than block size");
            return None;
        }
        let mut table = lock(&self.shared.table);
        if table.free == 0 {
            return None;
        }
        let (index, buf) = table
            .slots
            .iter_mut()
            .enumerate()
            .find_map(|(i, slot)| slot.take().map(|buf| (i, buf)))?;
        table.free -= 1;
        drop(table);

        Some(Block {
            id: BlockId(index),
            buf,
            len: 0,
            pool: Arc::clone(&self.shared),
        })
    }

    /// Return a block. Blocks from another pool leave this pool untouched
    /// (they go back to the pool that issued them).
    pub fn deallocate(&self, block: Block) {
        if !block.belongs_to(&self.shared) {
            tracing::debug!(id = block.id().index(), "deallocate called with a foreign block");
        }
        drop(block);
    }

    pub fn available_blocks(&self) -> usize {
        lock(&self.shared.table).free
    }

    pub fn used_blocks(&self) -> usize {
        self.shared.total_blocks - self.available_blocks()
    }

    pub fn total_blocks(&self) -> usize {
        self.shared.total_blocks
    }

    pub fn block_size(&self) -> usize {
        self.shared.block_size
    }

    pub fn total_memory(&self) -> usize {
        self.shared.total_blocks * self.shared.block_size
    }

    pub fn used_memory(&self) -> usize {
        self.used_blocks() * self.shared.block_size
    }

    /// True if the arena was successfully pinned with `mlock`.
    pub fn is_memory_locked(&self) -> bool {
        self.shared.locked.is_some()
    }
}

impl std::fmt::Debug for BlockPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockPool")
            .field("block_size", &self.shared.block_size)
            .field("total_blocks", &self.shared.total_blocks)
            .field("available_blocks", &self.available_blocks())
            .finish()
    }
}
