//! Fixed-capacity ring of downloaded chunks over a [`BlockPool`].
//!
//! Writers never block on a full cache: the oldest entry is evicted to make
//! room. Readers get [`ChunkRef`]s that borrow the payload straight from the
//! pool block. One mutex guards the ring; when both are needed the ring lock
//! is taken before the pool lock.

mod chunk;
mod error;
mod metrics;
mod ring;
mod view;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::config::CacheConfig;
use crate::pool::BlockPool;
use crate::sync::lock;

pub use chunk::{ChunkMeta, ChunkMetadata, VideoChunk};
pub use error::CacheError;
pub use metrics::CacheMetrics;
pub use view::{CacheView, ChunkRef};

use metrics::Counters;
use ring::Ring;
use view::Held;

pub struct ChunkCache {
    ring: Mutex<Ring>,
    pool: BlockPool,
    preloading: AtomicBool,
    preload_count: usize,
    counters: Counters,
}

impl ChunkCache {
    /// Build the pool (`max_memory_bytes / chunk_size` blocks) and a ring of
    /// `min(max_chunks, blocks)` slots.
    pub fn new(config: &CacheConfig) -> Result<Self, CacheError> {
        if config.chunk_size == 0 {
            return Err(CacheError::InvalidConfig("chunk_size must be non-zero".into()));
        }
        if config.max_chunks == 0 {
            return Err(CacheError::InvalidConfig("max_chunks must be non-zero".into()));
        }
        let pool = if config.lock_memory {
            BlockPool::with_memory_lock(config.max_memory_bytes, config.chunk_size)
        } else {
            BlockPool::new(config.max_memory_bytes, config.chunk_size)
        };
        if pool.total_blocks() == 0 {
            return Err(CacheError::InvalidConfig(format!(
                "max_memory_bytes {} holds no {}-byte block",
                config.max_memory_bytes, config.chunk_size
            )));
        }
        let capacity = config.max_chunks.min(pool.total_blocks());
        tracing::debug!(
            capacity,
            blocks = pool.total_blocks(),
            block_size = pool.block_size(),
            "chunk cache created"
        );
        Ok(Self {
            ring: Mutex::new(Ring::new(capacity)),
            pool,
            preloading: AtomicBool::new(config.enable_preloading),
            preload_count: config.preload_count,
            counters: Counters::default(),
        })
    }

    /// Copy `payload` into a pool block and append it, evicting the oldest
    /// entry if the ring is full. Returns the new chunk id.
    ///
    /// Fails without touching the ring if the payload does not fit a block or
    /// no block can be obtained.
    pub fn add_chunk(&self, payload: &[u8], meta: ChunkMeta) -> Result<u64, CacheError> {
        let block_size = self.pool.block_size();
        if payload.len() > block_size {
            return Err(CacheError::PayloadTooLarge {
                size: payload.len(),
                block_size,
            });
        }

        // Copy outside the ring lock when a free block exists.
        let fresh = self.pool.allocate(payload.len()).map(|mut b| {
            b.fill(payload);
            b
        });

        let mut ring = self.ring();
        let mut evicted = 0;
        let block = match fresh {
            Some(b) => b,
            None => {
                // Pool exhausted: reuse the block the full ring would evict anyway.
                if !(ring.is_full() && ring.tail_is_resident()) {
                    tracing::debug!(reel = meta.reel_index, "no block for chunk");
                    return Err(CacheError::AllocationExhausted);
                }
                let Some(mut b) = ring.evict_tail() else {
                    return Err(CacheError::AllocationExhausted);
                };
                evicted += 1;
                b.fill(payload);
                b
            }
        };
        if ring.is_full() {
            drop(ring.evict_tail());
            evicted += 1;
        }
        let id = ring.push(VideoChunk::resident(block, meta));
        drop(ring);

        self.counters.evicted(evicted);
        self.counters.wrote(payload.len());
        tracing::trace!(id, reel = meta.reel_index, bytes = payload.len(), evicted, "chunk cached");
        Ok(id)
    }

    fn addr(&self) -> usize {
        &self.ring as *const Mutex<Ring> as usize
    }

    /// Ring lock. Taking it while this thread already holds a [`ChunkRef`] or
    /// [`CacheView`] of this cache would deadlock.
    fn ring(&self) -> MutexGuard<'_, Ring> {
        debug_assert!(
            !view::held_here(self.addr()),
            "ChunkCache called while this thread holds a ChunkRef or CacheView of it"
        );
        lock(&self.ring)
    }

    /// Release the chunk with id `id`, leaving a hole at its position.
    /// Returns false if it was already evicted or overwritten.
    pub fn discard(&self, id: u64) -> bool {
        let mut ring = self.ring();
        let Some(slot) = ring.slot_for_id(id) else {
            return false;
        };
        let block = ring.slots[slot].take_storage();
        drop(ring);
        let released = block.is_some();
        drop(block);
        if released {
            self.counters.evicted(1);
            tracing::trace!(id, "chunk discarded");
        }
        released
    }

    /// Chunk at slot `index`, if that slot holds data.
    ///
    /// The returned [`ChunkRef`] keeps the cache locked; drop it before making
    /// any other call on this cache from the same thread.
    pub fn get_chunk(&self, index: usize) -> Option<ChunkRef<'_>> {
        let guard = self.ring();
        if !guard.slots.get(index)?.is_resident() {
            return None;
        }
        self.counters.read(guard.slots[index].size);
        Some(ChunkRef {
            guard,
            slot: index,
            _held: Held::new(self.addr()),
        })
    }

    /// Chunk with id `id`, unless it has since been evicted or overwritten.
    pub fn get_chunk_by_id(&self, id: u64) -> Option<ChunkRef<'_>> {
        let guard = self.ring();
        let slot = guard.slot_for_id(id)?;
        if !guard.slots[slot].is_resident() {
            return None;
        }
        self.counters.read(guard.slots[slot].size);
        Some(ChunkRef {
            guard,
            slot,
            _held: Held::new(self.addr()),
        })
    }

    /// Resident chunk with the smallest `reel_index` greater than `current_reel_index`.
    pub fn get_next_chunk(&self, current_reel_index: i64) -> Option<ChunkRef<'_>> {
        let guard = self.ring();
        let slot = guard
            .positions()
            .filter(|&p| {
                let c = &guard.slots[p];
                c.is_resident() && c.reel_index > current_reel_index
            })
            .min_by_key(|&p| guard.slots[p].reel_index)?;
        self.counters.read(guard.slots[slot].size);
        Some(ChunkRef {
            guard,
            slot,
            _held: Held::new(self.addr()),
        })
    }

    /// Copy of the payload at slot `index`. Releases the lock before returning.
    pub fn raw_data(&self, index: usize) -> Option<Vec<u8>> {
        self.get_chunk(index).map(|c| c.data().to_vec())
    }

    pub fn chunk_size(&self, index: usize) -> Option<usize> {
        let ring = self.ring();
        ring.slots
            .get(index)
            .filter(|c| c.is_resident())
            .map(|c| c.size)
    }

    pub fn is_valid_chunk(&self, index: usize) -> bool {
        self.ring()
            .slots
            .get(index)
            .is_some_and(VideoChunk::is_resident)
    }

    /// Locked view for iterating resident chunks oldest first. Drop it before
    /// making any other call on this cache from the same thread.
    pub fn view(&self) -> CacheView<'_> {
        CacheView {
            guard: self.ring(),
            _held: Held::new(self.addr()),
        }
    }

    /// Reel indices currently resident, oldest first.
    pub fn resident_reels(&self) -> Vec<i64> {
        self.view().iter().map(|c| c.reel_index).collect()
    }

    /// Change the slot count (clamped to `1..=pool blocks`). Oldest entries are
    /// evicted when shrinking below the current length. Returns the new capacity.
    pub fn resize(&self, new_capacity: usize) -> usize {
        let capacity = new_capacity.clamp(1, self.pool.total_blocks());
        let mut ring = self.ring();
        if capacity == ring.capacity() {
            return capacity;
        }
        let evicted = ring.relayout(capacity);
        drop(ring);
        self.counters.evicted(evicted);
        tracing::debug!(capacity, evicted, "chunk cache resized");
        capacity
    }

    /// Under memory pressure (fewer than a quarter of the pool's blocks free),
    /// drop up to `capacity / 4` non-keyframe chunks, oldest first. Their
    /// positions stay in the ring as holes. Returns the number dropped.
    pub fn optimize_memory(&self) -> usize {
        if self.pool.available_blocks() * 4 >= self.pool.total_blocks() {
            return 0;
        }
        let mut ring = self.ring();
        let budget = ring.capacity() / 4;
        let victims: Vec<usize> = ring
            .positions()
            .filter(|&p| {
                let c = &ring.slots[p];
                c.is_resident() && !c.is_key_frame
            })
            .take(budget)
            .collect();
        for &p in &victims {
            drop(ring.slots[p].take_storage());
        }
        drop(ring);
        self.counters.evicted(victims.len());
        if !victims.is_empty() {
            tracing::debug!(dropped = victims.len(), "released non-keyframe chunks under memory pressure");
        }
        victims.len()
    }

    /// Drop every chunk and reset the ring. Ids are not reused.
    pub fn clear(&self) {
        let dropped = self.ring().clear();
        self.counters.evicted(dropped);
    }

    /// Ring positions in use (holes included).
    pub fn len(&self) -> usize {
        self.ring().count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.ring().capacity()
    }

    pub fn block_size(&self) -> usize {
        self.pool.block_size()
    }

    pub fn pool(&self) -> &BlockPool {
        &self.pool
    }

    pub fn metrics(&self) -> CacheMetrics {
        let (capacity, len, resident) = {
            let ring = self.ring();
            (ring.capacity(), ring.count, ring.resident())
        };
        let used_memory = self.pool.used_memory();
        let total_memory = self.pool.total_memory();
        let mut m = CacheMetrics {
            capacity,
            len,
            resident,
            used_memory,
            total_memory,
            available_memory: total_memory - used_memory,
            ..CacheMetrics::default()
        };
        self.counters.fill(&mut m);
        m
    }

    /// Up to `preload_count` reel indices after `current_reel` that are not
    /// resident. Empty while preloading is disabled.
    pub fn preload_candidates(&self, current_reel: i64) -> Vec<i64> {
        if !self.preloading.load(Ordering::Relaxed) {
            return Vec::new();
        }
        let resident = self.resident_reels();
        (1..=self.preload_count as i64)
            .map(|d| current_reel + d)
            .filter(|r| !resident.contains(r))
            .collect()
    }

    pub fn set_preloading(&self, enabled: bool) {
        self.preloading.store(enabled, Ordering::Relaxed);
    }

    pub fn is_preloading(&self) -> bool {
        self.preloading.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for ChunkCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkCache")
            .field("pool", &self.pool)
            .field("len", &self.len())
            .finish()
    }
}
