//! Circular slot array. Positions `tail, tail+1, ..` (mod capacity) hold
//! `count` entries in insertion order; entry `i` from the tail carries
//! chunk id `tail_seq + i`.

use crate::pool::Block;

use super::chunk::VideoChunk;

pub(super) struct Ring {
    pub(super) slots: Vec<VideoChunk>,
    /// Next write position.
    pub(super) head: usize,
    /// Oldest position.
    pub(super) tail: usize,
    pub(super) count: usize,
    pub(super) tail_seq: u64,
}

impl Ring {
    pub(super) fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| VideoChunk::vacant()).collect(),
            head: 0,
            tail: 0,
            count: 0,
            tail_seq: 0,
        }
    }

    pub(super) fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub(super) fn is_full(&self) -> bool {
        self.count == self.slots.len()
    }

    /// Slot position of the `i`-th entry counted from the tail.
    pub(super) fn position(&self, i: usize) -> usize {
        (self.tail + i) % self.slots.len()
    }

    /// Occupied positions, oldest first. Holes included.
    pub(super) fn positions(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.count).map(move |i| self.position(i))
    }

    pub(super) fn tail_is_resident(&self) -> bool {
        self.count > 0 && self.slots[self.tail].is_resident()
    }

    pub(super) fn resident(&self) -> usize {
        self.positions().filter(|&p| self.slots[p].is_resident()).count()
    }

    /// Drop the oldest entry and hand back its block, if it still had one.
    pub(super) fn evict_tail(&mut self) -> Option<Block> {
        if self.count == 0 {
            return None;
        }
        let tail = self.tail;
        let block = std::mem::replace(&mut self.slots[tail], VideoChunk::vacant()).take_storage();
        self.tail = (tail + 1) % self.slots.len();
        self.count -= 1;
        self.tail_seq += 1;
        block
    }

    /// Write at `head`. The caller makes room first.
    pub(super) fn push(&mut self, mut chunk: VideoChunk) -> u64 {
        debug_assert!(!self.is_full());
        let id = self.tail_seq + self.count as u64;
        chunk.chunk_id = id;
        let head = self.head;
        self.slots[head] = chunk;
        self.head = (head + 1) % self.slots.len();
        self.count += 1;
        id
    }

    pub(super) fn slot_for_id(&self, id: u64) -> Option<usize> {
        let offset = id.checked_sub(self.tail_seq)?;
        if offset >= self.count as u64 {
            return None;
        }
        let pos = self.position(offset as usize);
        (self.slots[pos].chunk_id == id).then_some(pos)
    }

    /// Empty the ring. Ids keep increasing across a clear.
    pub(super) fn clear(&mut self) -> usize {
        let dropped = self.resident();
        self.tail_seq += self.count as u64;
        for slot in &mut self.slots {
            *slot = VideoChunk::vacant();
        }
        self.head = 0;
        self.tail = 0;
        self.count = 0;
        dropped
    }

    /// Change capacity, evicting oldest entries first and compacting the rest
    /// to positions `0..count`. Returns the number of entries evicted.
    pub(super) fn relayout(&mut self, capacity: usize) -> usize {
        let mut evicted = 0;
        while self.count > capacity {
            self.evict_tail();
            evicted += 1;
        }
        let mut slots: Vec<VideoChunk> = (0..capacity).map(|_| VideoChunk::vacant()).collect();
        for (i, pos) in (0..self.count).map(|i| (i, self.position(i))).collect::<Vec<_>>() {
            slots[i] = std::mem::replace(&mut self.slots[pos], VideoChunk::vacant());
        }
        self.slots = slots;
        self.tail = 0;
        self.head = self.count % capacity;
        evicted
    }
}
