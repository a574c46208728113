//! Borrowed access to resident chunks.

use std::cell::RefCell;
use std::ops::Deref;
use std::sync::MutexGuard;

use super::chunk::VideoChunk;
use super::ring::Ring;

thread_local! {
    /// Ring locks held by this thread through a `ChunkRef` or `CacheView`.
    static HELD: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

/// Marks the ring at `addr` as locked by the current thread until dropped.
pub(super) struct Held(usize);

impl Held {
    pub(super) fn new(addr: usize) -> Self {
        HELD.with(|h| h.borrow_mut().push(addr));
        Held(addr)
    }
}

impl Drop for Held {
    fn drop(&mut self) {
        let _ = HELD.try_with(|h| {
            let mut h = h.borrow_mut();
            if let Some(i) = h.iter().rposition(|&a| a == self.0) {
                h.swap_remove(i);
            }
        });
    }
}

/// True if this thread holds a `ChunkRef` or `CacheView` on the ring at `addr`.
pub(super) fn held_here(addr: usize) -> bool {
    HELD.try_with(|h| h.borrow().contains(&addr)).unwrap_or(false)
}

/// A resident chunk. Holds the ring lock while alive, so keep it short-lived:
/// writers block until it is dropped.
///
/// Do not call back into the same [`ChunkCache`](super::ChunkCache) while a
/// `ChunkRef` is alive on this thread: the ring mutex is not reentrant and
/// the call would deadlock. Debug builds panic instead.
pub struct ChunkRef<'a> {
    pub(super) guard: MutexGuard<'a, Ring>,
    pub(super) slot: usize,
    pub(super) _held: Held,
}

impl ChunkRef<'_> {
    /// Slot position in the ring.
    pub fn slot(&self) -> usize {
        self.slot
    }
}

impl Deref for ChunkRef<'_> {
    type Target = VideoChunk;

    fn deref(&self) -> &VideoChunk {
        &self.guard.slots[self.slot]
    }
}

/// Snapshot view over the ring, oldest entry first. Holds the ring lock, so
/// the same reentrancy rule as [`ChunkRef`] applies: no calls into the cache
/// from this thread until the view is dropped.
pub struct CacheView<'a> {
    pub(super) guard: MutexGuard<'a, Ring>,
    pub(super) _held: Held,
}

impl CacheView<'_> {
    /// Resident chunks from tail to head; holes are skipped.
    pub fn iter(&self) -> impl Iterator<Item = &VideoChunk> + '_ {
        let ring = &*self.guard;
        ring.positions()
            .map(move |p| &ring.slots[p])
            .filter(|c| c.is_resident())
    }

    pub fn len(&self) -> usize {
        self.guard.resident()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
