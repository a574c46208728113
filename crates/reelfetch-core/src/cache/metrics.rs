use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub(super) struct Counters {
    bytes_written: AtomicU64,
    chunks_written: AtomicU64,
    bytes_read: AtomicU64,
    chunks_read: AtomicU64,
    evicted: AtomicU64,
}

impl Counters {
    pub(super) fn wrote(&self, bytes: usize) {
        self.bytes_written.fetch_add(bytes as u64, Ordering::Relaxed);
        self.chunks_written.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn read(&self, bytes: usize) {
        self.bytes_read.fetch_add(bytes as u64, Ordering::Relaxed);
        self.chunks_read.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn evicted(&self, n: usize) {
        if n > 0 {
            self.evicted.fetch_add(n as u64, Ordering::Relaxed);
        }
    }

    pub(super) fn fill(&self, m: &mut CacheMetrics) {
        m.total_bytes_written = self.bytes_written.load(Ordering::Relaxed);
        m.total_chunks_written = self.chunks_written.load(Ordering::Relaxed);
        m.total_bytes_read = self.bytes_read.load(Ordering::Relaxed);
        m.total_chunks_read = self.chunks_read.load(Ordering::Relaxed);
        m.total_chunks_evicted = self.evicted.load(Ordering::Relaxed);
    }
}

/// Point-in-time cache telemetry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheMetrics {
    pub capacity: usize,
    /// Ring positions in use, holes included.
    pub len: usize,
    /// Positions that still hold data.
    pub resident: usize,
    pub used_memory: usize,
    pub total_memory: usize,
    pub available_memory: usize,
    pub total_bytes_written: u64,
    pub total_chunks_written: u64,
    pub total_bytes_read: u64,
    pub total_chunks_read: u64,
    pub total_chunks_evicted: u64,
}
