//! Chunk descriptor and planning.

use std::sync::Arc;

/// One byte range of a download. Immutable once planned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkDescriptor {
    pub url: Arc<str>,
    /// Position in the plan (0-based); identifies the chunk, not arrival order.
    pub index: usize,
    pub offset: u64,
    pub size: u64,
}

impl ChunkDescriptor {
    /// Last byte of the range (inclusive). Equals `offset` for an empty chunk.
    pub fn end_inclusive(&self) -> u64 {
        self.offset + self.size.saturating_sub(1)
    }

    /// HTTP Range header value: `bytes=offset-end_inclusive`.
    pub fn range_header_value(&self) -> String {
        format!("bytes={}-{}", self.offset, self.end_inclusive())
    }
}

/// Number of chunks needed to cover `total_size` (ceiling division).
/// Zero when either size is zero.
pub fn chunk_count(total_size: u64, chunk_size: u64) -> usize {
    if total_size == 0 || chunk_size == 0 {
        return 0;
    }
    total_size.div_ceil(chunk_size) as usize
}

/// Descriptor for chunk `index`, or `None` past the end of the resource.
pub fn chunk_at(url: &Arc<str>, total_size: u64, chunk_size: u64, index: usize) -> Option<ChunkDescriptor> {
    if index >= chunk_count(total_size, chunk_size) {
        return None;
    }
    let offset = index as u64 * chunk_size;
    Some(ChunkDescriptor {
        url: Arc::clone(url),
        index,
        offset,
        size: chunk_size.min(total_size - offset),
    })
}

/// Full plan for a resource, in index order.
pub fn plan_chunks(url: &str, total_size: u64, chunk_size: u64) -> Vec<ChunkDescriptor> {
    let url: Arc<str> = Arc::from(url);
    (0..chunk_count(total_size, chunk_size))
        .filter_map(|i| chunk_at(&url, total_size, chunk_size, i))
        .collect()
}
