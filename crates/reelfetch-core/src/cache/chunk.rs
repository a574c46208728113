//! Cache entries.

use serde::Serialize;

use crate::pool::Block;

/// Caller-supplied description of a chunk being inserted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkMeta {
    pub timestamp_ms: u64,
    pub width: u32,
    pub height: u32,
    pub duration_ms: u64,
    pub is_key_frame: bool,
    pub reel_index: i64,
}

/// One ring slot. Owns its pool block until eviction, overwrite or clear.
#[derive(Debug)]
pub struct VideoChunk {
    storage: Option<Block>,
    pub size: usize,
    pub timestamp_ms: u64,
    pub width: u32,
    pub height: u32,
    pub duration_ms: u64,
    pub is_key_frame: bool,
    /// Insertion sequence number, assigned by the cache.
    pub chunk_id: u64,
    pub reel_index: i64,
}

impl VideoChunk {
    pub(super) fn vacant() -> Self {
        Self {
            storage: None,
            size: 0,
            timestamp_ms: 0,
            width: 0,
            height: 0,
            duration_ms: 0,
            is_key_frame: false,
            chunk_id: 0,
            reel_index: -1,
        }
    }

    pub(super) fn resident(block: Block, meta: ChunkMeta) -> Self {
        Self {
            size: block.len(),
            storage: Some(block),
            timestamp_ms: meta.timestamp_ms,
            width: meta.width,
            height: meta.height,
            duration_ms: meta.duration_ms,
            is_key_frame: meta.is_key_frame,
            chunk_id: 0,
            reel_index: meta.reel_index,
        }
    }

    /// Payload bytes, straight from the pool block. Empty for a vacant slot.
    pub fn data(&self) -> &[u8] {
        self.storage.as_ref().map(Block::as_slice).unwrap_or(&[])
    }

    /// True while the slot holds a block.
    pub fn is_resident(&self) -> bool {
        self.storage.is_some()
    }

    /// Release the block, keeping the metadata. Leaves a hole in the ring.
    pub(super) fn take_storage(&mut self) -> Option<Block> {
        self.storage.take()
    }

    pub fn metadata(&self) -> ChunkMetadata {
        ChunkMetadata {
            chunk_id: self.chunk_id,
            reel_index: self.reel_index,
            size: self.size,
            timestamp: self.timestamp_ms,
            width: self.width,
            height: self.height,
            duration: self.duration_ms,
            is_key_frame: self.is_key_frame,
        }
    }
}

/// Serialisable description of a resident chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMetadata {
    pub chunk_id: u64,
    pub reel_index: i64,
    pub size: usize,
    pub timestamp: u64,
    pub width: u32,
    pub height: u32,
    pub duration: u64,
    pub is_key_frame: bool,
}
