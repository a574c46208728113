//! Chunk planning and range math.
//!
//! Splits a resource into fixed-size chunks: chunk `i` starts at
//! `i * chunk_size` and only the last one may be shorter.

mod chunk;

pub use chunk::{chunk_at, chunk_count, plan_chunks, ChunkDescriptor};
