/// Failure of a cache operation. Lookups never fail; they return `None`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    #[error("payload of {size} bytes exceeds block size {block_size}")]
    PayloadTooLarge { size: usize, block_size: usize },
    /// No free block and nothing evictable; the ring was left unchanged.
    #[error("no free block available for chunk")]
    AllocationExhausted,
    #[error("invalid cache config: {0}")]
    InvalidConfig(String),
}
