use std::time::Duration;

use super::SchedulerError;
use crate::retry::RetryPolicy;
use crate::segmenter::chunk_count;

/// One download: a resource split into `chunk_size` ranges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    pub url: String,
    pub total_size: u64,
    pub chunk_size: u64,
    pub max_concurrent_chunks: usize,
    /// Attempts per chunk, including the first.
    pub max_retries: u32,
    /// Per-request timeout handed to the transport.
    pub timeout: Duration,
    /// Flat delay before a failed chunk is requeued.
    pub retry_interval: Duration,
    /// Reel index given to chunk 0 in the cache; chunk `i` gets `reel_base + i`.
    pub reel_base: i64,
}

impl DownloadTask {
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.total_size == 0 {
            return Err(SchedulerError::InvalidTask("total_size is zero".into()));
        }
        if self.chunk_size == 0 {
            return Err(SchedulerError::InvalidTask("chunk_size is zero".into()));
        }
        if self.max_concurrent_chunks == 0 {
            return Err(SchedulerError::InvalidTask("max_concurrent_chunks is zero".into()));
        }
        url::Url::parse(&self.url)
            .map_err(|e| SchedulerError::InvalidTask(format!("bad url {:?}: {e}", self.url)))?;
        Ok(())
    }

    pub fn num_chunks(&self) -> usize {
        chunk_count(self.total_size, self.chunk_size)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            interval: self.retry_interval,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> DownloadTask {
        DownloadTask {
            url: "https://cdn.example.test/reel/42.mp4".into(),
            total_size: 10_000_000,
            chunk_size: 1_000_000,
            max_concurrent_chunks: 4,
            max_retries: 3,
            timeout: Duration::from_secs(5),
            retry_interval: Duration::from_millis(10),
            reel_base: 0,
        }
    }

    #[test]
    fn valid_task() {
        assert!(task().validate().is_ok());
        assert_eq!(task().num_chunks(), 10);
    }

    #[test]
    fn rejects_zero_sizes() {
        for t in [
            DownloadTask { total_size: 0, ..task() },
            DownloadTask { chunk_size: 0, ..task() },
            DownloadTask { max_concurrent_chunks: 0, ..task() },
        ] {
            assert!(matches!(t.validate(), Err(SchedulerError::InvalidTask(_))));
        }
    }

    #[test]
    fn rejects_unparseable_url() {
        let t = DownloadTask { url: "not a url".into(), ..task() };
        assert!(matches!(t.validate(), Err(SchedulerError::InvalidTask(_))));
    }
}
