//! Download statistics: lock-free counters plus a serialisable snapshot.
//!
//! Consumers can compute rate = bytes / elapsed and ETA = remaining / rate;
//! [`StatsSnapshot`] carries both precomputed.

use serde::{Serialize, Serializer};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use crate::sync::lock;

#[derive(Debug, Default)]
struct Clock {
    started: Option<Instant>,
    finished: Option<Instant>,
}

/// Counters only grow during a run; `reset` starts the next run.
#[derive(Debug, Default)]
pub(super) struct DownloadStats {
    bytes_downloaded: AtomicU64,
    total_bytes: AtomicU64,
    chunks_completed: AtomicUsize,
    chunks_failed: AtomicUsize,
    active_workers: AtomicUsize,
    /// Sum of per-chunk fetch times.
    download_time_ms: AtomicU64,
    clock: Mutex<Clock>,
}

impl DownloadStats {
    /// Zero the counters for a new run. The active gauge is left alone:
    /// workers of a stopped run may still be finishing.
    pub(super) fn reset(&self, total_bytes: u64) {
        self.bytes_downloaded.store(0, Ordering::Relaxed);
        self.total_bytes.store(total_bytes, Ordering::Relaxed);
        self.chunks_completed.store(0, Ordering::Relaxed);
        self.chunks_failed.store(0, Ordering::Relaxed);
        self.download_time_ms.store(0, Ordering::Relaxed);
        *lock(&self.clock) = Clock {
            started: Some(Instant::now()),
            finished: None,
        };
    }

    pub(super) fn add_planned(&self, bytes: u64) {
        self.total_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(super) fn chunk_completed(&self, bytes: u64, elapsed_ms: u64) {
        self.bytes_downloaded.fetch_add(bytes, Ordering::Relaxed);
        self.download_time_ms.fetch_add(elapsed_ms, Ordering::Relaxed);
        self.chunks_completed.fetch_add(1, Ordering::AcqRel);
    }

    pub(super) fn chunk_failed(&self) {
        self.chunks_failed.fetch_add(1, Ordering::AcqRel);
    }

    pub(super) fn worker_started(&self) {
        self.active_workers.fetch_add(1, Ordering::AcqRel);
    }

    pub(super) fn worker_finished(&self) {
        self.active_workers.fetch_sub(1, Ordering::AcqRel);
    }

    pub(super) fn active_workers(&self) -> usize {
        self.active_workers.load(Ordering::Acquire)
    }

    pub(super) fn completed(&self) -> usize {
        self.chunks_completed.load(Ordering::Acquire)
    }

    pub(super) fn failed(&self) -> usize {
        self.chunks_failed.load(Ordering::Acquire)
    }

    /// Freeze the clock; elapsed time stops growing.
    pub(super) fn finish(&self) {
        let mut clock = lock(&self.clock);
        if clock.finished.is_none() {
            clock.finished = Some(Instant::now());
        }
    }

    fn elapsed_ms(&self) -> u64 {
        let clock = lock(&self.clock);
        match (clock.started, clock.finished) {
            (Some(s), Some(f)) => f.duration_since(s).as_millis() as u64,
            (Some(s), None) => s.elapsed().as_millis() as u64,
            _ => 0,
        }
    }

    pub(super) fn snapshot(&self, total_chunks: usize, is_downloading: bool) -> StatsSnapshot {
        let total_downloaded = self.bytes_downloaded.load(Ordering::Relaxed);
        let total_size = self.total_bytes.load(Ordering::Relaxed);
        let elapsed_time = self.elapsed_ms();
        let chunk_ms = self.download_time_ms.load(Ordering::Relaxed);

        let current_speed = per_second(total_downloaded, elapsed_time);
        let estimated_time_remaining = if total_downloaded >= total_size {
            Some(0)
        } else if current_speed == 0 {
            None
        } else {
            Some((total_size - total_downloaded) / current_speed)
        };

        StatsSnapshot {
            total_downloaded,
            total_size,
            completed_chunks: self.completed(),
            failed_chunks: self.failed(),
            total_chunks,
            active_threads: self.active_workers(),
            elapsed_time,
            current_speed,
            average_speed: per_second(total_downloaded, chunk_ms),
            is_downloading,
            estimated_time_remaining,
        }
    }
}

fn per_second(bytes: u64, ms: u64) -> u64 {
    if ms == 0 {
        return 0;
    }
    (bytes as u128 * 1000 / ms as u128) as u64
}

/// Snapshot of one download (telemetry / CLI friendly).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub total_downloaded: u64,
    pub total_size: u64,
    pub completed_chunks: usize,
    pub failed_chunks: usize,
    pub total_chunks: usize,
    /// Workers currently fetching a chunk.
    pub active_threads: usize,
    /// Milliseconds since start (frozen once the download ends).
    pub elapsed_time: u64,
    /// Overall bytes per second.
    pub current_speed: u64,
    /// Bytes per second of connection time, summed over chunks.
    pub average_speed: u64,
    pub is_downloading: bool,
    /// Seconds; `None` (serialised as -1) while the speed is unknown.
    #[serde(serialize_with = "eta_or_unknown")]
    pub estimated_time_remaining: Option<u64>,
}

fn eta_or_unknown<S: Serializer>(eta: &Option<u64>, s: S) -> Result<S::Ok, S::Error> {
    match eta {
        Some(v) => s.serialize_i64(*v as i64),
        None => s.serialize_i64(-1),
    }
}

impl StatsSnapshot {
    /// Estimated seconds remaining (None if rate is 0).
    pub fn eta_secs(&self) -> Option<u64> {
        self.estimated_time_remaining
    }

    /// Fraction complete in [0.0, 1.0], by bytes.
    pub fn fraction(&self) -> f64 {
        if self.total_size == 0 {
            return 1.0;
        }
        (self.total_downloaded as f64 / self.total_size as f64).min(1.0)
    }

    pub fn percent(&self) -> f64 {
        self.fraction() * 100.0
    }

    /// Every chunk reached a terminal state.
    pub fn is_complete(&self) -> bool {
        self.completed_chunks + self.failed_chunks == self.total_chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_stats_have_unknown_eta() {
        let stats = DownloadStats::default();
        stats.reset(1000);
        let s = stats.snapshot(10, true);
        assert_eq!(s.total_size, 1000);
        assert_eq!(s.total_downloaded, 0);
        assert_eq!(s.average_speed, 0);
        assert!(s.elapsed_time < 1000);
        assert!(!s.is_complete());
        // No bytes yet: speed is zero, ETA unknown.
        assert_eq!(s.current_speed, 0);
        assert_eq!(s.eta_secs(), None);
    }

    #[test]
    fn counters_and_speeds() {
        let stats = DownloadStats::default();
        stats.reset(4000);
        stats.chunk_completed(1000, 500);
        stats.chunk_completed(1000, 500);
        stats.chunk_failed();
        let s = stats.snapshot(4, true);
        assert_eq!(s.completed_chunks, 2);
        assert_eq!(s.failed_chunks, 1);
        // 2000 bytes over 1000 ms of connection time.
        assert_eq!(s.average_speed, 2000);
        assert!((s.fraction() - 0.5).abs() < 1e-9);
        assert!((s.percent() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn finish_freezes_clock_and_eta_zero_when_done() {
        let stats = DownloadStats::default();
        stats.reset(10);
        stats.chunk_completed(10, 1);
        stats.finish();
        let a = stats.snapshot(1, false).elapsed_time;
        std::thread::sleep(std::time::Duration::from_millis(20));
        let s = stats.snapshot(1, false);
        assert_eq!(s.elapsed_time, a);
        assert_eq!(s.eta_secs(), Some(0));
        assert!(s.is_complete());
    }

    #[test]
    fn active_gauge_survives_reset() {
        let stats = DownloadStats::default();
        stats.worker_started();
        stats.reset(1);
        assert_eq!(stats.active_workers(), 1);
        stats.worker_finished();
        assert_eq!(stats.active_workers(), 0);
    }

    #[test]
    fn snapshot_json_is_camel_case() {
        let stats = DownloadStats::default();
        stats.reset(100);
        let v = serde_json::to_value(stats.snapshot(1, true)).unwrap();
        assert_eq!(v["totalSize"], 100);
        assert_eq!(v["isDownloading"], true);
        assert_eq!(v["estimatedTimeRemaining"], -1);
        assert!(v.get("completedChunks").is_some());
        assert!(v.get("activeThreads").is_some());
    }
}
