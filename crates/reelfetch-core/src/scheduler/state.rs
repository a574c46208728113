//! Per-download bookkeeping guarded by the scheduler's run lock.

use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;

use super::event::ChunkInfo;
use super::task::DownloadTask;
use crate::segmenter::ChunkDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SchedulerState {
    Idle,
    Running,
    Completed,
    Stopped,
}

/// Where a chunk is in its lifecycle. Dispatch requires `Pending`; requeue
/// requires `InFlight`; `Downloaded` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ChunkStatus {
    Pending,
    InFlight,
    Downloaded,
    Failed,
}

#[derive(Debug, Clone)]
pub(super) struct ChunkRecord {
    pub(super) descriptor: ChunkDescriptor,
    pub(super) status: ChunkStatus,
    pub(super) retry_count: u32,
    pub(super) download_time_ms: u64,
    pub(super) error: Option<String>,
}

impl ChunkRecord {
    pub(super) fn new(descriptor: ChunkDescriptor) -> Self {
        Self {
            descriptor,
            status: ChunkStatus::Pending,
            retry_count: 0,
            download_time_ms: 0,
            error: None,
        }
    }

    pub(super) fn info(&self) -> ChunkInfo {
        ChunkInfo {
            chunk_index: self.descriptor.index,
            offset: self.descriptor.offset,
            size: self.descriptor.size,
            status: self.status,
            is_downloaded: self.status == ChunkStatus::Downloaded,
            is_failed: self.status == ChunkStatus::Failed,
            download_time: self.download_time_ms,
            retry_count: self.retry_count,
            error: self.error.clone(),
        }
    }
}

pub(super) struct RunState {
    pub(super) state: SchedulerState,
    /// Bumped on every start; late results from older runs are dropped.
    pub(super) generation: u64,
    pub(super) task: Option<Arc<DownloadTask>>,
    /// Positions into `chunks` waiting for dispatch.
    pub(super) pending: VecDeque<usize>,
    pub(super) chunks: Vec<ChunkRecord>,
    pub(super) completion_sent: bool,
}

impl RunState {
    pub(super) fn new() -> Self {
        Self {
            state: SchedulerState::Idle,
            generation: 0,
            task: None,
            pending: VecDeque::new(),
            chunks: Vec::new(),
            completion_sent: false,
        }
    }

    /// True while `generation` is the running download.
    pub(super) fn is_current(&self, generation: u64) -> bool {
        self.generation == generation && self.state == SchedulerState::Running
    }

    pub(super) fn position_of(&self, index: usize) -> Option<usize> {
        // Planned chunks sit at their own index; added ones are appended.
        match self.chunks.get(index) {
            Some(r) if r.descriptor.index == index => Some(index),
            _ => self.chunks.iter().position(|r| r.descriptor.index == index),
        }
    }

    /// Record at `pos` if it belongs to the running `generation` and is in flight.
    pub(super) fn in_flight_mut(&mut self, generation: u64, pos: usize) -> Option<&mut ChunkRecord> {
        if !self.is_current(generation) {
            return None;
        }
        self.chunks
            .get_mut(pos)
            .filter(|r| r.status == ChunkStatus::InFlight)
    }
}
