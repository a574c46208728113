//! Scheduler notifications, fanned out over unbounded channels.

use serde::Serialize;
use std::sync::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use super::state::ChunkStatus;
use super::stats::StatsSnapshot;
use crate::retry::ErrorKind;
use crate::sync::lock;

/// Telemetry view of one chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkInfo {
    pub chunk_index: usize,
    pub offset: u64,
    pub size: u64,
    pub status: ChunkStatus,
    pub is_downloaded: bool,
    pub is_failed: bool,
    /// Milliseconds spent on the last attempt.
    pub download_time: u64,
    pub retry_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Fired at most once per chunk per terminal state; `Completed` and
/// `Stopped` at most once per run.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SchedulerEvent {
    ChunkDownloaded {
        info: ChunkInfo,
        /// Cache id, or `None` when the cache could not take the payload.
        #[serde(rename = "chunkId")]
        chunk_id: Option<u64>,
    },
    ChunkRetry {
        info: ChunkInfo,
        kind: ErrorKind,
    },
    ChunkFailed {
        info: ChunkInfo,
        kind: Option<ErrorKind>,
    },
    Progress(StatsSnapshot),
    Completed {
        success: bool,
    },
    Stopped,
}

impl SchedulerEvent {
    /// True for the events that end a run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Stopped)
    }
}

#[derive(Debug, Default)]
pub(super) struct EventBus {
    subscribers: Mutex<Vec<UnboundedSender<SchedulerEvent>>>,
}

impl EventBus {
    pub(super) fn subscribe(&self) -> UnboundedReceiver<SchedulerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.subscribers).push(tx);
        rx
    }

    /// Deliver to every live subscriber; closed receivers are pruned.
    pub(super) fn publish(&self, event: SchedulerEvent) {
        let mut subs = lock(&self.subscribers);
        subs.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_reaches_all_and_prunes_closed() {
        let bus = EventBus::default();
        let mut a = bus.subscribe();
        let b = bus.subscribe();
        drop(b);
        bus.publish(SchedulerEvent::Stopped);
        assert!(matches!(a.try_recv(), Ok(SchedulerEvent::Stopped)));
        assert_eq!(lock(&bus.subscribers).len(), 1);
    }

    #[test]
    fn event_json_is_tagged() {
        let v = serde_json::to_value(SchedulerEvent::Completed { success: true }).unwrap();
        assert_eq!(v["type"], "completed");
        assert_eq!(v["success"], true);
        assert!(SchedulerEvent::Stopped.is_terminal());
    }
}
