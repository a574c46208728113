//! Control thread: moves pending chunks onto the worker pool in batches.

use std::sync::Arc;

use super::event::SchedulerEvent;
use super::state::{ChunkStatus, RunState, SchedulerState};
use super::{chunk, Inner};
use crate::sync::{lock, wait};
use crate::worker::PoolStopped;

/// Counts a dispatched chunk in the active gauge until dropped, whether the
/// job ran, panicked, or was discarded by the pool.
pub(super) struct ActiveGuard {
    inner: Arc<Inner>,
}

impl ActiveGuard {
    fn new(inner: &Arc<Inner>) -> Self {
        inner.stats.worker_started();
        Self {
            inner: Arc::clone(inner),
        }
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.inner.stats.worker_finished();
        // Take the run lock so a dispatcher between check and wait sees the wakeup.
        drop(lock(&self.inner.run));
        self.inner.wake.notify_all();
    }
}

pub(super) fn run(inner: Arc<Inner>, generation: u64) {
    tracing::debug!(generation, "dispatch loop started");
    loop {
        let Some(batch) = next_batch(&inner, generation) else {
            break;
        };

        let mut handles = Vec::with_capacity(batch.len());
        for (pos, guard) in batch {
            let job_inner = Arc::clone(&inner);
            let submitted = inner.workers.submit(move || {
                let _guard = guard;
                chunk::run(&job_inner, generation, pos);
            });
            match submitted {
                Ok(h) => handles.push((pos, h)),
                Err(PoolStopped) => abandon(&inner, generation, pos, "worker pool stopped"),
            }
        }
        for (pos, h) in handles {
            if h.wait().is_err() {
                abandon(&inner, generation, pos, "chunk task lost");
            }
        }

        if finish_batch(&inner, generation) {
            break;
        }
    }
    tracing::debug!(generation, "dispatch loop exited");
}

/// Block until chunks can be dispatched, then claim up to the concurrency
/// limit. `None` once this run is no longer current.
fn next_batch(inner: &Arc<Inner>, generation: u64) -> Option<Vec<(usize, ActiveGuard)>> {
    let mut run = lock(&inner.run);
    let limit = loop {
        if !run.is_current(generation) {
            return None;
        }
        let limit = run.task.as_ref().map_or(1, |t| t.max_concurrent_chunks);
        if !run.pending.is_empty() && inner.stats.active_workers() < limit {
            break limit;
        }
        run = wait(&inner.wake, run);
    };

    let mut batch = Vec::new();
    while inner.stats.active_workers() < limit {
        let Some(pos) = run.pending.pop_front() else {
            break;
        };
        let Some(record) = run.chunks.get_mut(pos) else {
            continue;
        };
        if record.status != ChunkStatus::Pending {
            continue;
        }
        record.status = ChunkStatus::InFlight;
        batch.push((pos, ActiveGuard::new(inner)));
    }
    Some(batch)
}

/// The job never ran its routine (or died in it): settle the chunk as failed
/// so the run can still complete.
fn abandon(inner: &Inner, generation: u64, pos: usize, reason: &str) {
    let mut run = lock(&inner.run);
    let Some(record) = run.in_flight_mut(generation, pos) else {
        return;
    };
    record.status = ChunkStatus::Failed;
    record.error = Some(reason.to_string());
    let info = record.info();
    tracing::warn!(chunk = info.chunk_index, reason, "chunk abandoned");
    inner.stats.chunk_failed();
    inner.events.publish(SchedulerEvent::ChunkFailed { info, kind: None });
}

/// Publish progress and settle the run if every chunk is terminal.
/// Returns true when the loop should exit.
fn finish_batch(inner: &Inner, generation: u64) -> bool {
    let mut run = lock(&inner.run);
    if !run.is_current(generation) {
        return true;
    }
    let total = run.chunks.len();
    inner
        .events
        .publish(SchedulerEvent::Progress(inner.stats.snapshot(total, true)));

    if !settle_if_done(inner, &mut run) {
        return false;
    }
    drop(run);
    inner.finished.notify_all();
    true
}

/// Move the run to `Completed` and announce it once, if every chunk is
/// terminal. Caller holds the run lock and notifies waiters.
pub(super) fn settle_if_done(inner: &Inner, run: &mut RunState) -> bool {
    let total = run.chunks.len();
    let failed = inner.stats.failed();
    if inner.stats.completed() + failed < total {
        return false;
    }
    run.state = SchedulerState::Completed;
    run.pending.clear();
    inner.stats.finish();
    if !run.completion_sent {
        run.completion_sent = true;
        tracing::info!(chunks = total, failed, "download completed");
        inner
            .events
            .publish(SchedulerEvent::Completed { success: failed == 0 });
    }
    true
}
