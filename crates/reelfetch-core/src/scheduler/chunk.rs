//! Worker-side routine for one chunk attempt.

use std::thread;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use super::event::SchedulerEvent;
use super::state::ChunkStatus;
use super::Inner;
use crate::cache::ChunkMeta;
use crate::retry::{classify, RetryDecision, RetryPolicy};
use crate::sync::lock;
use crate::transport::TransportError;

pub(super) fn run(inner: &Inner, generation: u64, pos: usize) {
    let (descriptor, task) = {
        let mut run = lock(&inner.run);
        let Some(task) = run.task.clone() else {
            return;
        };
        let Some(record) = run.in_flight_mut(generation, pos) else {
            return;
        };
        (record.descriptor.clone(), task)
    };

    let started = Instant::now();
    let result = inner.transport.fetch_range(
        &descriptor.url,
        descriptor.offset,
        descriptor.size,
        task.timeout,
    );
    let elapsed_ms = started.elapsed().as_millis() as u64;

    match result {
        Ok(payload) => {
            let meta = ChunkMeta {
                timestamp_ms: now_ms(),
                is_key_frame: descriptor.index == 0,
                reel_index: task.reel_base + descriptor.index as i64,
                ..ChunkMeta::default()
            };
            downloaded(inner, generation, pos, &payload, meta, elapsed_ms);
        }
        Err(e) => failed(inner, generation, pos, e, elapsed_ms, &task.retry_policy()),
    }
}

fn downloaded(
    inner: &Inner,
    generation: u64,
    pos: usize,
    payload: &[u8],
    meta: ChunkMeta,
    elapsed_ms: u64,
) {
    // Claim the terminal state first so a chunk is never cached twice.
    {
        let mut run = lock(&inner.run);
        let Some(record) = run.in_flight_mut(generation, pos) else {
            tracing::debug!(pos, "discarding result of inactive chunk");
            return;
        };
        record.status = ChunkStatus::Downloaded;
        record.download_time_ms = elapsed_ms;
        record.error = None;
    }

    let chunk_id = match inner.cache.add_chunk(payload, meta) {
        Ok(id) => Some(id),
        Err(e) => {
            tracing::warn!(reel = meta.reel_index, error = %e, "downloaded chunk not cached");
            None
        }
    };

    let mut run = lock(&inner.run);
    if !run.is_current(generation) {
        // Stopped (or restarted) while the payload was being cached.
        if run.generation == generation {
            if let Some(record) = run.chunks.get_mut(pos) {
                record.status = ChunkStatus::Pending;
            }
        }
        drop(run);
        if let Some(id) = chunk_id {
            inner.cache.discard(id);
        }
        tracing::debug!(pos, "discarding result of inactive chunk");
        return;
    }
    let Some(record) = run.chunks.get(pos) else {
        return;
    };
    let info = record.info();
    inner.stats.chunk_completed(payload.len() as u64, elapsed_ms);
    tracing::debug!(
        chunk = info.chunk_index,
        bytes = payload.len(),
        ms = elapsed_ms,
        attempts = info.retry_count + 1,
        "chunk downloaded"
    );
    inner
        .events
        .publish(SchedulerEvent::ChunkDownloaded { info, chunk_id });
}

fn failed(
    inner: &Inner,
    generation: u64,
    pos: usize,
    error: TransportError,
    elapsed_ms: u64,
    policy: &RetryPolicy,
) {
    let kind = classify(&error);
    let delay = {
        let mut run = lock(&inner.run);
        let Some(record) = run.in_flight_mut(generation, pos) else {
            return;
        };
        record.retry_count += 1;
        record.download_time_ms = elapsed_ms;
        record.error = Some(error.to_string());
        match policy.decide(record.retry_count) {
            RetryDecision::RetryAfter(d) => d,
            RetryDecision::NoRetry => {
                record.status = ChunkStatus::Failed;
                let info = record.info();
                tracing::warn!(
                    chunk = info.chunk_index,
                    attempts = info.retry_count,
                    ?kind,
                    %error,
                    "chunk failed permanently"
                );
                inner.stats.chunk_failed();
                inner.events.publish(SchedulerEvent::ChunkFailed {
                    info,
                    kind: Some(kind),
                });
                return;
            }
        }
    };

    thread::sleep(delay);

    let mut run = lock(&inner.run);
    let Some(record) = run.in_flight_mut(generation, pos) else {
        return;
    };
    record.status = ChunkStatus::Pending;
    let info = record.info();
    run.pending.push_back(pos);
    tracing::debug!(chunk = info.chunk_index, attempt = info.retry_count, ?kind, "chunk requeued");
    inner.events.publish(SchedulerEvent::ChunkRetry { info, kind });
    drop(run);
    inner.wake.notify_all();
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
