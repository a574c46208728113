//! Chunked range-download scheduler.
//!
//! A download is split into fixed-size chunks that a control thread hands to
//! the shared [`WorkerPool`] in batches of at most `max_concurrent_chunks`.
//! Each worker fetches its range through the [`TransportClient`] and, on
//! success, copies the payload into the [`ChunkCache`]. Failures are retried
//! with a flat interval until the retry budget is spent.
//!
//! Progress is observable by polling ([`ChunkScheduler::stats`],
//! [`ChunkScheduler::chunk_status`]) or by subscribing to [`SchedulerEvent`]s.

mod chunk;
mod dispatch;
mod error;
mod event;
mod state;
mod stats;
mod task;


use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tokio::sync::mpsc::UnboundedReceiver;

use crate::cache::ChunkCache;
use crate::segmenter::{plan_chunks, ChunkDescriptor};
use crate::sync::{lock, wait_timeout};
use crate::transport::TransportClient;
use crate::worker::WorkerPool;

pub use error::SchedulerError;
pub use event::{ChunkInfo, SchedulerEvent};
pub use state::{ChunkStatus, SchedulerState};
pub use stats::StatsSnapshot;
pub use task::DownloadTask;

use event::EventBus;
use state::{ChunkRecord, RunState};
use stats::DownloadStats;

struct Inner {
    workers: Arc<WorkerPool>,
    transport: Arc<dyn TransportClient>,
    cache: Arc<ChunkCache>,
    run: Mutex<RunState>,
    /// Signals the dispatcher: chunks requeued, a worker slot freed, or stop.
    wake: Condvar,
    /// Signals waiters that the run left `Running`.
    finished: Condvar,
    stats: DownloadStats,
    events: EventBus,
}

pub struct ChunkScheduler {
    inner: Arc<Inner>,
    control: Mutex<Option<JoinHandle<()>>>,
}

impl ChunkScheduler {
    pub fn new(
        workers: Arc<WorkerPool>,
        transport: Arc<dyn TransportClient>,
        cache: Arc<ChunkCache>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                workers,
                transport,
                cache,
                run: Mutex::new(RunState::new()),
                wake: Condvar::new(),
                finished: Condvar::new(),
                stats: DownloadStats::default(),
                events: EventBus::default(),
            }),
            control: Mutex::new(None),
        }
    }

    /// Plan `task` into chunks and start dispatching them.
    pub fn start(&self, task: DownloadTask) -> Result<(), SchedulerError> {
        let mut control = lock(&self.control);
        let mut run = lock(&self.inner.run);
        if run.state == SchedulerState::Running {
            return Err(SchedulerError::AlreadyRunning);
        }
        task.validate()?;

        let chunks: Vec<ChunkRecord> = plan_chunks(&task.url, task.total_size, task.chunk_size)
            .into_iter()
            .map(ChunkRecord::new)
            .collect();
        let num_chunks = chunks.len();
        run.pending = (0..num_chunks).collect::<VecDeque<_>>();
        run.chunks = chunks;
        run.generation += 1;
        run.completion_sent = false;
        run.state = SchedulerState::Running;
        let generation = run.generation;
        tracing::info!(
            url = %task.url,
            total_size = task.total_size,
            chunk_size = task.chunk_size,
            num_chunks,
            concurrency = task.max_concurrent_chunks,
            "download started"
        );
        self.inner.stats.reset(task.total_size);
        run.task = Some(Arc::new(task));
        drop(run);

        // A dispatcher from an earlier run exits on its own once it sees the
        // new generation; only reap it if it already has.
        if let Some(old) = control.take() {
            if old.is_finished() {
                let _ = old.join();
            }
        }

        let inner = Arc::clone(&self.inner);
        let spawned = thread::Builder::new()
            .name("reelfetch-dispatch".into())
            .spawn(move || dispatch::run(inner, generation));
        match spawned {
            Ok(h) => {
                *control = Some(h);
                Ok(())
            }
            Err(e) => {
                let mut run = lock(&self.inner.run);
                run.state = SchedulerState::Stopped;
                run.pending.clear();
                Err(SchedulerError::ControlThread(e.to_string()))
            }
        }
    }

    /// Stop the running download. In-flight fetches are not interrupted;
    /// their results are discarded. Returns false if nothing was running.
    ///
    /// A run whose chunks have all settled but whose dispatcher has not yet
    /// noticed is completed instead, and this returns false.
    pub fn stop(&self) -> bool {
        let mut run = lock(&self.inner.run);
        if run.state != SchedulerState::Running {
            return false;
        }
        if dispatch::settle_if_done(&self.inner, &mut run) {
            drop(run);
            self.inner.wake.notify_all();
            self.inner.finished.notify_all();
            return false;
        }
        run.pending.clear();
        run.state = SchedulerState::Stopped;
        self.inner.stats.finish();
        tracing::info!(generation = run.generation, "download stopped");
        self.inner.events.publish(SchedulerEvent::Stopped);
        drop(run);
        self.inner.wake.notify_all();
        self.inner.finished.notify_all();
        true
    }

    /// Block until the download leaves `Running` or `timeout` passes.
    pub fn wait(&self, timeout: Duration) -> SchedulerState {
        let deadline = Instant::now() + timeout;
        let mut run = lock(&self.inner.run);
        while run.state == SchedulerState::Running {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            run = wait_timeout(&self.inner.finished, run, deadline - now);
        }
        run.state
    }

    /// Add a chunk to the running download.
    pub fn add_chunk(&self, descriptor: ChunkDescriptor) -> Result<(), SchedulerError> {
        let mut run = lock(&self.inner.run);
        if run.state != SchedulerState::Running {
            return Err(SchedulerError::NotRunning);
        }
        if run.position_of(descriptor.index).is_some() {
            return Err(SchedulerError::DuplicateChunk(descriptor.index));
        }
        tracing::debug!(chunk = descriptor.index, offset = descriptor.offset, "chunk added");
        self.inner.stats.add_planned(descriptor.size);
        let pos = run.chunks.len();
        run.chunks.push(ChunkRecord::new(descriptor));
        run.pending.push_back(pos);
        drop(run);
        self.inner.wake.notify_all();
        Ok(())
    }

    pub fn state(&self) -> SchedulerState {
        lock(&self.inner.run).state
    }

    pub fn is_running(&self) -> bool {
        self.state() == SchedulerState::Running
    }

    /// Every chunk of the last run reached a terminal state
    /// (`completed + failed == chunks`). Also true for a run that was stopped
    /// after its last chunk settled.
    pub fn is_completed(&self) -> bool {
        let run = lock(&self.inner.run);
        run.task.is_some()
            && self.inner.stats.completed() + self.inner.stats.failed() == run.chunks.len()
    }

    pub fn has_errors(&self) -> bool {
        self.inner.stats.failed() > 0
    }

    pub fn stats(&self) -> StatsSnapshot {
        let run = lock(&self.inner.run);
        self.inner
            .stats
            .snapshot(run.chunks.len(), run.state == SchedulerState::Running)
    }

    /// Percent of bytes downloaded, 0.0 to 100.0.
    pub fn progress(&self) -> f64 {
        self.stats().percent()
    }

    pub fn chunk_status(&self, index: usize) -> Option<ChunkInfo> {
        let run = lock(&self.inner.run);
        let pos = run.position_of(index)?;
        Some(run.chunks[pos].info())
    }

    pub fn chunk_statuses(&self) -> Vec<ChunkInfo> {
        lock(&self.inner.run).chunks.iter().map(ChunkRecord::info).collect()
    }

    /// Receive events from now on. Works from sync code (`blocking_recv`,
    /// `try_recv`) and async code alike.
    pub fn subscribe(&self) -> UnboundedReceiver<SchedulerEvent> {
        self.inner.events.subscribe()
    }

    pub fn cache(&self) -> &Arc<ChunkCache> {
        &self.inner.cache
    }
}

impl Drop for ChunkScheduler {
    fn drop(&mut self) {
        self.stop();
        let handle = lock(&self.control).take();
        if let Some(h) = handle {
            if h.join().is_err() {
                tracing::warn!("dispatch thread panicked");
            }
        }
    }
}
