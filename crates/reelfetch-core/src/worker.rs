//! Fixed-size worker pool draining one FIFO job queue.
//!
//! Jobs are dispatched strictly in submission order; completion order is up to
//! the jobs. Each submission returns a [`TaskHandle`] for its result.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::sync::{lock, wait};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Returned by [`WorkerPool::submit`] once the pool has been shut down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("worker pool is stopped")]
pub struct PoolStopped;

/// The task never produced a result: discarded at shutdown, or it panicked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("task was dropped before producing a result")]
pub struct TaskLost;

struct Queue {
    jobs: VecDeque<Job>,
    stopped: bool,
}

struct Shared {
    queue: Mutex<Queue>,
    ready: Condvar,
    active: AtomicUsize,
}

pub struct WorkerPool {
    shared: Arc<Shared>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    threads: usize,
}

/// Result slot of one submitted task.
pub struct TaskHandle<T> {
    rx: Receiver<T>,
}

impl<T> TaskHandle<T> {
    /// Block until the task finishes.
    pub fn wait(self) -> Result<T, TaskLost> {
        self.rx.recv().map_err(|_| TaskLost)
    }

    /// `None` while the task is still queued or running.
    /// After a value has been taken, further calls report `TaskLost`.
    pub fn try_wait(&self) -> Option<Result<T, TaskLost>> {
        match self.rx.try_recv() {
            Ok(v) => Some(Ok(v)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(TaskLost)),
        }
    }

    /// Like [`try_wait`](Self::try_wait) but waits up to `timeout`.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<T, TaskLost>> {
        match self.rx.recv_timeout(timeout) {
            Ok(v) => Some(Ok(v)),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Err(TaskLost)),
        }
    }
}

impl WorkerPool {
    /// Spawn `threads` workers (at least one).
    pub fn new(threads: usize) -> std::io::Result<Self> {
        let threads = threads.max(1);
        let shared = Arc::new(Shared {
            queue: Mutex::new(Queue {
                jobs: VecDeque::new(),
                stopped: false,
            }),
            ready: Condvar::new(),
            active: AtomicUsize::new(0),
        });
        let pool = Self {
            shared,
            handles: Mutex::new(Vec::with_capacity(threads)),
            threads,
        };
        for i in 0..threads {
            let shared = Arc::clone(&pool.shared);
            let spawned = thread::Builder::new()
                .name(format!("reelfetch-worker-{i}"))
                .spawn(move || worker_loop(&shared));
            match spawned {
                Ok(h) => lock(&pool.handles).push(h),
                Err(e) => {
                    pool.shutdown();
                    return Err(e);
                }
            }
        }
        tracing::debug!(threads, "worker pool started");
        Ok(pool)
    }

    /// Queue `f` for execution.
    pub fn submit<F, T>(&self, f: F) -> Result<TaskHandle<T>, PoolStopped>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = mpsc::sync_channel(1);
        let job: Job = Box::new(move || {
            // Receiver may be gone; the result is then simply dropped.
            let _ = tx.send(f());
        });
        {
            let mut q = lock(&self.shared.queue);
            if q.stopped {
                return Err(PoolStopped);
            }
            q.jobs.push_back(job);
        }
        self.shared.ready.notify_one();
        Ok(TaskHandle { rx })
    }

    /// Stop accepting work, discard queued jobs and join the workers once
    /// their current job returns. Safe to call more than once.
    pub fn shutdown(&self) {
        let discarded = {
            let mut q = lock(&self.shared.queue);
            q.stopped = true;
            std::mem::take(&mut q.jobs)
        };
        if !discarded.is_empty() {
            tracing::debug!(count = discarded.len(), "discarding queued jobs at shutdown");
        }
        // Dropped outside the queue lock: job captures may run arbitrary Drop code.
        drop(discarded);
        self.shared.ready.notify_all();

        let handles = std::mem::take(&mut *lock(&self.handles));
        let me = thread::current().id();
        for h in handles {
            if h.thread().id() == me {
                continue;
            }
            if h.join().is_err() {
                tracing::warn!("worker thread exited abnormally");
            }
        }
    }

    pub fn is_stopped(&self) -> bool {
        lock(&self.shared.queue).stopped
    }

    /// Jobs currently executing.
    pub fn active_count(&self) -> usize {
        self.shared.active.load(Ordering::Acquire)
    }

    /// Jobs waiting for a worker.
    pub fn queue_len(&self) -> usize {
        lock(&self.shared.queue).jobs.len()
    }

    pub fn thread_count(&self) -> usize {
        self.threads
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(shared: &Shared) {
    loop {
        let job = {
            let mut q = lock(&shared.queue);
            loop {
                if let Some(job) = q.jobs.pop_front() {
                    break job;
                }
                if q.stopped {
                    return;
                }
                q = wait(&shared.ready, q);
            }
        };
        shared.active.fetch_add(1, Ordering::AcqRel);
        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
            tracing::warn!("worker job panicked");
        }
        shared.active.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;
    use std::time::Instant;

    #[test]
    fn runs_tasks_and_returns_results() {
        let pool = WorkerPool::new(4).unwrap();
        assert_eq!(pool.thread_count(), 4);
        let handles: Vec<_> = (0..32u64).map(|i| pool.submit(move || i * i).unwrap()).collect();
        let sum: u64 = handles.into_iter().map(|h| h.wait().unwrap()).sum();
        assert_eq!(sum, (0..32u64).map(|i| i * i).sum::<u64>());
    }

    #[test]
    fn single_worker_dispatches_in_fifo_order() {
        let pool = WorkerPool::new(1).unwrap();
        let order = Arc::new(Mutex::new(Vec::new()));
        let handles: Vec<_> = (0..10)
            .map(|i| {
                let order = Arc::clone(&order);
                pool.submit(move || order.lock().unwrap().push(i)).unwrap()
            })
            .collect();
        for h in handles {
            h.wait().unwrap();
        }
        assert_eq!(*order.lock().unwrap(), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn submit_after_shutdown_fails() {
        let pool = WorkerPool::new(2).unwrap();
        pool.shutdown();
        assert!(pool.is_stopped());
        assert_eq!(pool.submit(|| 1).err(), Some(PoolStopped));
        // Idempotent.
        pool.shutdown();
    }

    #[test]
    fn shutdown_discards_queued_tasks() {
        let pool = Arc::new(WorkerPool::new(1).unwrap());
        let (gate_tx, gate_rx) = channel::<()>();
        let (started_tx, started_rx) = channel::<()>();
        let running = pool
            .submit(move || {
                started_tx.send(()).unwrap();
                gate_rx.recv().unwrap();
                "first"
            })
            .unwrap();
        started_rx.recv().unwrap();
        let queued: Vec<_> = (0..3).map(|i| pool.submit(move || i).unwrap()).collect();
        assert_eq!(pool.queue_len(), 3);
        assert_eq!(pool.active_count(), 1);

        let closer = {
            let pool = Arc::clone(&pool);
            thread::spawn(move || pool.shutdown())
        };
        let deadline = Instant::now() + Duration::from_secs(5);
        while pool.queue_len() > 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        gate_tx.send(()).unwrap();
        closer.join().unwrap();

        assert_eq!(running.wait(), Ok("first"));
        for h in queued {
            assert_eq!(h.wait(), Err(TaskLost));
        }
    }

    #[test]
    fn panicking_task_reports_lost_and_pool_survives() {
        let pool = WorkerPool::new(1).unwrap();
        let bad = pool.submit(|| -> u32 { panic!("boom") }).unwrap();
        assert_eq!(bad.wait(), Err(TaskLost));
        let good = pool.submit(|| 7u32).unwrap();
        assert_eq!(good.wait(), Ok(7));
    }

    #[test]
    fn try_wait_and_wait_timeout() {
        let pool = WorkerPool::new(1).unwrap();
        let (gate_tx, gate_rx) = channel::<()>();
        let h = pool.submit(move || gate_rx.recv().map(|_| 5).unwrap_or(0)).unwrap();
        assert!(h.try_wait().is_none());
        assert!(h.wait_timeout(Duration::from_millis(20)).is_none());
        gate_tx.send(()).unwrap();
        assert_eq!(h.wait_timeout(Duration::from_secs(5)), Some(Ok(5)));
    }
}
