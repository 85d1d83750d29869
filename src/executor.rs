//! Bounded pool for blocking upload jobs
//!
//! Jobs run on the blocking pool of a dedicated tokio runtime whose blocking
//! thread cap is the worker count. A semaphore bounds the jobs in flight, so
//! `submit` blocks once `workers + queue_capacity` jobs are outstanding. A
//! job's error or panic is stored, never propagated, so one broken upload
//! cannot stop its siblings. The submitting thread must not be an async
//! context; it blocks only in `submit`, [`UploadExecutor::drain`] and
//! [`UploadExecutor::shutdown`].

use crate::error::{SyncError, SyncResult};
use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, warn};

/// Pool sizing and timing
#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    /// Thread name prefix
    pub name: String,
    /// Jobs running at the same time
    pub workers: usize,
    /// Jobs that may wait before `submit` blocks
    pub queue_capacity: usize,
    /// Outstanding jobs above which `drain` polls instead of blocking
    pub drain_threshold: usize,
    /// Sleep between polls while above the threshold
    pub poll_interval: Duration,
    /// Grace period given to running jobs on shutdown
    pub shutdown_timeout: Duration,
}

impl ExecutorOptions {
    pub fn with_workers(mut self, workers: usize) -> Self {
        if workers > 0 {
            self.workers = workers;
        }
        self
    }
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            name: "Upload".to_string(),
            workers: default_workers(),
            queue_capacity: 2048,
            drain_threshold: 100,
            poll_interval: Duration::from_secs(1),
            shutdown_timeout: Duration::from_secs(10),
        }
    }
}

/// Number of CPUs, or 1 if it cannot be determined
pub fn default_workers() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// A job that returned an error or panicked
#[derive(Debug)]
pub struct JobFailure {
    pub label: String,
    pub error: SyncError,
}

struct Pending<T> {
    label: String,
    handle: JoinHandle<SyncResult<T>>,
}

/// Worker pool collecting per-job results and failures
pub struct UploadExecutor<T: Send + 'static> {
    options: ExecutorOptions,
    workers: usize,
    runtime: Option<Runtime>,
    slots: Arc<Semaphore>,
    cancelled: Arc<AtomicBool>,
    pending: Vec<Pending<T>>,
    results: Vec<T>,
    failures: Vec<JobFailure>,
}

impl<T: Send + 'static> UploadExecutor<T> {
    /// Start the runtime backing the pool
    pub fn new(options: ExecutorOptions) -> SyncResult<Self> {
        let workers = options.workers.max(1);
        let prefix = options.name.clone();
        let started = AtomicUsize::new(0);

        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(workers)
            .thread_name_fn(move || {
                format!("{} {}", prefix, started.fetch_add(1, Ordering::SeqCst) + 1)
            })
            .enable_all()
            .build()
            .map_err(|e| SyncError::io("starting upload runtime", e))?;

        debug!("Started '{}' pool with {} workers", options.name, workers);

        Ok(Self {
            slots: Arc::new(Semaphore::new(workers + options.queue_capacity)),
            options,
            workers,
            runtime: Some(runtime),
            cancelled: Arc::new(AtomicBool::new(false)),
            pending: Vec::new(),
            results: Vec::new(),
            failures: Vec::new(),
        })
    }

    pub fn worker_count(&self) -> usize {
        self.workers
    }

    /// Enqueue a job. Blocks while the queue is full.
    pub fn submit<F>(&mut self, label: impl Into<String>, job: F) -> SyncResult<()>
    where
        F: FnOnce() -> SyncResult<T> + Send + 'static,
    {
        let runtime = self.runtime.as_ref().ok_or(SyncError::ExecutorShutDown)?;

        let slot = runtime
            .block_on(Arc::clone(&self.slots).acquire_owned())
            .map_err(|_| SyncError::ExecutorShutDown)?;
        let cancelled = Arc::clone(&self.cancelled);

        let handle = runtime.spawn_blocking(move || {
            let _slot = slot;
            if cancelled.load(Ordering::SeqCst) {
                return Err(SyncError::ExecutorShutDown);
            }
            job()
        });

        self.pending.push(Pending {
            label: label.into(),
            handle,
        });
        Ok(())
    }

    /// Block until every submitted job has completed.
    ///
    /// Polls while many jobs remain and waits on the newest outstanding job
    /// once fewer than the threshold are left.
    pub fn drain(&mut self) {
        let Some(handle) = self.handle() else {
            return;
        };

        loop {
            self.collect_finished(&handle);

            let left = self.pending.len();
            if left == 0 {
                break;
            }

            info!("{} task{} left...", left, if left == 1 { "" } else { "s" });
            if left < self.options.drain_threshold {
                if let Some(last) = self.pending.pop() {
                    let outcome = handle.block_on(last.handle);
                    self.record(last.label, outcome);
                }
            } else {
                thread::sleep(self.options.poll_interval);
            }
        }
    }

    /// Jobs submitted but not yet completed
    pub fn outstanding(&mut self) -> usize {
        if let Some(handle) = self.handle() {
            self.collect_finished(&handle);
        }
        self.pending.len()
    }

    /// Values returned by successful jobs, in collection order
    pub fn take_results(&mut self) -> Vec<T> {
        std::mem::take(&mut self.results)
    }

    /// Failures recorded so far, in collection order
    pub fn take_failures(&mut self) -> Vec<JobFailure> {
        std::mem::take(&mut self.failures)
    }

    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Stop accepting jobs, give running jobs `shutdown_timeout` to finish,
    /// then abandon them. Jobs still queued after the timeout never start.
    ///
    /// Returns true if every job finished within the timeout.
    pub fn shutdown(&mut self) -> bool {
        let Some(runtime) = self.runtime.take() else {
            return true;
        };

        self.slots.close();
        runtime.shutdown_timeout(self.options.shutdown_timeout);

        let busy = self
            .pending
            .iter()
            .filter(|pending| !pending.handle.is_finished())
            .count();
        self.pending.clear();

        if busy == 0 {
            debug!("'{}' pool stopped", self.options.name);
            return true;
        }

        self.cancelled.store(true, Ordering::SeqCst);
        warn!(
            "{} '{}' job(s) still outstanding after {:?}, abandoning them",
            busy, self.options.name, self.options.shutdown_timeout
        );
        false
    }

    fn handle(&self) -> Option<Handle> {
        self.runtime.as_ref().map(|runtime| runtime.handle().clone())
    }

    fn collect_finished(&mut self, handle: &Handle) {
        let (finished, running): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|pending| pending.handle.is_finished());
        self.pending = running;

        for done in finished {
            let outcome = handle.block_on(done.handle);
            self.record(done.label, outcome);
        }
    }

    fn record(&mut self, label: String, outcome: Result<SyncResult<T>, JoinError>) {
        let error = match outcome {
            Ok(Ok(value)) => {
                self.results.push(value);
                return;
            }
            Ok(Err(error)) => error,
            Err(join) if join.is_panic() => {
                SyncError::JobPanicked(panic_message(join.into_panic().as_ref()))
            }
            Err(join) => SyncError::Internal(format!("job was cancelled: {}", join)),
        };
        warn!("Job '{}' failed: {}", label, error);
        self.failures.push(JobFailure { label, error });
    }
}

impl<T: Send + 'static> Drop for UploadExecutor<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
