//! The worker pool: a bounded FIFO queue drained by a fixed set of workers,
//! with a single result loop that applies the retry policy.
//!
//! Submission is always non-blocking: a full queue or a stopping pool is an
//! immediate error, never a stall. Backpressure is the caller's problem to
//! surface, not the pool's to absorb.

use crate::error::{JobError, PoolError};
use crate::handler::{JobContext, JobHandler};
use crate::job::{Job, JobResult};
use chrono::Utc;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;

// ============================================================================
// Configuration
// ============================================================================

/// Pool sizing and timing knobs.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of workers; 0 resolves to the CPU count at start
    pub worker_count: usize,

    /// Bounded queue capacity
    pub queue_capacity: usize,

    /// Deadline enforced on each handler invocation
    pub job_timeout: Duration,

    /// Attempt budget applied to jobs submitted without one
    pub default_max_attempts: u32,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            worker_count: 0,
            queue_capacity: 1000,
            job_timeout: Duration::from_secs(30),
            default_max_attempts: 3,
        }
    }
}

impl PoolConfig {
    fn resolved_worker_count(&self) -> usize {
        if self.worker_count > 0 {
            self.worker_count
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        }
    }
}

/// Point-in-time pool counters for health reporting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoolStats {
    pub workers: usize,
    pub active_workers: usize,
    pub queue_depth: usize,
    pub queue_capacity: usize,
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    pub retried: u64,
}

// ============================================================================
// Internals
// ============================================================================

#[derive(Default)]
struct PoolCounters {
    active: AtomicUsize,
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    retried: AtomicU64,
}

/// A finished job and its handler verdict, sent to the result loop.
struct WorkerOutcome {
    job: Job,
    outcome: Result<(), JobError>,
}

type HandlerMap = HashMap<String, Arc<dyn JobHandler>>;
type SharedJobReceiver = Arc<tokio::sync::Mutex<mpsc::Receiver<Job>>>;

// ============================================================================
// Worker Pool
// ============================================================================

/// Fixed-size worker pool over a bounded FIFO queue.
///
/// Lifecycle: register handlers, [`WorkerPool::start`], share via `Arc`,
/// submit jobs, [`WorkerPool::stop`]. The handler map is frozen at start.
pub struct WorkerPool {
    config: PoolConfig,
    handlers: HandlerMap,
    worker_count: usize,
    job_tx: std::sync::Mutex<Option<mpsc::Sender<Job>>>,
    shutdown: CancellationToken,
    started: AtomicBool,
    stopping: Arc<AtomicBool>,
    counters: Arc<PoolCounters>,
    worker_handles: std::sync::Mutex<Vec<JoinHandle<()>>>,
    result_handle: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl WorkerPool {
    pub fn new(config: PoolConfig) -> Self {
        Self {
            config,
            handlers: HashMap::new(),
            worker_count: 0,
            job_tx: std::sync::Mutex::new(None),
            shutdown: CancellationToken::new(),
            started: AtomicBool::new(false),
            stopping: Arc::new(AtomicBool::new(false)),
            counters: Arc::new(PoolCounters::default()),
            worker_handles: std::sync::Mutex::new(Vec::new()),
            result_handle: std::sync::Mutex::new(None),
        }
    }

    /// Register a handler for its job type. Only valid before start.
    pub fn register_handler(&mut self, handler: Arc<dyn JobHandler>) -> Result<(), PoolError> {
        if self.started.load(Ordering::SeqCst) {
            return Err(PoolError::AlreadyStarted);
        }
        self.handlers.insert(handler.job_type().to_string(), handler);
        Ok(())
    }

    /// Spawn the workers and the result loop.
    pub fn start(&mut self) -> Result<(), PoolError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(PoolError::AlreadyStarted);
        }

        self.worker_count = self.config.resolved_worker_count();
        let (job_tx, job_rx) = mpsc::channel::<Job>(self.config.queue_capacity);
        let (result_tx, result_rx) = mpsc::channel::<WorkerOutcome>(self.config.queue_capacity.max(1));
        let job_rx: SharedJobReceiver = Arc::new(tokio::sync::Mutex::new(job_rx));
        let handlers = Arc::new(self.handlers.clone());

        let mut handles = Vec::with_capacity(self.worker_count);
        for worker_id in 0..self.worker_count {
            handles.push(tokio::spawn(worker_loop(
                worker_id,
                Arc::clone(&handlers),
                Arc::clone(&job_rx),
                result_tx.clone(),
                self.shutdown.clone(),
                self.config.job_timeout,
                Arc::clone(&self.counters),
            )));
        }
        drop(result_tx);

        let result_handle = tokio::spawn(result_loop(
            result_rx,
            job_tx.clone(),
            Arc::clone(&self.counters),
            Arc::clone(&self.stopping),
        ));

        *self.job_tx.lock().expect("pool sender lock poisoned") = Some(job_tx);
        *self
            .worker_handles
            .lock()
            .expect("pool handles lock poisoned") = handles;
        *self
            .result_handle
            .lock()
            .expect("pool result lock poisoned") = Some(result_handle);

        info!(
            workers = self.worker_count,
            queue_capacity = self.config.queue_capacity,
            "Worker pool started"
        );
        Ok(())
    }

    /// Enqueue a job without blocking.
    ///
    /// Fills in the id, creation time, and default attempt budget, and
    /// validates that a handler exists for the job type. Returns the job id.
    pub fn submit(&self, mut job: Job) -> Result<String, PoolError> {
        if !self.started.load(Ordering::SeqCst) {
            return Err(PoolError::NotStarted);
        }
        if self.stopping.load(Ordering::SeqCst) {
            return Err(PoolError::ShuttingDown);
        }
        if !self.handlers.contains_key(&job.job_type) {
            return Err(PoolError::HandlerNotFound {
                job_type: job.job_type.clone(),
            });
        }

        job.ensure_id();
        job.created_at = Some(Utc::now());
        if job.max_attempts == 0 {
            job.max_attempts = self.config.default_max_attempts;
        }
        let job_id = job.id.clone();

        let sender = {
            let guard = self.job_tx.lock().expect("pool sender lock poisoned");
            match guard.as_ref() {
                Some(sender) => sender.clone(),
                None => return Err(PoolError::NotStarted),
            }
        };

        match sender.try_send(job) {
            Ok(()) => {
                self.counters.submitted.fetch_add(1, Ordering::Relaxed);
                Ok(job_id)
            }
            Err(TrySendError::Full(_)) => Err(PoolError::QueueFull {
                capacity: self.config.queue_capacity,
            }),
            Err(TrySendError::Closed(_)) => Err(PoolError::ShuttingDown),
        }
    }

    /// Signal shutdown and wait for in-flight work, bounded by the job
    /// timeout plus a small grace period.
    pub async fn stop(&self) {
        if !self.started.load(Ordering::SeqCst) {
            return;
        }
        if self.stopping.swap(true, Ordering::SeqCst) {
            return;
        }

        info!("Worker pool stopping");
        self.shutdown.cancel();

        let handles = std::mem::take(
            &mut *self
                .worker_handles
                .lock()
                .expect("pool handles lock poisoned"),
        );
        let deadline = self.config.job_timeout + Duration::from_secs(1);
        if tokio::time::timeout(deadline, futures::future::join_all(handles))
            .await
            .is_err()
        {
            warn!(?deadline, "Workers did not stop within deadline; abandoning");
        }

        // Closing our sender lets the result loop drain and exit once the
        // worker clones are gone.
        self.job_tx
            .lock()
            .expect("pool sender lock poisoned")
            .take();

        let result_handle = self
            .result_handle
            .lock()
            .expect("pool result lock poisoned")
            .take();
        if let Some(handle) = result_handle {
            if tokio::time::timeout(Duration::from_secs(2), handle)
                .await
                .is_err()
            {
                warn!("Result loop did not drain within deadline; abandoning");
            }
        }

        info!("Worker pool stopped");
    }

    /// Snapshot of pool counters.
    pub fn stats(&self) -> PoolStats {
        let queue_depth = {
            let guard = self.job_tx.lock().expect("pool sender lock poisoned");
            guard
                .as_ref()
                .map(|s| s.max_capacity().saturating_sub(s.capacity()))
                .unwrap_or(0)
        };
        PoolStats {
            workers: self.worker_count,
            active_workers: self.counters.active.load(Ordering::Relaxed),
            queue_depth,
            queue_capacity: self.config.queue_capacity,
            submitted: self.counters.submitted.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            retried: self.counters.retried.load(Ordering::Relaxed),
        }
    }

    /// Whether the pool accepts submissions.
    pub fn is_running(&self) -> bool {
        self.started.load(Ordering::SeqCst) && !self.stopping.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Worker Loop
// ============================================================================

async fn worker_loop(
    worker_id: usize,
    handlers: Arc<HandlerMap>,
    job_rx: SharedJobReceiver,
    result_tx: mpsc::Sender<WorkerOutcome>,
    shutdown: CancellationToken,
    job_timeout: Duration,
    counters: Arc<PoolCounters>,
) {
    debug!(worker_id, "Worker started");
    loop {
        // Take the receiver lock only to pull the next job; it is released
        // before the handler runs.
        let next = {
            let mut rx = job_rx.lock().await;
            tokio::select! {
                _ = shutdown.cancelled() => None,
                job = rx.recv() => job,
            }
        };
        let Some(mut job) = next else {
            break;
        };

        counters.active.fetch_add(1, Ordering::SeqCst);
        job.attempts += 1;
        job.started_at = Some(Utc::now());

        let outcome = match handlers.get(&job.job_type) {
            Some(handler) => {
                run_handler(handler.as_ref(), &mut job, worker_id, job_timeout, &shutdown).await
            }
            // Submit validates handler presence; this only fires for jobs
            // injected by a misconfigured test harness.
            None => Err(JobError::new(format!(
                "no handler for job type '{}'",
                job.job_type
            ))),
        };

        job.finished_at = Some(Utc::now());
        match &outcome {
            Ok(()) => {
                if job.result.is_none() {
                    job.result = Some(JobResult::success(HashMap::new()));
                }
            }
            Err(e) => {
                job.result = Some(JobResult::failure(e.message.clone()));
            }
        }
        counters.active.fetch_sub(1, Ordering::SeqCst);

        if result_tx.send(WorkerOutcome { job, outcome }).await.is_err() {
            break;
        }
    }
    debug!(worker_id, "Worker exiting");
}

async fn run_handler(
    handler: &dyn JobHandler,
    job: &mut Job,
    worker_id: usize,
    job_timeout: Duration,
    shutdown: &CancellationToken,
) -> Result<(), JobError> {
    let ctx = JobContext::new(shutdown.child_token(), job_timeout, worker_id);
    let invocation = AssertUnwindSafe(handler.handle(&ctx, job)).catch_unwind();

    match tokio::time::timeout(job_timeout, invocation).await {
        Err(_) => Err(JobError::timeout(job_timeout)),
        Ok(Err(panic)) => {
            let detail = panic_detail(panic.as_ref());
            error!(worker_id, detail = %detail, "Recovered handler panic");
            Err(JobError::panicked(&detail))
        }
        Ok(Ok(result)) => result,
    }
}

fn panic_detail(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

// ============================================================================
// Result Loop
// ============================================================================

async fn result_loop(
    mut result_rx: mpsc::Receiver<WorkerOutcome>,
    job_tx: mpsc::Sender<Job>,
    counters: Arc<PoolCounters>,
    stopping: Arc<AtomicBool>,
) {
    while let Some(WorkerOutcome { mut job, outcome }) = result_rx.recv().await {
        match outcome {
            Ok(()) => {
                counters.completed.fetch_add(1, Ordering::Relaxed);
                debug!(job_id = %job.id, attempts = job.attempts, "Job completed");
            }
            Err(e) => {
                if job.can_retry() && !stopping.load(Ordering::SeqCst) {
                    job.reset_for_retry();
                    let job_id = job.id.clone();
                    let attempts = job.attempts;
                    match job_tx.try_send(job) {
                        Ok(()) => {
                            counters.retried.fetch_add(1, Ordering::Relaxed);
                            warn!(
                                job_id = %job_id,
                                attempts,
                                error = %e,
                                "Job failed; re-enqueued for retry"
                            );
                        }
                        // A re-enqueue that would block falls through to
                        // permanent failure.
                        Err(TrySendError::Full(dropped)) | Err(TrySendError::Closed(dropped)) => {
                            counters.failed.fetch_add(1, Ordering::Relaxed);
                            error!(
                                job_id = %dropped.id,
                                attempts = dropped.attempts,
                                error = %e,
                                "Job failed permanently; retry queue unavailable"
                            );
                        }
                    }
                } else {
                    counters.failed.fetch_add(1, Ordering::Relaxed);
                    error!(
                        job_id = %job.id,
                        attempts = job.attempts,
                        error = %e,
                        "Job failed permanently"
                    );
                }
            }
        }
    }
    debug!("Result loop drained");
}
