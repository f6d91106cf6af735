//! Handler trait and per-job execution context.

use crate::error::JobError;
use crate::job::Job;
use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Context handed to a handler for one job invocation.
///
/// The cancellation token is a child of the pool-wide token: canceling the
/// pool cascades here. Handlers performing long work should poll it at
/// natural suspension points; the worker additionally bounds the whole
/// invocation with [`JobContext::timeout`].
#[derive(Debug, Clone)]
pub struct JobContext {
    cancellation: CancellationToken,

    /// Deadline the worker enforces on this invocation
    pub timeout: Duration,

    /// Index of the worker running the job
    pub worker_id: usize,
}

impl JobContext {
    pub fn new(cancellation: CancellationToken, timeout: Duration, worker_id: usize) -> Self {
        Self {
            cancellation,
            timeout,
            worker_id,
        }
    }

    /// Whether pool shutdown has been requested.
    pub fn is_canceled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Resolves when pool shutdown is requested.
    pub async fn canceled(&self) {
        self.cancellation.cancelled().await;
    }
}

/// A job handler pairs a type tag with the function that runs jobs of that
/// type.
///
/// Registered once before the pool starts; the handler map is frozen
/// afterwards. An error return hands the job back to the pool for a retry
/// decision, so handlers must only fail for outcomes that a retry could
/// change.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Type tag this handler serves
    fn job_type(&self) -> &str;

    /// Run one job to completion.
    ///
    /// On success the handler stores its outcome in `job.result`; on error
    /// the pool records the failure and may re-enqueue the job.
    async fn handle(&self, ctx: &JobContext, job: &mut Job) -> Result<(), JobError>;
}
