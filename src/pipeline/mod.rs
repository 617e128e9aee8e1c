//! Concurrent download pipeline
//!
//! A bounded pool of worker tasks drains one shared FIFO queue of
//! [`DownloadJob`]s. Workers retry transient failures by re-enqueueing the
//! job (after a backoff), isolate permanent failures into the failure set,
//! and record each success in the state store before reporting it. The run
//! returns only once every job has reached a terminal state.
//!
//! Organized by domain:
//! - [`worker`] - per-job state machine and retry handling
//! - [`transfer`] - streaming HTTP transfer to disk
//! - [`shortcut`] - platform shortcut synthesis for link modules
//! - [`progress`] - per-worker byte accounting

mod progress;
mod shortcut;
mod worker;

pub(crate) mod transfer;

pub use progress::ProgressTracker;

use crate::config::RetryConfig;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::types::{DownloadJob, Event, PipelineReport};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::{Mutex, Notify, broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use worker::JobOutcome;

/// State shared by every worker of one pipeline run
pub(crate) struct PipelineState {
    /// Shared FIFO work queue; the only structure all workers mutate
    pub(crate) queue: Mutex<VecDeque<DownloadJob>>,
    /// Jobs that have not reached a terminal state yet
    pub(crate) outstanding: AtomicUsize,
    /// Wakes parked workers when a job lands on the queue or goes terminal
    pub(crate) notify: Notify,
    /// Spans the collision check and placeholder creation, which must be one
    /// step across workers
    pub(crate) fs_lock: Mutex<()>,
    /// Aggregate transfer progress, per worker slot
    pub(crate) progress: ProgressTracker,
    /// Drain hook: once cancelled, no retry is re-enqueued
    pub(crate) drain: CancellationToken,
    /// Set on a store failure; makes every worker wind down
    pub(crate) fatal: AtomicBool,
}

impl PipelineState {
    /// Mark one job terminal and wake anyone waiting on the queue
    pub(crate) fn finish_one(&self) {
        self.outstanding.fetch_sub(1, Ordering::AcqRel);
        self.notify.notify_waiters();
    }
}

/// Executes one batch of download jobs over a shared worker pool
pub struct DownloadPipeline {
    db: Arc<Database>,
    client: reqwest::Client,
    retry: RetryConfig,
    event_tx: broadcast::Sender<Event>,
    drain: CancellationToken,
}

impl DownloadPipeline {
    /// Create a pipeline bound to a store, HTTP client, and drain token
    pub fn new(
        db: Arc<Database>,
        client: reqwest::Client,
        retry: RetryConfig,
        event_tx: broadcast::Sender<Event>,
        drain: CancellationToken,
    ) -> Self {
        Self {
            db,
            client,
            retry,
            event_tx,
            drain,
        }
    }

    /// Drain the given jobs to a terminal state with `concurrency` workers
    ///
    /// Per-job failures never abort the run; they land in the report's
    /// failure set. The only fatal condition is a state-store failure, which
    /// propagates as [`Error::Database`] because every future diff depends
    /// on the store being intact.
    pub async fn run(&self, jobs: Vec<DownloadJob>, concurrency: usize) -> Result<PipelineReport> {
        if jobs.is_empty() {
            return Ok(PipelineReport::default());
        }

        let workers = concurrency.clamp(1, jobs.len());
        let job_count = jobs.len();
        tracing::info!(jobs = job_count, workers, "Starting download pipeline");

        let state = Arc::new(PipelineState {
            queue: Mutex::new(VecDeque::from(jobs)),
            outstanding: AtomicUsize::new(job_count),
            notify: Notify::new(),
            fs_lock: Mutex::new(()),
            progress: ProgressTracker::new(workers),
            drain: self.drain.clone(),
            fatal: AtomicBool::new(false),
        });

        // Terminal outcomes flow through a channel instead of a shared
        // locked list; the receiver is drained once the pool has joined.
        let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel::<JobOutcome>();

        let mut pool = tokio::task::JoinSet::new();
        for slot in 0..workers {
            let ctx = worker::WorkerContext {
                slot,
                state: state.clone(),
                db: self.db.clone(),
                client: self.client.clone(),
                retry: self.retry.clone(),
                event_tx: self.event_tx.clone(),
                outcome_tx: outcome_tx.clone(),
            };
            pool.spawn(worker::run(ctx));
        }
        drop(outcome_tx);

        let mut first_error: Option<Error> = None;
        while let Some(joined) = pool.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
                Err(join_error) => {
                    if first_error.is_none() {
                        first_error = Some(Error::Other(format!(
                            "pipeline worker panicked: {join_error}"
                        )));
                    }
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        let mut report = PipelineReport::default();
        while let Some(outcome) = outcome_rx.recv().await {
            match outcome {
                JobOutcome::Succeeded(job) => report.succeeded.push(job),
                JobOutcome::Failed(job) => report.failed.push(job),
            }
        }

        tracing::info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            bytes = state.progress.total_bytes(),
            "Download pipeline finished"
        );

        Ok(report)
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
