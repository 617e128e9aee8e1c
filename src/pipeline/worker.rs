//! Per-job state machine and retry handling
//!
//! Each worker loops over the shared queue: dequeue, attempt, and either
//! record a success, schedule a retry, or report a permanent failure. A job
//! re-enqueued after a failed attempt may be served by any worker, including
//! the one that failed it. There is no affinity and no ordering across jobs.

use crate::config::RetryConfig;
use crate::db::Database;
use crate::error::{Result, TransferError};
use crate::retry::{IsRetryable, backoff_delay};
use crate::types::{DownloadJob, Event};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

use super::{PipelineState, shortcut, transfer};

/// Numeric-suffix candidates tried before giving up on a collision
const MAX_SUFFIX_ATTEMPTS: u32 = 9999;

/// Terminal result of one job, reported through the outcome channel
#[derive(Debug)]
pub(crate) enum JobOutcome {
    /// Transfer finished and the outcome was recorded
    Succeeded(DownloadJob),
    /// Attempts exhausted, error permanent, or retry abandoned on drain
    Failed(DownloadJob),
}

/// Everything one worker task needs, cloned per slot
pub(crate) struct WorkerContext {
    pub slot: usize,
    pub state: Arc<PipelineState>,
    pub db: Arc<Database>,
    pub client: reqwest::Client,
    pub retry: RetryConfig,
    pub event_tx: broadcast::Sender<Event>,
    pub outcome_tx: mpsc::UnboundedSender<JobOutcome>,
}

/// Worker loop: drain the shared queue until every job is terminal
pub(crate) async fn run(ctx: WorkerContext) -> Result<()> {
    loop {
        // A store failure in any worker aborts the run; wind down quietly.
        if ctx.state.fatal.load(Ordering::Acquire) {
            return Ok(());
        }

        let job = ctx.state.queue.lock().await.pop_front();
        let Some(job) = job else {
            if ctx.state.outstanding.load(Ordering::Acquire) == 0 {
                return Ok(());
            }
            // Queue is empty but jobs are still in flight or awaiting their
            // backoff. Park until something lands or a short tick passes.
            tokio::select! {
                _ = ctx.state.notify.notified() => {}
                _ = tokio::time::sleep(Duration::from_millis(50)) => {}
            }
            continue;
        };

        process(&ctx, job).await?;
    }
}

/// Run one attempt for a dequeued job and route its outcome
async fn process(ctx: &WorkerContext, mut job: DownloadJob) -> Result<()> {
    let _ = ctx.event_tx.send(Event::FileStarted {
        course_id: job.course_id,
        filename: job.file.content_filename.clone(),
    });

    match attempt(ctx, &job).await {
        Ok(saved_to) => {
            job.file.saved_to = Some(saved_to.clone());
            job.file.time_stamp = chrono::Utc::now().timestamp();

            if let Err(e) = ctx
                .db
                .record_outcome(&job.file, job.course_id, &job.course_fullname)
                .await
            {
                // The store is the source of truth for future diffs; a write
                // failure must abort the whole run, not just this job.
                ctx.state.fatal.store(true, Ordering::Release);
                ctx.state.notify.notify_waiters();
                return Err(e);
            }

            tracing::info!(
                file = %job.file.content_filename,
                path = %saved_to.display(),
                "Download complete"
            );
            let _ = ctx.event_tx.send(Event::FileCompleted {
                course_id: job.course_id,
                filename: job.file.content_filename.clone(),
                saved_to,
            });
            let _ = ctx.outcome_tx.send(JobOutcome::Succeeded(job));
            ctx.state.finish_one();
        }
        Err(err) => {
            job.attempts += 1;
            let retry_allowed = err.is_retryable()
                && job.attempts < ctx.retry.max_attempts
                && !ctx.state.drain.is_cancelled();

            if retry_allowed {
                tracing::warn!(
                    error = %err,
                    file = %job.file.content_filename,
                    attempt = job.attempts,
                    max_attempts = ctx.retry.max_attempts,
                    "Transfer failed, scheduling retry"
                );
                let _ = ctx.event_tx.send(Event::FileRetrying {
                    filename: job.file.content_filename.clone(),
                    attempt: job.attempts,
                    max_attempts: ctx.retry.max_attempts,
                });
                schedule_retry(ctx, job);
            } else {
                tracing::error!(
                    error = %err,
                    file = %job.file.content_filename,
                    attempts = job.attempts,
                    "Transfer failed permanently"
                );
                let _ = ctx.event_tx.send(Event::FileFailed {
                    course_id: job.course_id,
                    filename: job.file.content_filename.clone(),
                    error: err.to_string(),
                });
                let _ = ctx.outcome_tx.send(JobOutcome::Failed(job));
                ctx.state.finish_one();
            }
        }
    }

    Ok(())
}

/// Put a failed job back on the queue after its backoff delay
///
/// The wait runs in its own task so the worker slot stays free for other
/// jobs. A drain request during the wait abandons the retry and reports the
/// job failed.
fn schedule_retry(ctx: &WorkerContext, job: DownloadJob) {
    let delay = backoff_delay(&ctx.retry, job.attempts);
    let state = ctx.state.clone();
    let outcome_tx = ctx.outcome_tx.clone();
    let event_tx = ctx.event_tx.clone();

    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(delay) => {
                state.queue.lock().await.push_back(job);
                state.notify.notify_waiters();
            }
            _ = state.drain.cancelled() => {
                let _ = event_tx.send(Event::FileFailed {
                    course_id: job.course_id,
                    filename: job.file.content_filename.clone(),
                    error: "drain requested before retry".into(),
                });
                let _ = outcome_tx.send(JobOutcome::Failed(job));
                state.finish_one();
            }
        }
    });
}

/// One transfer attempt: returns the path actually written on success
async fn attempt(ctx: &WorkerContext, job: &DownloadJob) -> std::result::Result<PathBuf, TransferError> {
    let dir = job.destination.parent().ok_or_else(|| {
        TransferError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("destination {} has no parent", job.destination.display()),
        ))
    })?;

    // Idempotent and safe under races: several workers may create the same
    // course directory at once.
    tokio::fs::create_dir_all(dir).await?;

    if job.file.module_kind.is_link() {
        // Shortcut path: synthesize a descriptor file, no byte transfer.
        let desired = dir.join(shortcut::shortcut_file_name(&job.file.content_filename));
        let dest = {
            let _guard = ctx.state.fs_lock.lock().await;
            reserve_destination(&desired)?
        };
        let body = shortcut::shortcut_contents(
            &job.file.content_filename,
            &job.file.content_fileurl,
        );
        if let Err(e) = tokio::fs::write(&dest, body).await {
            let _ = tokio::fs::remove_file(&dest).await;
            return Err(e.into());
        }
        return Ok(dest);
    }

    // Content path: reserve a collision-free name, then stream into it.
    let dest = {
        let _guard = ctx.state.fs_lock.lock().await;
        reserve_destination(&job.destination)?
    };

    match transfer::stream_to_file(
        &ctx.client,
        job,
        &dest,
        &ctx.state.progress,
        ctx.slot,
        &ctx.event_tx,
    )
    .await
    {
        Ok(_bytes) => Ok(dest),
        Err(failure) => {
            if failure.bytes_written == 0 {
                // Nothing was streamed; drop the empty placeholder so the
                // name frees up for the retry.
                let _ = tokio::fs::remove_file(&dest).await;
            }
            // Partial files stay on disk, but their bytes leave the
            // aggregate progress counters.
            ctx.state.progress.rollback(ctx.slot, failure.bytes_written);
            Err(failure.error)
        }
    }
}

/// Atomically claim a collision-free destination
///
/// Tries the desired name first, then ` (1)`, ` (2)`, ... suffixes before
/// the extension. Creation uses `create_new`, so the claimed placeholder is
/// visible to every other worker the moment this returns. Must be called
/// with the pipeline's filesystem lock held so that check and create stay
/// one step.
fn reserve_destination(desired: &Path) -> std::result::Result<PathBuf, TransferError> {
    for attempt in 0..=MAX_SUFFIX_ATTEMPTS {
        let candidate = if attempt == 0 {
            desired.to_path_buf()
        } else {
            suffixed(desired, attempt)
        };

        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
        {
            Ok(_) => return Ok(candidate),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e.into()),
        }
    }

    Err(TransferError::NoUniqueName {
        path: desired.to_path_buf(),
    })
}

/// `notes.pdf` -> `notes (n).pdf`; `README` -> `README (n)`
fn suffixed(path: &Path, n: u32) -> PathBuf {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("download");
    let name = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{stem} ({n}).{ext}"),
        None => format!("{stem} ({n})"),
    };
    match path.parent() {
        Some(parent) => parent.join(name),
        None => PathBuf::from(name),
    }
}
