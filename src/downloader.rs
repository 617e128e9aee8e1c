//! Core synchronizer implementation
//!
//! [`CourseDownloader`] composes the state store, the diff engine, and the
//! download pipeline into one run: load the recorded inventory, diff it
//! against the remote listing the caller supplies, soft-delete what
//! vanished, download what is new or changed, and record every known
//! outcome. Fetching the remote listing, acquiring credentials, and
//! delivering notifications stay with the caller.

use crate::config::Config;
use crate::db::Database;
use crate::diff;
use crate::error::{Error, Result};
use crate::lock::LockFile;
use crate::paths;
use crate::pipeline::DownloadPipeline;
use crate::types::{Course, DownloadJob, Event, SyncReport};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Main synchronizer instance (cloneable - all fields are Arc-wrapped)
///
/// Exactly one instance may exist per storage root at a time; construction
/// takes the storage-root lock and [`shutdown`](CourseDownloader::shutdown)
/// releases it.
#[derive(Clone)]
pub struct CourseDownloader {
    /// Database instance for persistence (public for integration tests to
    /// inspect recorded state)
    pub db: Arc<Database>,
    config: Arc<Config>,
    client: reqwest::Client,
    event_tx: broadcast::Sender<Event>,
    drain: CancellationToken,
    lock: Arc<std::sync::Mutex<Option<LockFile>>>,
}

impl CourseDownloader {
    /// Create a new CourseDownloader instance
    ///
    /// Validates the configuration, takes the storage-root lock, opens the
    /// state database (fatal if it cannot be opened or migrated), and builds
    /// the shared HTTP client.
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let lock = LockFile::acquire(&config.storage_dir)?;
        let db = Database::new(&config.database_path()).await?;

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        let (event_tx, _) = broadcast::channel(256);

        tracing::info!(
            storage_dir = %config.storage_dir.display(),
            "CourseDownloader ready"
        );

        Ok(Self {
            db: Arc::new(db),
            config: Arc::new(config),
            client,
            event_tx,
            drain: CancellationToken::new(),
            lock: Arc::new(std::sync::Mutex::new(Some(lock))),
        })
    }

    /// Subscribe to sync events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Ask a running sync to drain: queued first attempts still run, but no
    /// failed transfer is retried anymore
    pub fn request_drain(&self) {
        tracing::info!("Drain requested - retries will not be re-enqueued");
        self.drain.cancel();
    }

    /// Run one sync against the remote inventory the caller materialized
    ///
    /// Per-file transfer failures never abort the run; they come back in
    /// [`SyncReport::failed`] and, because their outcome was not recorded,
    /// the same files surface as changed again on the next run. Store
    /// failures abort immediately.
    pub async fn sync(&self, remote: Vec<Course>) -> Result<SyncReport> {
        {
            let slot = self
                .lock
                .lock()
                .map_err(|_| Error::Other("lock file mutex poisoned".into()))?;
            if slot.is_none() {
                return Err(Error::ShuttingDown);
            }
        }

        let previous = self.db.load_all().await?;
        let changed = diff::diff(&previous, &remote);

        let pending: usize = changed
            .iter()
            .map(|c| c.files.iter().filter(|f| !f.deleted).count())
            .sum();
        let _ = self.event_tx.send(Event::SyncStarted {
            courses: changed.len(),
            files: pending,
        });
        tracing::info!(
            courses = changed.len(),
            files = pending,
            "Change detection complete"
        );

        // Deletions need no transfer; record them up front.
        let mut deleted = 0usize;
        let now = chrono::Utc::now().timestamp();
        for course in &changed {
            for file in course.files.iter().filter(|f| f.deleted) {
                let mut record = file.clone();
                record.time_stamp = now;
                self.db
                    .record_outcome(&record, course.id, &course.fullname)
                    .await?;
                let _ = self.event_tx.send(Event::FileDeleted {
                    course_id: course.id,
                    filename: record.content_filename.clone(),
                });
                deleted += 1;
            }
        }

        // Everything else becomes a download job.
        let jobs: Vec<DownloadJob> = changed
            .iter()
            .flat_map(|course| {
                course.files.iter().filter(|f| !f.deleted).map(|file| {
                    let destination =
                        paths::resolve(&self.config.storage_dir, &course.fullname, file);
                    DownloadJob {
                        file: file.clone(),
                        course_id: course.id,
                        course_fullname: course.fullname.clone(),
                        destination,
                        token: self.config.token.clone(),
                        attempts: 0,
                    }
                })
            })
            .collect();

        let pipeline = DownloadPipeline::new(
            self.db.clone(),
            self.client.clone(),
            self.config.retry.clone(),
            self.event_tx.clone(),
            self.drain.clone(),
        );
        let report = pipeline
            .run(jobs, self.config.max_concurrent_downloads)
            .await?;

        let _ = self.event_tx.send(Event::SyncCompleted {
            downloaded: report.succeeded.len(),
            failed: report.failed.len(),
            deleted,
        });

        Ok(SyncReport {
            downloaded: report.succeeded,
            failed: report.failed,
            deleted,
        })
    }

    /// Records whose change was not yet covered by a notification
    ///
    /// Formatting and delivering the notification is the caller's job; call
    /// [`mark_notified`](CourseDownloader::mark_notified) with the same
    /// records once delivery succeeded.
    pub async fn unnotified(&self) -> Result<Vec<Course>> {
        self.db.load_unnotified().await
    }

    /// Flag the given records as covered by a dispatched notification
    pub async fn mark_notified(&self, courses: &[Course]) -> Result<()> {
        self.db.mark_notified(courses).await
    }

    /// Release the storage-root lock and close the database
    pub async fn shutdown(&self) -> Result<()> {
        let held = {
            let mut slot = self
                .lock
                .lock()
                .map_err(|_| Error::Other("lock file mutex poisoned".into()))?;
            slot.take()
        };
        if let Some(lock) = held {
            lock.release()?;
        }
        self.db.close().await;
        tracing::info!("CourseDownloader shut down cleanly");
        Ok(())
    }
}
