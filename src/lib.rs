//! # course-dl
//!
//! Change-tracking download manager library for online course platforms.
//!
//! course-dl keeps a durable record of the file inventory of your courses,
//! computes a precise diff (added / modified / deleted) against that record
//! on every run, and drives a concurrent, fault-tolerant download of the
//! changed files to disk. Talking to the platform's API is deliberately out
//! of scope: you fetch the current `course -> files` listing however your
//! platform exposes it and hand it over; course-dl does the rest.
//!
//! ## Design Philosophy
//!
//! - **State first** - the diff engine and the persisted inventory are the
//!   core; downloads are derived work
//! - **Library-first** - no CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - consumers subscribe to events, no polling required
//! - **Partial failure is normal** - one dead link never aborts a run
//!
//! ## Quick Start
//!
//! ```no_run
//! use course_dl::{Config, Course, CourseDownloader};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         storage_dir: "./courses".into(),
//!         token: "your-api-token".to_string(),
//!         ..Default::default()
//!     };
//!
//!     let downloader = CourseDownloader::new(config).await?;
//!
//!     // Subscribe to events
//!     let mut events = downloader.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     // Fetch the remote inventory with your API client of choice...
//!     let remote: Vec<Course> = Vec::new();
//!     let report = downloader.sync(remote).await?;
//!     println!(
//!         "{} downloaded, {} failed, {} deleted",
//!         report.downloaded.len(),
//!         report.failed.len(),
//!         report.deleted
//!     );
//!
//!     downloader.shutdown().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Database persistence layer
pub mod db;
/// Inventory diffing (change detection)
pub mod diff;
/// Core synchronizer implementation
pub mod downloader;
/// Error types
pub mod error;
/// Storage-root process lock
pub mod lock;
/// Filesystem path mapping
pub mod paths;
/// Concurrent download pipeline
pub mod pipeline;
/// Retry classification and backoff
pub mod retry;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use config::{Config, RetryConfig};
pub use db::Database;
pub use diff::diff;
pub use downloader::CourseDownloader;
pub use error::{DatabaseError, Error, Result, TransferError};
pub use lock::LockFile;
pub use pipeline::DownloadPipeline;
pub use types::{
    ContentType, Course, DownloadJob, Event, File, FileKey, ModuleKind, PipelineReport, SyncReport,
};

/// Helper function to run a sync with graceful signal handling.
///
/// Runs `downloader.sync(remote)` while listening for a termination signal;
/// on signal the pipeline is asked to drain (queued first attempts still
/// run, retries stop), and the sync still returns its report.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use course_dl::{Config, CourseDownloader, sync_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let downloader = CourseDownloader::new(Config::default()).await?;
///     let remote = Vec::new(); // from your API client
///
///     let report = sync_with_shutdown(&downloader, remote).await?;
///     println!("{} files downloaded", report.downloaded.len());
///
///     downloader.shutdown().await?;
///     Ok(())
/// }
/// ```
pub async fn sync_with_shutdown(
    downloader: &CourseDownloader,
    remote: Vec<Course>,
) -> Result<SyncReport> {
    let watcher = {
        let downloader = downloader.clone();
        tokio::spawn(async move {
            wait_for_signal().await;
            downloader.request_drain();
        })
    };

    let report = downloader.sync(remote).await;
    watcher.abort();
    report
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
