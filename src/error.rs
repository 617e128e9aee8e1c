//! Error types for course-dl
//!
//! This module provides the error handling surface for the library:
//! - A top-level [`Error`] for operations that must abort the run
//! - [`DatabaseError`] for state-store failures (always fatal: future diffs
//!   depend on an intact store)
//! - [`TransferError`] for per-job transfer failures, which are collected by
//!   the pipeline and reported in the sync result rather than propagated

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for course-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for course-dl
///
/// Raised for conditions that make the run as a whole unrecoverable.
/// Individual download failures never surface here; they are collected in
/// the pipeline's failure set instead.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "storage_dir")
        key: Option<String>,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error outside of an individual transfer (e.g., client setup)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Another invocation holds the storage-root lock file
    #[error("another instance appears to be running (lock file {lock_path} exists)")]
    AlreadyRunning {
        /// The lock file that blocked startup; remove it manually if the
        /// previous run crashed without cleaning up
        lock_path: PathBuf,
    },

    /// Shutdown in progress - not accepting new sync runs
    #[error("shutdown in progress: not accepting new sync runs")]
    ShuttingDown,

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),
}

/// Per-transfer errors
///
/// Produced by a single download attempt. The pipeline classifies these via
/// [`IsRetryable`](crate::retry::IsRetryable) and either re-enqueues the job
/// or moves it to the failure set; it never converts them into [`Error`].
#[derive(Debug, Error)]
pub enum TransferError {
    /// Request-level failure (connect, timeout, interrupted body stream)
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Remote answered with a non-success HTTP status
    #[error("unexpected HTTP status {code} for {url}")]
    Status {
        /// The HTTP status code returned by the remote
        code: u16,
        /// The URL that was requested
        url: String,
    },

    /// Filesystem failure while preparing or writing the destination
    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),

    /// Ran out of numeric suffixes while resolving a filename collision
    #[error("no unique filename available for {path}")]
    NoUniqueName {
        /// The contested destination path
        path: PathBuf,
    },
}
