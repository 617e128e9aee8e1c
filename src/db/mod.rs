//! Database layer for course-dl
//!
//! Handles SQLite persistence for the tracked file inventory.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] — Database lifecycle, schema migrations
//! - [`files`] — Inventory queries and per-outcome upserts
//!
//! ## Write serialization
//!
//! The pipeline records outcomes from many worker tasks, and SQLite offers no
//! safe concurrent writers. Every mutating method takes the internal write
//! lock, so each record mutation is a serialized, atomic operation. Rows are
//! never deleted; removal is a `deleted` flag flip (soft delete), which is
//! what lets a later re-appearance be distinguished from first sight.

use crate::types::{ContentType, File, ModuleKind};
use sqlx::{FromRow, sqlite::SqlitePool};
use std::path::PathBuf;

mod files;
mod migrations;

/// Row shape of the `files` table
#[derive(Debug, Clone, FromRow)]
pub struct FileRow {
    /// Unique database ID
    pub id: i64,
    /// Owning course id
    pub course_id: i64,
    /// Owning course title
    pub course_fullname: String,
    /// Module the file belongs to
    pub module_id: i64,
    /// Section the module sits in
    pub section_name: String,
    /// Module title
    pub module_name: String,
    /// Module kind tag (see [`ModuleKind::as_tag`])
    pub module_modname: String,
    /// Relative directory within the module
    pub content_filepath: String,
    /// File name as reported by the platform
    pub content_filename: String,
    /// Download URL
    pub content_fileurl: String,
    /// Size in bytes as reported by the platform
    pub content_filesize: i64,
    /// Remote modification time, Unix seconds
    pub content_timemodified: i64,
    /// Content type tag (see [`ContentType::as_tag`])
    pub content_type: String,
    /// Modification flag from the last recorded outcome
    pub modified: bool,
    /// Soft-delete flag
    pub deleted: bool,
    /// Whether a notification covering this record was dispatched
    pub notified: bool,
    /// Absolute path the file was written to
    pub saved_to: Option<String>,
    /// Transfer completion (or deletion observation) time, Unix seconds
    pub time_stamp: i64,
}

impl From<FileRow> for File {
    fn from(row: FileRow) -> Self {
        File {
            module_id: row.module_id,
            section_name: row.section_name,
            module_name: row.module_name,
            module_kind: ModuleKind::from_tag(&row.module_modname),
            content_filepath: row.content_filepath,
            content_filename: row.content_filename,
            content_fileurl: row.content_fileurl,
            content_filesize: row.content_filesize,
            content_timemodified: row.content_timemodified,
            content_type: ContentType::from_tag(&row.content_type),
            modified: row.modified,
            deleted: row.deleted,
            notified: row.notified,
            saved_to: row.saved_to.map(PathBuf::from),
            time_stamp: row.time_stamp,
        }
    }
}

/// Database handle for course-dl
pub struct Database {
    pool: SqlitePool,
    /// Serializes the store's write path across pipeline workers
    write_lock: tokio::sync::Mutex<()>,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
