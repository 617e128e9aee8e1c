//! Core types for course-dl

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A logical grouping of trackable files on the remote platform.
///
/// Identity is the numeric `id`; `fullname` is display-only and also used as
/// the top-level directory name for downloaded content.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Course {
    /// Stable numeric identifier assigned by the platform
    pub id: i64,
    /// Human-readable course title
    pub fullname: String,
    /// Files observed in (or recorded for) this course
    pub files: Vec<File>,
}

impl Course {
    /// Create an empty course
    pub fn new(id: i64, fullname: impl Into<String>) -> Self {
        Self {
            id,
            fullname: fullname.into(),
            files: Vec::new(),
        }
    }
}

/// Module kinds the platform exposes
///
/// Closed variant set replacing the upstream string-tag dispatch. Unknown
/// tags map to [`ModuleKind::Other`] and are treated as plain content.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleKind {
    /// Single downloadable content item
    #[default]
    Resource,
    /// Directory of content items, placed under an extra module-level path
    Folder,
    /// External link, materialized as a platform shortcut file instead of a transfer
    Url,
    /// Assignment with attached and submitted files
    Assignment,
    /// Free-form description text exposed as a content item
    Description,
    /// Any module kind the platform added after this list was written
    Other,
}

impl ModuleKind {
    /// Parse the platform's module type tag
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "resource" => ModuleKind::Resource,
            "folder" => ModuleKind::Folder,
            "url" => ModuleKind::Url,
            "assign" => ModuleKind::Assignment,
            "description" => ModuleKind::Description,
            _ => ModuleKind::Other,
        }
    }

    /// Canonical tag used for persistence
    pub fn as_tag(&self) -> &'static str {
        match self {
            ModuleKind::Resource => "resource",
            ModuleKind::Folder => "folder",
            ModuleKind::Url => "url",
            ModuleKind::Assignment => "assign",
            ModuleKind::Description => "description",
            ModuleKind::Other => "other",
        }
    }

    /// Link-type modules get a shortcut file instead of a byte transfer
    pub fn is_link(&self) -> bool {
        matches!(self, ModuleKind::Url)
    }

    /// Whether content of this module gets an extra `module_name` path level
    pub fn adds_module_dir(&self) -> bool {
        matches!(self, ModuleKind::Folder | ModuleKind::Assignment)
    }
}

/// Content categories within a module
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    /// Regular downloadable file
    #[default]
    File,
    /// Link target of a url module
    Url,
    /// Rendered module description
    Description,
    /// Student submission attached to an assignment, stored under `submissions/`
    Submission,
}

impl ContentType {
    /// Parse the platform's content type tag
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "url" => ContentType::Url,
            "description" => ContentType::Description,
            "submission" => ContentType::Submission,
            _ => ContentType::File,
        }
    }

    /// Canonical tag used for persistence
    pub fn as_tag(&self) -> &'static str {
        match self {
            ContentType::File => "file",
            ContentType::Url => "url",
            ContentType::Description => "description",
            ContentType::Submission => "submission",
        }
    }

    /// Submission content lives under the fixed `submissions/` sub-path
    pub fn is_submission(&self) -> bool {
        matches!(self, ContentType::Submission)
    }
}

/// Identity key of a [`File`]
///
/// The attribute tuple that decides whether two observations refer to the
/// same file. Course-scoped: the same key may repeat across courses. Content
/// attributes (url, size, timestamp) are deliberately excluded: they drive
/// change detection, not identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FileKey<'a> {
    /// Module the file belongs to
    pub module_id: i64,
    /// Section the module sits in
    pub section_name: &'a str,
    /// Relative directory within the module ("/" for top level)
    pub content_filepath: &'a str,
    /// File name as reported by the platform
    pub content_filename: &'a str,
}

/// The atomic trackable unit: one content item with stable identity across runs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct File {
    /// Module the file belongs to
    pub module_id: i64,
    /// Section the module sits in (identity and display)
    pub section_name: String,
    /// Module title (display only, never part of identity or change detection)
    pub module_name: String,
    /// Kind of the owning module
    pub module_kind: ModuleKind,
    /// Relative directory within the module ("/" for top level)
    pub content_filepath: String,
    /// File name as reported by the platform
    pub content_filename: String,
    /// Download URL (change-detection attribute)
    pub content_fileurl: String,
    /// Size in bytes as reported by the platform (change-detection attribute)
    pub content_filesize: i64,
    /// Remote modification time, Unix seconds (change-detection attribute)
    pub content_timemodified: i64,
    /// Content category
    pub content_type: ContentType,
    /// Set by the diff engine when content attributes changed for a retained key
    #[serde(default)]
    pub modified: bool,
    /// Set by the diff engine when the file vanished from the remote inventory
    #[serde(default)]
    pub deleted: bool,
    /// Flipped to true only after a successful notification dispatch
    #[serde(default)]
    pub notified: bool,
    /// Absolute path actually written, populated by the pipeline on success
    #[serde(default)]
    pub saved_to: Option<PathBuf>,
    /// Transfer completion time (or deletion observation time), Unix seconds
    #[serde(default)]
    pub time_stamp: i64,
}

impl File {
    /// Borrow this file's identity key
    pub fn key(&self) -> FileKey<'_> {
        FileKey {
            module_id: self.module_id,
            section_name: &self.section_name,
            content_filepath: &self.content_filepath,
            content_filename: &self.content_filename,
        }
    }

    /// Whether any change-detection attribute differs from `other`
    ///
    /// Descriptive fields (`module_name`, tags) never count: a cosmetic
    /// rename must not trigger a re-download.
    pub fn content_differs(&self, other: &File) -> bool {
        self.content_fileurl != other.content_fileurl
            || self.content_filesize != other.content_filesize
            || self.content_timemodified != other.content_timemodified
    }
}

/// One pending or in-flight transfer derived from a changed file
///
/// Ephemeral: created at pipeline start for every changed, non-deleted file
/// and discarded once it reaches a terminal state.
#[derive(Clone, Debug)]
pub struct DownloadJob {
    /// The file to transfer; `saved_to`/`time_stamp` are filled in on success
    pub file: File,
    /// Owning course id (needed to record the outcome)
    pub course_id: i64,
    /// Owning course title (needed to record the outcome)
    pub course_fullname: String,
    /// Resolved destination path, before collision suffixing
    pub destination: PathBuf,
    /// Auth token appended to the download URL
    pub token: String,
    /// Attempts performed so far
    pub attempts: u32,
}

/// Success and failure sets of one pipeline run
#[derive(Debug, Default)]
pub struct PipelineReport {
    /// Jobs whose transfer completed and whose outcome was recorded
    pub succeeded: Vec<DownloadJob>,
    /// Jobs that exhausted their attempts or failed permanently
    pub failed: Vec<DownloadJob>,
}

/// Result of one full sync run
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Jobs downloaded (or materialized as shortcuts) this run
    pub downloaded: Vec<DownloadJob>,
    /// Jobs that ended in the failure set; they will be re-detected as
    /// changed on the next run since their outcome was never recorded
    pub failed: Vec<DownloadJob>,
    /// Number of soft-delete records written this run
    pub deleted: usize,
}

/// Event emitted during a sync run
///
/// Broadcast best-effort; consumers subscribe via
/// [`CourseDownloader::subscribe`](crate::CourseDownloader::subscribe).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A sync run computed its diff and is about to start transfers
    SyncStarted {
        /// Courses with at least one change
        courses: usize,
        /// Files queued for transfer
        files: usize,
    },

    /// A worker picked up a job
    FileStarted {
        /// Owning course id
        course_id: i64,
        /// File name being transferred
        filename: String,
    },

    /// Incremental progress of an in-flight transfer
    FileProgress {
        /// Worker slot performing the transfer
        worker: usize,
        /// File name being transferred
        filename: String,
        /// Bytes written so far in this attempt
        bytes: u64,
        /// Total size if the remote reported one
        total: Option<u64>,
    },

    /// A failed attempt is being re-enqueued
    FileRetrying {
        /// File name being retried
        filename: String,
        /// Attempts performed so far
        attempt: u32,
        /// Configured attempt bound
        max_attempts: u32,
    },

    /// A job reached its success state
    FileCompleted {
        /// Owning course id
        course_id: i64,
        /// File name transferred
        filename: String,
        /// Path the file was written to
        saved_to: PathBuf,
    },

    /// A job reached its permanent-failure state
    FileFailed {
        /// Owning course id
        course_id: i64,
        /// File name that failed
        filename: String,
        /// Final error, rendered
        error: String,
    },

    /// A vanished file was soft-deleted in the store
    FileDeleted {
        /// Owning course id
        course_id: i64,
        /// File name recorded as deleted
        filename: String,
    },

    /// The sync run finished
    SyncCompleted {
        /// Jobs in the success set
        downloaded: usize,
        /// Jobs in the failure set
        failed: usize,
        /// Soft-delete records written
        deleted: usize,
    },
}
