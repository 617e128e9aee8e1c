//! Inventory queries and per-outcome upserts.

use crate::error::DatabaseError;
use crate::types::{Course, File};
use crate::{Error, Result};

use super::{Database, FileRow};

/// Columns selected for every inventory query, in [`FileRow`] order
const FILE_COLUMNS: &str = r#"
    id, course_id, course_fullname, module_id, section_name, module_name,
    module_modname, content_filepath, content_filename, content_fileurl,
    content_filesize, content_timemodified, content_type,
    modified, deleted, notified, saved_to, time_stamp
"#;

impl Database {
    /// Reconstruct the full non-deleted inventory, grouped by course
    ///
    /// This is the `previous` input of the diff engine. Soft-deleted rows are
    /// excluded on purpose: a file that re-appears after deletion must be
    /// seen as newly added, not as a modification of its dead record.
    pub async fn load_all(&self) -> Result<Vec<Course>> {
        let rows = sqlx::query_as::<_, FileRow>(&format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE deleted = 0 ORDER BY course_id, id"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to load inventory: {}",
                e
            )))
        })?;

        Ok(group_by_course(rows))
    }

    /// Reconstruct the full inventory including soft-deleted rows
    ///
    /// Deleted records are retained forever; this view exposes them for
    /// inspection and tests. The diff engine never consumes it.
    pub async fn load_all_including_deleted(&self) -> Result<Vec<Course>> {
        let rows = sqlx::query_as::<_, FileRow>(&format!(
            "SELECT {FILE_COLUMNS} FROM files ORDER BY course_id, id"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to load inventory with deleted rows: {}",
                e
            )))
        })?;

        Ok(group_by_course(rows))
    }

    /// Reconstruct only records whose change was not yet notified
    ///
    /// Drives notification dispatch; the consumer flips the flag back with
    /// [`mark_notified`](Database::mark_notified) once delivery succeeded.
    pub async fn load_unnotified(&self) -> Result<Vec<Course>> {
        let rows = sqlx::query_as::<_, FileRow>(&format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE notified = 0 ORDER BY course_id, id"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to load unnotified records: {}",
                e
            )))
        })?;

        Ok(group_by_course(rows))
    }

    /// Record the terminal outcome for one file
    ///
    /// Behavior branches on the file's flags:
    /// - `deleted = true` — flip the live identity-matched row to deleted,
    ///   stamp the observation time, reset `notified`
    /// - `modified = true` — overwrite content and path fields on the live
    ///   identity-matched row, reset `notified`
    /// - otherwise — insert a fresh row (`notified = 0`)
    ///
    /// Each branch is a single statement, so the mutation is atomic per
    /// record, and re-applying the same modified/deleted outcome is a no-op.
    /// Rows are never removed.
    pub async fn record_outcome(
        &self,
        file: &File,
        course_id: i64,
        course_fullname: &str,
    ) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        if file.deleted {
            sqlx::query(
                r#"
                UPDATE files
                SET deleted = 1, time_stamp = ?, notified = 0
                WHERE course_id = ? AND module_id = ? AND section_name = ?
                  AND content_filepath = ? AND content_filename = ?
                  AND deleted = 0
                "#,
            )
            .bind(file.time_stamp)
            .bind(course_id)
            .bind(file.module_id)
            .bind(&file.section_name)
            .bind(&file.content_filepath)
            .bind(&file.content_filename)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to record deletion: {}",
                    e
                )))
            })?;
        } else if file.modified {
            sqlx::query(
                r#"
                UPDATE files
                SET content_fileurl = ?, content_filesize = ?, content_timemodified = ?,
                    module_name = ?, module_modname = ?, content_type = ?,
                    modified = 1, notified = 0, saved_to = ?, time_stamp = ?
                WHERE course_id = ? AND module_id = ? AND section_name = ?
                  AND content_filepath = ? AND content_filename = ?
                  AND deleted = 0
                "#,
            )
            .bind(&file.content_fileurl)
            .bind(file.content_filesize)
            .bind(file.content_timemodified)
            .bind(&file.module_name)
            .bind(file.module_kind.as_tag())
            .bind(file.content_type.as_tag())
            .bind(file.saved_to.as_ref().map(|p| p.to_string_lossy().into_owned()))
            .bind(file.time_stamp)
            .bind(course_id)
            .bind(file.module_id)
            .bind(&file.section_name)
            .bind(&file.content_filepath)
            .bind(&file.content_filename)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to record modification: {}",
                    e
                )))
            })?;
        } else {
            sqlx::query(
                r#"
                INSERT INTO files (
                    course_id, course_fullname, module_id, section_name, module_name,
                    module_modname, content_filepath, content_filename, content_fileurl,
                    content_filesize, content_timemodified, content_type,
                    modified, deleted, notified, saved_to, time_stamp
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, 0, 0, ?, ?)
                "#,
            )
            .bind(course_id)
            .bind(course_fullname)
            .bind(file.module_id)
            .bind(&file.section_name)
            .bind(&file.module_name)
            .bind(file.module_kind.as_tag())
            .bind(&file.content_filepath)
            .bind(&file.content_filename)
            .bind(&file.content_fileurl)
            .bind(file.content_filesize)
            .bind(file.content_timemodified)
            .bind(file.content_type.as_tag())
            .bind(file.saved_to.as_ref().map(|p| p.to_string_lossy().into_owned()))
            .bind(file.time_stamp)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to insert file record: {}",
                    e
                )))
            })?;
        }

        Ok(())
    }

    /// Flip `notified = 1` on records covered by a dispatched notification
    ///
    /// Matches each file's full identity and content signature, guarded by
    /// `notified = 0` so two concurrent notification runs cannot both count
    /// the same record.
    pub async fn mark_notified(&self, courses: &[Course]) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        for course in courses {
            for file in &course.files {
                sqlx::query(
                    r#"
                    UPDATE files
                    SET notified = 1
                    WHERE course_id = ? AND module_id = ? AND section_name = ?
                      AND content_filepath = ? AND content_filename = ?
                      AND content_fileurl = ? AND content_filesize = ?
                      AND content_timemodified = ?
                      AND deleted = ? AND modified = ?
                      AND notified = 0
                    "#,
                )
                .bind(course.id)
                .bind(file.module_id)
                .bind(&file.section_name)
                .bind(&file.content_filepath)
                .bind(&file.content_filename)
                .bind(&file.content_fileurl)
                .bind(file.content_filesize)
                .bind(file.content_timemodified)
                .bind(file.deleted)
                .bind(file.modified)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to mark record notified: {}",
                        e
                    )))
                })?;
            }
        }

        Ok(())
    }
}

/// Group rows (ordered by course_id) into Course values
fn group_by_course(rows: Vec<FileRow>) -> Vec<Course> {
    let mut courses: Vec<Course> = Vec::new();

    for row in rows {
        let matches_last = courses.last().is_some_and(|c| c.id == row.course_id);
        if !matches_last {
            courses.push(Course::new(row.course_id, row.course_fullname.clone()));
        }
        if let Some(course) = courses.last_mut() {
            course.files.push(File::from(row));
        }
    }

    courses
}
