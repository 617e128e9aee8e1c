//! Inventory diffing between the persisted snapshot and the current remote listing
//!
//! [`diff`] is the change-detection core: it compares the previously recorded
//! inventory against the inventory observed this run and returns, per course,
//! the files that were added (unflagged), modified (`modified = true`), or
//! removed (`deleted = true`). Unchanged files never appear in the result.
//!
//! The function is pure and deterministic (no I/O, no hidden state) and
//! runs in O(total files) using per-course hash indexes over
//! [`FileKey`](crate::types::FileKey).

use crate::types::{Course, File, FileKey};
use std::collections::{HashMap, HashSet};

/// Compute the changed set between two inventory snapshots
///
/// Files in the result carry their change state:
/// - `deleted = true` — present in `previous`, absent from `current` (or the
///   whole course became inaccessible). Identity and content fields come from
///   the previous record.
/// - `modified = true` — identity retained but a content attribute (url,
///   size, remote timestamp) changed. The emitted file is the **current**
///   one, so downstream transfers use the fresh URL and size.
/// - unflagged — first seen this run.
///
/// Courses appear in the result only when they accumulated at least one
/// changed file; a course is never emitted twice.
pub fn diff(previous: &[Course], current: &[Course]) -> Vec<Course> {
    let mut changed: Vec<Course> = Vec::new();
    let mut slot_of: HashMap<i64, usize> = HashMap::new();

    let current_by_id: HashMap<i64, &Course> = current.iter().map(|c| (c.id, c)).collect();
    let previous_by_id: HashMap<i64, &Course> = previous.iter().map(|c| (c.id, c)).collect();

    // Pass 1: deletions and modifications among previously known courses.
    for prev_course in previous {
        let mut files: Vec<File> = Vec::new();

        match current_by_id.get(&prev_course.id) {
            None => {
                // Course no longer accessible: treat every file as removed.
                files.extend(prev_course.files.iter().map(|f| mark_deleted(f)));
            }
            Some(cur_course) => {
                let cur_by_key: HashMap<FileKey<'_>, &File> =
                    cur_course.files.iter().map(|f| (f.key(), f)).collect();

                for prev_file in &prev_course.files {
                    match cur_by_key.get(&prev_file.key()) {
                        None => files.push(mark_deleted(prev_file)),
                        Some(cur_file) if prev_file.content_differs(cur_file) => {
                            let mut file = (*cur_file).clone();
                            file.modified = true;
                            file.deleted = false;
                            file.notified = false;
                            files.push(file);
                        }
                        Some(_) => {}
                    }
                }
            }
        }

        push_changed(&mut changed, &mut slot_of, prev_course, files);
    }

    // Pass 2: additions. Accumulates onto courses already emitted by pass 1.
    for cur_course in current {
        let mut files: Vec<File> = Vec::new();

        match previous_by_id.get(&cur_course.id) {
            None => {
                // Whole course is new.
                files.extend(cur_course.files.iter().cloned());
            }
            Some(prev_course) => {
                let prev_keys: HashSet<FileKey<'_>> =
                    prev_course.files.iter().map(|f| f.key()).collect();

                for cur_file in &cur_course.files {
                    if !prev_keys.contains(&cur_file.key()) {
                        files.push(cur_file.clone());
                    }
                }
            }
        }

        push_changed(&mut changed, &mut slot_of, cur_course, files);
    }

    // Pass 3 is implicit: push_changed only creates a course entry once it
    // has files to contribute.
    changed
}

fn mark_deleted(file: &File) -> File {
    let mut file = file.clone();
    file.deleted = true;
    file.modified = false;
    file.notified = false;
    file
}

fn push_changed(
    changed: &mut Vec<Course>,
    slot_of: &mut HashMap<i64, usize>,
    course: &Course,
    files: Vec<File>,
) {
    if files.is_empty() {
        return;
    }
    let slot = *slot_of.entry(course.id).or_insert_with(|| {
        changed.push(Course::new(course.id, course.fullname.clone()));
        changed.len() - 1
    });
    changed[slot].files.extend(files);
}
