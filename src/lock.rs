//! Storage-root process lock
//!
//! A sentinel file in the storage root keeps two invocations from syncing the
//! same tree at once. Best-effort by design: the check-and-create is a single
//! atomic `create_new`, but a crashed run leaves the sentinel behind and the
//! operator has to remove it (the error message names the file).

use crate::error::{Error, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Name of the sentinel file inside the storage root
pub const LOCK_FILE_NAME: &str = "running.lock";

/// Held for the lifetime of a [`CourseDownloader`](crate::CourseDownloader)
///
/// Created by [`acquire`](LockFile::acquire), removed by
/// [`release`](LockFile::release); Drop removes it best-effort if `release`
/// was never called.
#[derive(Debug)]
pub struct LockFile {
    path: PathBuf,
    released: bool,
}

impl LockFile {
    /// Create the sentinel, refusing to start when it already exists
    pub fn acquire(storage_root: &Path) -> Result<Self> {
        std::fs::create_dir_all(storage_root)?;
        let path = storage_root.join(LOCK_FILE_NAME);

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                // PID is informational, for the operator inspecting a stale lock
                let _ = writeln!(file, "{}", std::process::id());
                tracing::debug!(path = %path.display(), "Acquired storage lock");
                Ok(Self {
                    path,
                    released: false,
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(Error::AlreadyRunning { lock_path: path })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove the sentinel on clean exit
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        std::fs::remove_file(&self.path)?;
        tracing::debug!(path = %self.path.display(), "Released storage lock");
        Ok(())
    }

    /// Path of the sentinel file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        if !self.released {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}
