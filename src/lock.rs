//! Single-instance guard for mirror runs.
//!
//! [`RunLock`] holds an advisory exclusive lock on `<lock_dir>/sigmirror.lock`
//! for as long as it is alive. A second process (or a second lock attempt in
//! the same process) gets [`LockError::AlreadyRunning`] instead of waiting.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;
use tracing::{debug, info};

/// Name of the lock file inside the lock directory.
pub const LOCK_FILE_NAME: &str = "sigmirror.lock";

/// Errors from acquiring the run lock.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another run holds the lock.
    #[error("another instance is already running (lock held on {path})")]
    AlreadyRunning {
        /// Lock file path.
        path: PathBuf,
    },

    /// The lock file could not be created or locked.
    #[error("cannot lock {path}: {source}")]
    Io {
        /// Lock file path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// RAII guard for the exclusive run lock. Released on drop.
#[derive(Debug)]
pub struct RunLock {
    file: File,
    path: PathBuf,
}

impl RunLock {
    /// Acquires the lock in `lock_dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::AlreadyRunning`] if the lock is held elsewhere,
    /// or [`LockError::Io`] if the lock file cannot be opened.
    pub fn acquire(lock_dir: &Path) -> Result<Self, LockError> {
        let path = lock_dir.join(LOCK_FILE_NAME);
        let io_error = |source| LockError::Io {
            path: path.clone(),
            source,
        };

        std::fs::create_dir_all(lock_dir).map_err(io_error)?;
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(io_error)?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                debug!(path = %path.display(), "run lock acquired");
                Ok(Self { file, path })
            }
            Err(err) if err.kind() == fs2::lock_contended_error().kind() => {
                info!(path = %path.display(), "run lock is held by another instance");
                Err(LockError::AlreadyRunning { path })
            }
            Err(err) => Err(io_error(err)),
        }
    }

    /// Path of the lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        debug!(path = %self.path.display(), "run lock released");
    }
}
