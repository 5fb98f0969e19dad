//! Error types for the publish step.

use std::path::PathBuf;
use thiserror::Error;

/// Failure to promote a staged file into the mirror directory.
///
/// The staged file has already been removed when one of these is returned.
#[derive(Debug, Error)]
pub enum PublishError {
    /// Working and mirror directories are on different filesystems.
    #[error("cannot rename {from} to {to}: directories are on different filesystems")]
    CrossDevice {
        /// Staged path.
        from: PathBuf,
        /// Mirror path.
        to: PathBuf,
    },

    /// Any other file system error.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path being operated on.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Ownership could not be applied and it is mandatory.
    #[error("cannot set ownership on {path}: {message}")]
    Ownership {
        /// Path being chowned.
        path: PathBuf,
        /// What went wrong (unknown name, permission denied).
        message: String,
    },
}

impl PublishError {
    /// Creates an I/O error for `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Maps a failed rename, singling out cross-device moves.
    pub fn rename(from: impl Into<PathBuf>, to: impl Into<PathBuf>, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::CrossesDevices {
            Self::CrossDevice {
                from: from.into(),
                to: to.into(),
            }
        } else {
            Self::io(from, source)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_rename_maps_cross_device() {
        let err = PublishError::rename(
            "/spool/main.cvd.staged",
            "/srv/main.cvd",
            io::Error::from(io::ErrorKind::CrossesDevices),
        );
        assert!(matches!(err, PublishError::CrossDevice { .. }));
        assert!(err.to_string().contains("different filesystems"));
    }

    #[test]
    fn test_rename_other_errors_are_io() {
        let err = PublishError::rename(
            "/spool/main.cvd.staged",
            "/srv/main.cvd",
            io::Error::from(io::ErrorKind::PermissionDenied),
        );
        assert!(matches!(err, PublishError::Io { .. }));
    }
}
