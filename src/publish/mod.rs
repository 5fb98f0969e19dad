//! Publishing validated files into the mirror directory.
//!
//! A publish is a sequence of local steps on the staged file (mode `0644`,
//! optional ownership) followed by a single `rename` into the mirror
//! directory. Readers of the mirror therefore see either the previous file or
//! the complete new one, never a partial write.

mod error;
mod ownership;

use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

use crate::download::StagedFile;
use crate::download::constants::STAGED_SUFFIX;

pub use error::PublishError;
pub use ownership::Ownership;

/// Mode applied to every published file.
pub const PUBLISHED_FILE_MODE: u32 = 0o644;

/// A file committed to the mirror directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MirroredFile {
    /// Final path in the mirror directory.
    pub path: PathBuf,
    /// Version of the published artifact.
    pub version: u32,
    /// Set when ownership was requested but could not be applied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ownership_warning: Option<String>,
}

/// Moves staged files into the mirror directory.
#[derive(Debug, Clone)]
pub struct MirrorPublisher {
    mirror_dir: PathBuf,
    ownership: Option<Ownership>,
    require_ownership: bool,
}

impl MirrorPublisher {
    /// Creates a publisher writing into `mirror_dir`, without ownership changes.
    #[must_use]
    pub fn new(mirror_dir: impl Into<PathBuf>) -> Self {
        Self {
            mirror_dir: mirror_dir.into(),
            ownership: None,
            require_ownership: false,
        }
    }

    /// Applies `ownership` to every published file. With `required`, a failed
    /// chown fails the publish instead of producing a warning.
    #[must_use]
    pub fn with_ownership(mut self, ownership: Option<Ownership>, required: bool) -> Self {
        self.ownership = ownership;
        self.require_ownership = required;
        self
    }

    /// Mirror directory this publisher writes into.
    #[must_use]
    pub fn mirror_dir(&self) -> &Path {
        &self.mirror_dir
    }

    /// Promotes `staged` to `<mirror_dir>/<file_name>`.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError`] when permissions, ownership (if required) or
    /// the rename fail. The staged file is removed in that case.
    #[instrument(skip(self, staged), fields(artifact = %staged.artifact().name))]
    pub async fn publish(&self, mut staged: StagedFile) -> Result<MirroredFile, PublishError> {
        let target = self.mirror_dir.join(&staged.artifact().file_name);
        let ownership_warning = self.prepare(staged.path()).await?;

        tokio::fs::rename(staged.path(), &target)
            .await
            .map_err(|e| PublishError::rename(staged.path(), &target, e))?;
        staged.mark_promoted();
        sync_dir(&self.mirror_dir).await;

        let version = staged.header().version;
        info!(path = %target.display(), version, source = %staged.source(), "artifact published");
        Ok(MirroredFile {
            path: target,
            version,
            ownership_warning,
        })
    }

    /// Publishes a small auxiliary file (such as `dns.txt`) through the same
    /// stage-then-rename sequence, staging it in `work_dir`.
    ///
    /// Returns `Ok(None)` without touching anything when the mirrored file
    /// already holds exactly `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError`] when staging or promoting fails.
    #[instrument(skip(self, work_dir, bytes), fields(bytes = bytes.len()))]
    pub async fn publish_bytes(
        &self,
        work_dir: &Path,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<Option<PathBuf>, PublishError> {
        let target = self.mirror_dir.join(file_name);
        if let Ok(existing) = tokio::fs::read(&target).await
            && existing == bytes
        {
            debug!(path = %target.display(), "content unchanged; skipping");
            return Ok(None);
        }

        let staged = work_dir.join(format!("{file_name}.{STAGED_SUFFIX}"));
        let result = self.write_and_promote(&staged, &target, bytes).await;
        if result.is_err() {
            let _ = tokio::fs::remove_file(&staged).await;
        }
        result.map(|()| Some(target))
    }

    async fn write_and_promote(
        &self,
        staged: &Path,
        target: &Path,
        bytes: &[u8],
    ) -> Result<(), PublishError> {
        let mut file = tokio::fs::File::create(staged)
            .await
            .map_err(|e| PublishError::io(staged, e))?;
        file.write_all(bytes)
            .await
            .map_err(|e| PublishError::io(staged, e))?;
        file.sync_all()
            .await
            .map_err(|e| PublishError::io(staged, e))?;
        drop(file);

        self.prepare(staged).await?;
        tokio::fs::rename(staged, target)
            .await
            .map_err(|e| PublishError::rename(staged, target, e))?;
        sync_dir(&self.mirror_dir).await;
        info!(path = %target.display(), "file published");
        Ok(())
    }

    /// Sets mode and ownership on a staged path. Returns the ownership
    /// warning, if any.
    async fn prepare(&self, path: &Path) -> Result<Option<String>, PublishError> {
        set_mode(path).await?;

        let Some(ownership) = &self.ownership else {
            return Ok(None);
        };
        match ownership::apply(path, ownership) {
            Ok(()) => Ok(None),
            Err(message) if self.require_ownership => Err(PublishError::Ownership {
                path: path.to_path_buf(),
                message,
            }),
            Err(message) => {
                warn!(path = %path.display(), %message, "ownership not applied");
                Ok(Some(message))
            }
        }
    }
}

#[cfg(unix)]
async fn set_mode(path: &Path) -> Result<(), PublishError> {
    use std::os::unix::fs::PermissionsExt;

    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(PUBLISHED_FILE_MODE))
        .await
        .map_err(|e| PublishError::io(path, e))
}

#[cfg(not(unix))]
async fn set_mode(_path: &Path) -> Result<(), PublishError> {
    Ok(())
}

/// Flushes the directory entry after a rename. Best effort.
async fn sync_dir(dir: &Path) {
    match tokio::fs::File::open(dir).await {
        Ok(handle) => {
            if let Err(error) = handle.sync_all().await {
                debug!(dir = %dir.display(), %error, "directory fsync failed");
            }
        }
        Err(error) => debug!(dir = %dir.display(), %error, "cannot open directory for fsync"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::directory::ServerCandidate;
    use crate::download::ArtifactDescriptor;
    use crate::validate::CvdHeader;

    fn staged_in(dir: &Path, name: &str, content: &[u8], version: u32) -> StagedFile {
        let artifact = ArtifactDescriptor::new(name, Some(version));
        let path = dir.join(format!("{}.staged", artifact.file_name));
        std::fs::write(&path, content).unwrap();
        let header = CvdHeader {
            build_time: "t".to_string(),
            version,
            signatures: 1,
            functionality_level: 90,
            md5: String::new(),
            builder: "b".to_string(),
        };
        StagedFile::new(
            path,
            artifact,
            header,
            ServerCandidate::from_authority("mirror.example.org"),
        )
    }

    #[tokio::test]
    async fn test_publish_replaces_existing_file() {
        let work = tempfile::TempDir::new().unwrap();
        let mirror = tempfile::TempDir::new().unwrap();
        std::fs::write(mirror.path().join("daily.cvd"), b"old").unwrap();

        let staged = staged_in(work.path(), "daily", b"new content", 5);
        let staged_path = staged.path().to_path_buf();

        let publisher = MirrorPublisher::new(mirror.path());
        let mirrored = publisher.publish(staged).await.unwrap();

        assert_eq!(mirrored.version, 5);
        assert_eq!(mirrored.path, mirror.path().join("daily.cvd"));
        assert_eq!(std::fs::read(&mirrored.path).unwrap(), b"new content");
        assert!(!staged_path.exists());
        assert!(mirrored.ownership_warning.is_none());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_publish_sets_mode_0644() {
        use std::os::unix::fs::PermissionsExt;

        let work = tempfile::TempDir::new().unwrap();
        let mirror = tempfile::TempDir::new().unwrap();
        let staged = staged_in(work.path(), "main", b"x", 1);
        std::fs::set_permissions(staged.path(), std::fs::Permissions::from_mode(0o600)).unwrap();

        let mirrored = MirrorPublisher::new(mirror.path())
            .publish(staged)
            .await
            .unwrap();
        let mode = std::fs::metadata(&mirrored.path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, PUBLISHED_FILE_MODE);
    }

    #[tokio::test]
    async fn test_publish_into_missing_directory_fails_and_cleans_up() {
        let work = tempfile::TempDir::new().unwrap();
        let staged = staged_in(work.path(), "main", b"x", 1);
        let staged_path = staged.path().to_path_buf();

        let publisher = MirrorPublisher::new(work.path().join("does-not-exist"));
        let err = publisher.publish(staged).await.unwrap_err();

        assert!(matches!(err, PublishError::Io { .. }), "got {err:?}");
        assert!(!staged_path.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unknown_owner_is_a_warning_by_default() {
        let work = tempfile::TempDir::new().unwrap();
        let mirror = tempfile::TempDir::new().unwrap();
        let staged = staged_in(work.path(), "main", b"x", 1);

        let publisher = MirrorPublisher::new(mirror.path()).with_ownership(
            Ownership::from_names(Some("no-such-user-sigmirror".into()), None),
            false,
        );
        let mirrored = publisher.publish(staged).await.unwrap();
        assert!(mirrored.ownership_warning.is_some());
        assert!(mirrored.path.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unknown_owner_fails_when_required() {
        let work = tempfile::TempDir::new().unwrap();
        let mirror = tempfile::TempDir::new().unwrap();
        std::fs::write(mirror.path().join("main.cvd"), b"previous").unwrap();
        let staged = staged_in(work.path(), "main", b"x", 1);

        let publisher = MirrorPublisher::new(mirror.path()).with_ownership(
            Ownership::from_names(None, Some("no-such-group-sigmirror".into())),
            true,
        );
        let err = publisher.publish(staged).await.unwrap_err();
        assert!(matches!(err, PublishError::Ownership { .. }));
        assert_eq!(
            std::fs::read(mirror.path().join("main.cvd")).unwrap(),
            b"previous"
        );
    }

    #[tokio::test]
    async fn test_publish_bytes_skips_identical_content() {
        let work = tempfile::TempDir::new().unwrap();
        let mirror = tempfile::TempDir::new().unwrap();
        let publisher = MirrorPublisher::new(mirror.path());

        let first = publisher
            .publish_bytes(work.path(), "dns.txt", b"0.103.8:62:27000")
            .await
            .unwrap();
        assert_eq!(first, Some(mirror.path().join("dns.txt")));

        let second = publisher
            .publish_bytes(work.path(), "dns.txt", b"0.103.8:62:27000")
            .await
            .unwrap();
        assert_eq!(second, None);

        let third = publisher
            .publish_bytes(work.path(), "dns.txt", b"0.103.8:62:27001")
            .await
            .unwrap();
        assert!(third.is_some());
        assert_eq!(
            std::fs::read(mirror.path().join("dns.txt")).unwrap(),
            b"0.103.8:62:27001"
        );
        assert!(!work.path().join("dns.txt.staged").exists());
    }
}
