//! Fetch engine: candidate failover with bounded per-candidate retries.
//!
//! For one artifact the engine walks the ordered candidate list as a small
//! state machine:
//!
//! ```text
//! TryCandidate(i) --Success--------------------------> Staged
//!        |--NotFound-------------------------------> TryCandidate(i + 1)
//!        |--Retryable | Invalid, attempts left-----> TryCandidate(i) (after backoff)
//!        |--Retryable | Invalid, attempts spent----> TryCandidate(i + 1)
//! TryCandidate(len) ---------------------------------> FetchFailed::Exhausted
//! ```
//!
//! Only a payload accepted by the [`ArtifactValidator`] is ever written to
//! the working directory. The resulting [`StagedFile`] belongs to the caller
//! and removes itself on drop unless it is promoted.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use sigmirror_core::directory::ServerCandidate;
//! use sigmirror_core::download::{ArtifactDescriptor, FetchEngine, HttpClient, RetryPolicy};
//! use sigmirror_core::validate::ArtifactValidator;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = FetchEngine::new(HttpClient::new()?, RetryPolicy::default(), ArtifactValidator::default());
//! let candidates = vec![ServerCandidate::from_authority("mirror.example.org")];
//! let artifact = ArtifactDescriptor::new("daily", Some(27000));
//! let staged = engine.fetch(&artifact, Some(26999), &candidates, Path::new("/var/spool/sigmirror")).await?;
//! println!("staged version {}", staged.header().version);
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

use super::constants::STAGED_SUFFIX;
use super::retry::{FailureType, RetryDecision, RetryPolicy, classify_error};
use super::{DownloadError, HttpClient};
use crate::directory::ServerCandidate;
use crate::validate::{ArtifactValidator, CvdHeader, InvalidReason, Validation};

/// One mirrored object: its name, advertised version and file name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactDescriptor {
    /// Artifact name as used in the directory record (`daily`).
    pub name: String,
    /// Version advertised by the directory record.
    pub expected_version: Option<u32>,
    /// File name on the server and in the mirror (`daily.cvd`).
    pub file_name: String,
}

impl ArtifactDescriptor {
    /// Descriptor for a CVD artifact named `name`.
    #[must_use]
    pub fn new(name: impl Into<String>, expected_version: Option<u32>) -> Self {
        let name = name.into();
        let file_name = format!("{name}.cvd");
        Self {
            name,
            expected_version,
            file_name,
        }
    }
}

/// Outcome of one GET against one candidate.
#[derive(Debug)]
pub enum AttemptOutcome {
    /// Body received and accepted by the validator.
    Success {
        /// Parsed header of the payload.
        header: CvdHeader,
        /// Full payload.
        payload: Vec<u8>,
    },
    /// The candidate answered 404.
    NotFound(DownloadError),
    /// Transport failure or non-404 error status.
    Retryable(DownloadError),
    /// Body received but rejected by the validator.
    Invalid(InvalidReason),
}

impl AttemptOutcome {
    /// Classifies a transport result and, on success, runs the validator.
    #[must_use]
    pub fn classify(
        result: Result<Vec<u8>, DownloadError>,
        validator: &ArtifactValidator,
        artifact: &ArtifactDescriptor,
        previous_local_version: Option<u32>,
    ) -> Self {
        match result {
            Ok(payload) => match validator.validate(
                &payload,
                artifact.expected_version,
                previous_local_version,
            ) {
                Validation::Valid(header) => Self::Success { header, payload },
                Validation::Invalid(reason) => Self::Invalid(reason),
            },
            Err(error) if classify_error(&error) == FailureType::NotFound => {
                Self::NotFound(error)
            }
            Err(error) => Self::Retryable(error),
        }
    }
}

/// Terminal failure for one artifact.
#[derive(Debug, thiserror::Error)]
pub enum FetchFailed {
    /// Every candidate was tried without obtaining a valid payload.
    #[error(
        "{artifact}: {candidates} candidate(s) exhausted after {attempts} attempt(s); last failure {last_failure}: {detail}"
    )]
    Exhausted {
        /// Artifact name.
        artifact: String,
        /// Number of candidates tried.
        candidates: usize,
        /// Total attempts across all candidates.
        attempts: u32,
        /// Class of the last observed failure.
        last_failure: FailureType,
        /// Text of the last observed failure.
        detail: String,
    },

    /// The candidate list was empty.
    #[error("{artifact}: no source candidates available")]
    NoCandidates {
        /// Artifact name.
        artifact: String,
    },

    /// A validated payload could not be written to the working directory.
    #[error("{artifact}: cannot stage {path}: {source}")]
    Staging {
        /// Artifact name.
        artifact: String,
        /// Staging path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl FetchFailed {
    /// Class of the last failure seen, when candidates were actually tried.
    #[must_use]
    pub fn last_failure(&self) -> Option<FailureType> {
        match self {
            Self::Exhausted { last_failure, .. } => Some(*last_failure),
            Self::NoCandidates { .. } | Self::Staging { .. } => None,
        }
    }
}

/// A validated payload waiting in the working directory.
///
/// Dropping a `StagedFile` that was not promoted deletes the file.
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
    artifact: ArtifactDescriptor,
    header: CvdHeader,
    source: ServerCandidate,
    promoted: bool,
}

impl StagedFile {
    pub(crate) fn new(
        path: PathBuf,
        artifact: ArtifactDescriptor,
        header: CvdHeader,
        source: ServerCandidate,
    ) -> Self {
        Self {
            path,
            artifact,
            header,
            source,
            promoted: false,
        }
    }

    /// Path of the staged file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Artifact the file belongs to.
    #[must_use]
    pub fn artifact(&self) -> &ArtifactDescriptor {
        &self.artifact
    }

    /// Header of the validated payload.
    #[must_use]
    pub fn header(&self) -> &CvdHeader {
        &self.header
    }

    /// Candidate the payload came from.
    #[must_use]
    pub fn source(&self) -> &ServerCandidate {
        &self.source
    }

    /// Marks the file as moved elsewhere so drop leaves it alone.
    pub(crate) fn mark_promoted(&mut self) {
        self.promoted = true;
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.promoted {
            debug!(path = %self.path.display(), "discarding staged file");
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Counters accumulated over every fetch made by one engine.
#[derive(Debug, Default)]
pub struct FetchStats {
    attempts: AtomicUsize,
    retried: AtomicUsize,
    failovers: AtomicUsize,
}

impl FetchStats {
    /// Total GET requests issued.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Requests re-issued against the same candidate.
    #[must_use]
    pub fn retried(&self) -> usize {
        self.retried.load(Ordering::SeqCst)
    }

    /// Times the engine left a candidate for a following one.
    ///
    /// Giving up on the last candidate is not a failover.
    #[must_use]
    pub fn failovers(&self) -> usize {
        self.failovers.load(Ordering::SeqCst)
    }
}

/// Retry/failover engine for single artifacts.
#[derive(Debug)]
pub struct FetchEngine {
    client: HttpClient,
    retry_policy: RetryPolicy,
    validator: ArtifactValidator,
    stats: FetchStats,
}

impl FetchEngine {
    /// Creates an engine.
    #[must_use]
    pub fn new(client: HttpClient, retry_policy: RetryPolicy, validator: ArtifactValidator) -> Self {
        debug!(
            max_attempts = retry_policy.max_attempts(),
            "creating fetch engine"
        );
        Self {
            client,
            retry_policy,
            validator,
            stats: FetchStats::default(),
        }
    }

    /// Returns the configured retry policy.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Counters accumulated so far.
    #[must_use]
    pub fn stats(&self) -> &FetchStats {
        &self.stats
    }

    /// Fetches `artifact` from the first candidate able to serve a valid payload.
    ///
    /// Candidates are tried strictly in order; no candidate after the one
    /// that succeeds is contacted.
    ///
    /// # Errors
    ///
    /// Returns [`FetchFailed`] when the list is empty, every candidate is
    /// exhausted, or the payload cannot be staged.
    #[instrument(skip(self, candidates, work_dir), fields(artifact = %artifact.name, candidates = candidates.len()))]
    pub async fn fetch(
        &self,
        artifact: &ArtifactDescriptor,
        previous_local_version: Option<u32>,
        candidates: &[ServerCandidate],
        work_dir: &Path,
    ) -> Result<StagedFile, FetchFailed> {
        if candidates.is_empty() {
            return Err(FetchFailed::NoCandidates {
                artifact: artifact.name.clone(),
            });
        }

        let mut total_attempts = 0u32;
        let mut last_failure = (FailureType::Transient, String::new());

        for (index, candidate) in candidates.iter().enumerate() {
            let mut attempt = 0u32;
            loop {
                attempt += 1;
                total_attempts += 1;
                self.stats.attempts.fetch_add(1, Ordering::SeqCst);
                debug!(%candidate, attempt, "attempting download");

                let result = self.client.fetch(candidate, &artifact.file_name).await;
                let outcome = AttemptOutcome::classify(
                    result,
                    &self.validator,
                    artifact,
                    previous_local_version,
                );

                let (failure, detail) = match outcome {
                    AttemptOutcome::Success { header, payload } => {
                        info!(
                            %candidate,
                            version = header.version,
                            bytes = payload.len(),
                            attempts = total_attempts,
                            "artifact downloaded and validated"
                        );
                        return stage(artifact, header, candidate, &payload, work_dir).await;
                    }
                    AttemptOutcome::NotFound(error) => (FailureType::NotFound, error.to_string()),
                    AttemptOutcome::Retryable(error) => {
                        (FailureType::Transient, error.to_string())
                    }
                    AttemptOutcome::Invalid(reason) => (FailureType::Invalid, reason.to_string()),
                };

                warn!(%candidate, attempt, %failure, %detail, "attempt failed");
                last_failure = (failure, detail);

                match self.retry_policy.should_retry(failure, attempt) {
                    RetryDecision::Retry { delay, attempt: next } => {
                        debug!(%candidate, next_attempt = next, delay_ms = delay.as_millis(), "retrying candidate");
                        self.stats.retried.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(delay).await;
                    }
                    RetryDecision::NextCandidate { reason } => {
                        info!(%candidate, index, %reason, "leaving candidate");
                        if index + 1 < candidates.len() {
                            self.stats.failovers.fetch_add(1, Ordering::SeqCst);
                        }
                        break;
                    }
                }
            }
        }

        let (last_failure, detail) = last_failure;
        Err(FetchFailed::Exhausted {
            artifact: artifact.name.clone(),
            candidates: candidates.len(),
            attempts: total_attempts,
            last_failure,
            detail,
        })
    }
}

/// Writes a validated payload to `<work_dir>/<file>.staged` and syncs it.
async fn stage(
    artifact: &ArtifactDescriptor,
    header: CvdHeader,
    candidate: &ServerCandidate,
    payload: &[u8],
    work_dir: &Path,
) -> Result<StagedFile, FetchFailed> {
    let path = work_dir.join(format!("{}.{STAGED_SUFFIX}", artifact.file_name));
    let staging_error = |source| FetchFailed::Staging {
        artifact: artifact.name.clone(),
        path: path.clone(),
        source,
    };

    // From here on the guard owns the path, so any early return cleans up.
    let staged = StagedFile::new(path.clone(), artifact.clone(), header, candidate.clone());

    let mut file = tokio::fs::File::create(&path).await.map_err(staging_error)?;
    file.write_all(payload).await.map_err(staging_error)?;
    file.sync_all().await.map_err(staging_error)?;

    debug!(path = %path.display(), "payload staged");
    Ok(staged)
}
