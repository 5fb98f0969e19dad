//! Per-run reporting types.

use std::path::PathBuf;

use serde::Serialize;

use crate::download::FailureType;

/// Why an artifact was not mirrored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "kebab-case")]
pub enum ArtifactFailure {
    /// The directory record carries no version for the artifact.
    NotAdvertised,
    /// No candidate delivered a valid payload.
    Fetch {
        /// Class of the last failed attempt, if any attempt was made.
        #[serde(skip_serializing_if = "Option::is_none")]
        last_failure: Option<FailureType>,
        /// Error text.
        message: String,
    },
    /// The payload was valid but could not be published.
    Publish {
        /// Error text.
        message: String,
    },
}

/// What happened to one artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum ArtifactOutcome {
    /// A new version was published.
    Published {
        /// Published version.
        version: u32,
        /// Path in the mirror directory.
        path: PathBuf,
        /// Candidate the payload came from.
        source: String,
        /// Ownership could not be applied.
        #[serde(skip_serializing_if = "Option::is_none")]
        ownership_warning: Option<String>,
    },
    /// The mirrored copy is already current; nothing was fetched.
    UpToDate {
        /// Mirrored version.
        version: u32,
    },
    /// The artifact could not be mirrored.
    Failed {
        /// Cause.
        failure: ArtifactFailure,
    },
}

/// Outcome for one configured artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactReport {
    /// Artifact name.
    pub name: String,
    /// Version advertised by the directory record.
    pub advertised_version: Option<u32>,
    /// Version mirrored before the run.
    pub local_version: Option<u32>,
    /// Result.
    #[serde(flatten)]
    pub outcome: ArtifactOutcome,
}

impl ArtifactReport {
    /// True when the artifact ended in [`ArtifactOutcome::Failed`].
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, ArtifactOutcome::Failed { .. })
    }
}

/// Result of publishing the raw directory record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum DnsFileOutcome {
    /// The file was (re)written.
    Written {
        /// Path in the mirror directory.
        path: PathBuf,
    },
    /// The file already held the current record.
    Unchanged,
    /// The file could not be written.
    Failed {
        /// Error text.
        message: String,
    },
}

/// Summary of one completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Raw directory record text.
    pub record: String,
    /// Candidates in the order they were tried.
    pub candidates: Vec<String>,
    /// One report per configured artifact, in configured order.
    pub artifacts: Vec<ArtifactReport>,
    /// `dns.txt` result, when enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns_file: Option<DnsFileOutcome>,
    /// HTTP requests issued.
    pub attempts: usize,
    /// Requests re-issued against the same candidate.
    pub retried: usize,
    /// Times a candidate was abandoned and a following one tried.
    pub failovers: usize,
}

impl RunSummary {
    /// Number of artifacts that failed.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.artifacts.iter().filter(|a| a.is_failed()).count()
    }

    /// Number of artifacts published in this run.
    #[must_use]
    pub fn published_count(&self) -> usize {
        self.artifacts
            .iter()
            .filter(|a| matches!(a.outcome, ArtifactOutcome::Published { .. }))
            .count()
    }

    /// Number of artifacts that were already current.
    #[must_use]
    pub fn up_to_date_count(&self) -> usize {
        self.artifacts
            .iter()
            .filter(|a| matches!(a.outcome, ArtifactOutcome::UpToDate { .. }))
            .count()
    }

    /// True when no artifact failed and `dns.txt` (if enabled) was written.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed_count() == 0 && !matches!(self.dns_file, Some(DnsFileOutcome::Failed { .. }))
    }
}
