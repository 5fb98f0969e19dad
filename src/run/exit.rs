//! Exit code logic for the mirror process.
//!
//! Single responsibility: map a run result to the process exit outcome.

use std::process::ExitCode;

use super::{RunError, RunSummary};

/// Process exit outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessExit {
    /// Every artifact published or already current.
    Success,
    /// At least one artifact (or `dns.txt`) failed.
    ArtifactFailure,
    /// Invalid configuration or an unexpected local error.
    Configuration,
    /// The directory record could not be resolved.
    DirectoryLookup,
    /// Another instance holds the run lock.
    AlreadyRunning,
}

impl ProcessExit {
    /// Numeric exit status.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::ArtifactFailure => 1,
            Self::Configuration => 2,
            Self::DirectoryLookup => 3,
            Self::AlreadyRunning => 254,
        }
    }
}

impl From<ProcessExit> for ExitCode {
    fn from(exit: ProcessExit) -> Self {
        ExitCode::from(exit.code())
    }
}

/// Determines the exit outcome of a finished run.
#[must_use]
pub fn determine_exit_outcome(summary: &RunSummary) -> ProcessExit {
    if summary.is_success() {
        ProcessExit::Success
    } else {
        ProcessExit::ArtifactFailure
    }
}

/// Determines the exit outcome of a run that aborted.
#[must_use]
pub fn exit_for_error(error: &RunError) -> ProcessExit {
    match error {
        RunError::AlreadyRunning { .. } => ProcessExit::AlreadyRunning,
        RunError::Directory(_) => ProcessExit::DirectoryLookup,
        RunError::Config(_) | RunError::HttpClient(_) | RunError::Lock(_) | RunError::Io { .. } => {
            ProcessExit::Configuration
        }
    }
}
