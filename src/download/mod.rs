//! HTTP fetch layer for signature artifacts.
//!
//! This module turns an artifact descriptor plus an ordered candidate list
//! into a validated file in the working directory, or a single terminal
//! failure.
//!
//! # Features
//!
//! - Whole-body fetch with connect and total-request timeouts (10s / 60s by default)
//! - Per-candidate retries with exponential backoff
//! - Immediate failover on 404
//! - Validation before anything is written to disk
//! - Staged files that clean up after themselves unless promoted
//!
//! # Example
//!
//! ```no_run
//! use sigmirror_core::directory::ServerCandidate;
//! use sigmirror_core::download::HttpClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::new()?;
//! let body = client
//!     .fetch(&ServerCandidate::from_authority("mirror.example.org"), "main.cvd")
//!     .await?;
//! println!("received {} bytes", body.len());
//! # Ok(())
//! # }
//! ```

mod client;
pub mod constants;
mod engine;
mod error;
mod retry;

pub use client::HttpClient;
pub use engine::{
    ArtifactDescriptor, AttemptOutcome, FetchEngine, FetchFailed, FetchStats, StagedFile,
};
pub use error::DownloadError;
pub use retry::{
    DEFAULT_BASE_DELAY, DEFAULT_MAX_RETRIES, FailureType, RetryDecision, RetryPolicy,
    classify_error,
};

// Result aliases are not defined per module.
// Use `Result<T, DownloadError>` explicitly in function signatures.
