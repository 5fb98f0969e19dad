//! Sigmirror Core Library
//!
//! This library provides the core functionality for the sigmirror tool,
//! which keeps a local mirror of ClamAV signature databases in step with the
//! versions advertised through DNS.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`directory`] - DNS directory record and source candidate resolution
//! - [`validate`] - CVD header parsing and payload validation
//! - [`download`] - HTTP fetch engine with per-candidate retry and failover
//! - [`publish`] - Atomic promotion of staged files into the mirror
//! - [`lock`] - Single-instance run lock
//! - [`config`] - Run configuration and defaults
//! - [`run`] - Run coordination, summary and exit codes

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod directory;
pub mod download;
pub mod lock;
pub mod publish;
pub mod run;
mod user_agent;
pub mod validate;

// Re-export commonly used types
pub use config::{ConfigError, MirrorConfig};
pub use directory::{DirectoryLookupError, DirectoryResolver, DnsLookup, ServerCandidate};
pub use download::{
    ArtifactDescriptor, FailureType, FetchEngine, FetchFailed, HttpClient, RetryPolicy,
    StagedFile,
};
pub use lock::{LockError, RunLock};
pub use publish::{MirrorPublisher, MirroredFile, PublishError};
pub use run::{RunCoordinator, RunError, RunSummary};
pub use validate::{ArtifactValidator, CvdHeader, InvalidReason, Validation};
