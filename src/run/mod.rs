//! Run coordination.
//!
//! [`RunCoordinator::run`] drives one complete mirror run:
//!
//! 1. acquire the [`RunLock`] (abort with [`RunError::AlreadyRunning`] if held)
//! 2. resolve the directory, with a bounded number of lookup passes
//! 3. create the working and mirror directories
//! 4. read the locally mirrored versions
//! 5. fetch and publish each configured artifact, one at a time
//! 6. publish the raw directory record as `dns.txt`
//!
//! A failing artifact never aborts the run; it is recorded in the
//! [`RunSummary`] and the next artifact is processed.

mod exit;
mod summary;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::config::{ConfigError, DNS_FILE_NAME, MirrorConfig};
use crate::directory::{Directory, DirectoryLookupError, DirectoryResolver, DnsLookup};
use crate::download::{ArtifactDescriptor, FetchEngine, HttpClient, RetryPolicy};
use crate::lock::{LockError, RunLock};
use crate::publish::{MirrorPublisher, Ownership};
use crate::validate::{ArtifactValidator, read_local_header};

pub use exit::{ProcessExit, determine_exit_outcome, exit_for_error};
pub use summary::{ArtifactFailure, ArtifactOutcome, ArtifactReport, DnsFileOutcome, RunSummary};

/// Errors that abort a run before or instead of processing artifacts.
#[derive(Debug, Error)]
pub enum RunError {
    /// Another instance holds the run lock. Nothing was done.
    #[error("another instance is already running (lock held on {path})")]
    AlreadyRunning {
        /// Lock file path.
        path: PathBuf,
    },

    /// The lock could not be taken for another reason.
    #[error(transparent)]
    Lock(LockError),

    /// The directory record or candidates could not be resolved.
    #[error("directory lookup failed: {0}")]
    Directory(#[source] DirectoryLookupError),

    /// The configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(#[source] ConfigError),

    /// The HTTP client could not be built.
    #[error("cannot create HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    /// A run directory could not be created.
    #[error("cannot prepare {path}: {source}")]
    Io {
        /// Directory path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl RunError {
    fn lock(error: LockError) -> Self {
        match error {
            LockError::AlreadyRunning { path } => Self::AlreadyRunning { path },
            other @ LockError::Io { .. } => Self::Lock(other),
        }
    }
}

/// Owns the components of one run and sequences them.
#[derive(Debug)]
pub struct RunCoordinator {
    config: MirrorConfig,
    resolver: DirectoryResolver,
    engine: FetchEngine,
    publisher: MirrorPublisher,
}

impl RunCoordinator {
    /// Validates `config` and wires the resolver, fetch engine and publisher.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::Config`] for invalid configuration or
    /// [`RunError::HttpClient`] if the HTTP client cannot be built.
    pub fn new(config: MirrorConfig, dns: Arc<dyn DnsLookup>) -> Result<Self, RunError> {
        config.validate().map_err(RunError::Config)?;

        let resolver = DirectoryResolver::new(dns, config.hostname.clone(), config.port)
            .with_fallback_mirrors(config.fallback_mirrors.iter().cloned());

        let client = HttpClient::new_with_timeouts(config.connect_timeout, config.read_timeout)
            .map_err(RunError::HttpClient)?;
        let policy = RetryPolicy::with_attempts_and_delay(config.max_attempts, config.retry_base_delay);
        let engine = FetchEngine::new(client, policy, ArtifactValidator::new(config.allow_downgrade));

        let publisher = MirrorPublisher::new(config.mirror_dir.clone()).with_ownership(
            Ownership::from_names(config.user.clone(), config.group.clone()),
            config.require_ownership,
        );

        Ok(Self {
            config,
            resolver,
            engine,
            publisher,
        })
    }

    /// Performs one run.
    ///
    /// # Errors
    ///
    /// Returns [`RunError`] when the lock is held, the directory cannot be
    /// resolved, or the run directories cannot be created. Per-artifact
    /// failures are reported in the [`RunSummary`] instead.
    #[instrument(skip(self), fields(record = %self.config.text_record))]
    pub async fn run(&self) -> Result<RunSummary, RunError> {
        let _lock = RunLock::acquire(&self.config.lock_dir).map_err(RunError::lock)?;

        let directory = self.resolve_directory().await?;

        create_dir(&self.config.work_dir).await?;
        create_dir(&self.config.mirror_dir).await?;

        let local_versions = self.local_versions().await;

        let mut artifacts = Vec::with_capacity(self.config.artifacts.len());
        for name in &self.config.artifacts {
            artifacts.push(self.process_artifact(name, &directory, &local_versions).await);
        }

        let dns_file = if self.config.write_dns_file {
            Some(self.publish_dns_file(&directory).await)
        } else {
            None
        };

        let stats = self.engine.stats();
        let summary = RunSummary {
            record: directory.record.raw().to_string(),
            candidates: directory.candidates.iter().map(ToString::to_string).collect(),
            artifacts,
            dns_file,
            attempts: stats.attempts(),
            retried: stats.retried(),
            failovers: stats.failovers(),
        };

        info!(
            published = summary.published_count(),
            up_to_date = summary.up_to_date_count(),
            failed = summary.failed_count(),
            attempts = summary.attempts,
            "run complete"
        );
        Ok(summary)
    }

    async fn resolve_directory(&self) -> Result<Directory, RunError> {
        let mut pass = 1;
        loop {
            match self.resolver.resolve(&self.config.text_record).await {
                Ok(directory) => return Ok(directory),
                Err(error) if error.is_transient() && pass < self.config.lookup_attempts => {
                    warn!(
                        %error,
                        pass,
                        max_passes = self.config.lookup_attempts,
                        "directory lookup failed; retrying"
                    );
                    tokio::time::sleep(self.config.lookup_pause).await;
                    pass += 1;
                }
                Err(error) => return Err(RunError::Directory(error)),
            }
        }
    }

    /// Versions currently in the mirror directory, by artifact name.
    async fn local_versions(&self) -> BTreeMap<String, u32> {
        let mut versions = BTreeMap::new();
        for name in &self.config.artifacts {
            let path = self.config.mirror_dir.join(ArtifactDescriptor::new(name.as_str(), None).file_name);
            if let Some(header) = read_local_header(&path).await {
                debug!(artifact = %name, version = header.version, "local version");
                versions.insert(name.clone(), header.version);
            }
        }
        versions
    }

    #[instrument(skip(self, directory, local_versions))]
    async fn process_artifact(
        &self,
        name: &str,
        directory: &Directory,
        local_versions: &BTreeMap<String, u32>,
    ) -> ArtifactReport {
        let advertised_version = directory.record.version(name);
        let local_version = local_versions.get(name).copied();
        let report = |outcome| ArtifactReport {
            name: name.to_string(),
            advertised_version,
            local_version,
            outcome,
        };

        let Some(advertised) = advertised_version else {
            warn!("artifact is not advertised by the directory record");
            return report(ArtifactOutcome::Failed {
                failure: ArtifactFailure::NotAdvertised,
            });
        };

        if let Some(local) = local_version
            && local >= advertised
        {
            info!(local, advertised, "artifact is up to date");
            return report(ArtifactOutcome::UpToDate { version: local });
        }

        let descriptor = ArtifactDescriptor::new(name, Some(advertised));
        let staged = match self
            .engine
            .fetch(&descriptor, local_version, &directory.candidates, &self.config.work_dir)
            .await
        {
            Ok(staged) => staged,
            Err(error) => {
                warn!(%error, "artifact fetch failed");
                return report(ArtifactOutcome::Failed {
                    failure: ArtifactFailure::Fetch {
                        last_failure: error.last_failure(),
                        message: error.to_string(),
                    },
                });
            }
        };

        let source = staged.source().to_string();
        match self.publisher.publish(staged).await {
            Ok(mirrored) => report(ArtifactOutcome::Published {
                version: mirrored.version,
                path: mirrored.path,
                source,
                ownership_warning: mirrored.ownership_warning,
            }),
            Err(error) => {
                warn!(%error, "artifact publish failed");
                report(ArtifactOutcome::Failed {
                    failure: ArtifactFailure::Publish {
                        message: error.to_string(),
                    },
                })
            }
        }
    }

    async fn publish_dns_file(&self, directory: &Directory) -> DnsFileOutcome {
        match self
            .publisher
            .publish_bytes(&self.config.work_dir, DNS_FILE_NAME, directory.record.raw().as_bytes())
            .await
        {
            Ok(Some(path)) => DnsFileOutcome::Written { path },
            Ok(None) => DnsFileOutcome::Unchanged,
            Err(error) => {
                warn!(%error, "cannot publish directory record");
                DnsFileOutcome::Failed {
                    message: error.to_string(),
                }
            }
        }
    }
}

async fn create_dir(path: &Path) -> Result<(), RunError> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|source| RunError::Io {
            path: path.to_path_buf(),
            source,
        })
}
