//! Directory resolution: advertised versions and source candidates.
//!
//! The [`DirectoryResolver`] performs two lookups per run:
//!
//! 1. a TXT query for the directory record, parsed into a [`DirectoryRecord`]
//!    (advertised version per artifact)
//! 2. an address query for the source hostname, turned into an ordered list
//!    of [`ServerCandidate`]s, followed by any configured fallback mirrors
//!
//! DNS access goes through the [`DnsLookup`] trait so the resolver can be
//! driven by [`SystemDns`] in production and by a static table in tests.
//! Lookup failures are returned as-is; retrying them is the run
//! coordinator's decision.

mod candidate;
mod error;
mod record;
mod system;

use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

pub use candidate::{DEFAULT_HTTP_PORT, ServerCandidate};
pub use error::DirectoryLookupError;
pub use record::{DirectoryRecord, is_artifact_name};
pub use system::SystemDns;

/// DNS queries needed by the resolver.
#[async_trait]
pub trait DnsLookup: Send + Sync {
    /// All TXT records for `name`, each as the concatenation of its strings,
    /// in the order the resolver returned them.
    async fn txt(&self, name: &str) -> Result<Vec<String>, DirectoryLookupError>;

    /// A/AAAA addresses for `host` in resolver order.
    async fn addresses(&self, host: &str) -> Result<Vec<IpAddr>, DirectoryLookupError>;
}

/// Result of a successful resolution. Read-only for the rest of the run.
#[derive(Debug, Clone)]
pub struct Directory {
    /// Advertised artifact versions.
    pub record: DirectoryRecord,
    /// Candidates in the order they will be tried.
    pub candidates: Vec<ServerCandidate>,
}

/// Resolves the directory record and the candidate list.
#[derive(Clone)]
pub struct DirectoryResolver {
    dns: Arc<dyn DnsLookup>,
    hostname: String,
    port: u16,
    fallback_mirrors: Vec<ServerCandidate>,
}

impl std::fmt::Debug for DirectoryResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryResolver")
            .field("hostname", &self.hostname)
            .field("port", &self.port)
            .field("fallback_mirrors", &self.fallback_mirrors)
            .finish_non_exhaustive()
    }
}

impl DirectoryResolver {
    /// Creates a resolver for `hostname`, serving HTTP on `port`.
    #[must_use]
    pub fn new(dns: Arc<dyn DnsLookup>, hostname: impl Into<String>, port: u16) -> Self {
        Self {
            dns,
            hostname: hostname.into(),
            port,
            fallback_mirrors: Vec::new(),
        }
    }

    /// Appends literal `host[:port]` mirrors after the resolved candidates.
    #[must_use]
    pub fn with_fallback_mirrors<I, S>(mut self, mirrors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fallback_mirrors = mirrors
            .into_iter()
            .map(ServerCandidate::from_authority)
            .collect();
        self
    }

    /// Resolves `record_name` and the source hostname.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryLookupError`] when the TXT query fails, no record
    /// parses, or no candidate can be produced.
    #[instrument(skip(self), fields(hostname = %self.hostname))]
    pub async fn resolve(&self, record_name: &str) -> Result<Directory, DirectoryLookupError> {
        let record = self.lookup_record(record_name).await?;
        info!(record = %record.raw(), "directory record resolved");

        let candidates = self.lookup_candidates().await?;
        info!(candidates = candidates.len(), "source candidates resolved");

        Ok(Directory { record, candidates })
    }

    async fn lookup_record(&self, record_name: &str) -> Result<DirectoryRecord, DirectoryLookupError> {
        let payloads = self.dns.txt(record_name).await?;
        if payloads.is_empty() {
            return Err(DirectoryLookupError::NotFound {
                name: record_name.to_string(),
                kind: "TXT",
            });
        }

        let mut first_error = None;
        for payload in &payloads {
            match DirectoryRecord::parse(payload) {
                Ok(record) => return Ok(record),
                Err(reason) => {
                    debug!(%payload, %reason, "skipping unparsable TXT record");
                    first_error.get_or_insert_with(|| {
                        DirectoryLookupError::malformed(record_name, payload.as_str(), reason)
                    });
                }
            }
        }

        Err(first_error.unwrap_or_else(|| DirectoryLookupError::NotFound {
            name: record_name.to_string(),
            kind: "TXT",
        }))
    }

    async fn lookup_candidates(&self) -> Result<Vec<ServerCandidate>, DirectoryLookupError> {
        let resolved = match self.dns.addresses(&self.hostname).await {
            Ok(addresses) => addresses,
            Err(error) if !self.fallback_mirrors.is_empty() => {
                warn!(%error, "source hostname lookup failed; using fallback mirrors only");
                Vec::new()
            }
            Err(error) => return Err(error),
        };

        let mut candidates: Vec<ServerCandidate> = Vec::new();
        let resolved = resolved
            .into_iter()
            .map(|ip| ServerCandidate::from_address(ip, self.port, &self.hostname));
        for candidate in resolved.chain(self.fallback_mirrors.iter().cloned()) {
            if !candidates.contains(&candidate) {
                candidates.push(candidate);
            }
        }

        if candidates.is_empty() {
            return Err(DirectoryLookupError::NoAddresses {
                host: self.hostname.clone(),
            });
        }
        Ok(candidates)
    }
}
