//! [`DnsLookup`] backed by the system resolver configuration.

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use hickory_resolver::TokioAsyncResolver;
use hickory_resolver::error::{ResolveError, ResolveErrorKind};
use hickory_resolver::system_conf::read_system_conf;
use tracing::{debug, instrument};

use super::{DirectoryLookupError, DnsLookup};

/// Query attempts per name made by the resolver itself.
const RESOLVER_ATTEMPTS: usize = 2;

/// Resolver using `/etc/resolv.conf` with a bounded per-query timeout.
#[derive(Clone)]
pub struct SystemDns {
    resolver: TokioAsyncResolver,
}

impl std::fmt::Debug for SystemDns {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemDns").finish_non_exhaustive()
    }
}

impl SystemDns {
    /// Builds a resolver from the system configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryLookupError::Unavailable`] when the system
    /// configuration cannot be read.
    pub fn from_system_conf(timeout: Duration) -> Result<Self, DirectoryLookupError> {
        let (config, mut options) =
            read_system_conf().map_err(|e| DirectoryLookupError::Unavailable {
                message: e.to_string(),
            })?;
        options.timeout = timeout;
        options.attempts = RESOLVER_ATTEMPTS;
        Ok(Self {
            resolver: TokioAsyncResolver::tokio(config, options),
        })
    }
}

#[async_trait]
impl DnsLookup for SystemDns {
    #[instrument(level = "debug", skip(self))]
    async fn txt(&self, name: &str) -> Result<Vec<String>, DirectoryLookupError> {
        let lookup = self
            .resolver
            .txt_lookup(name)
            .await
            .map_err(|e| map_resolve_error(name, "TXT", &e))?;

        let records: Vec<String> = lookup
            .iter()
            .map(|txt| {
                txt.txt_data()
                    .iter()
                    .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
                    .collect::<String>()
            })
            .collect();
        debug!(count = records.len(), "TXT answer");
        Ok(records)
    }

    #[instrument(level = "debug", skip(self))]
    async fn addresses(&self, host: &str) -> Result<Vec<IpAddr>, DirectoryLookupError> {
        let lookup = self
            .resolver
            .lookup_ip(host)
            .await
            .map_err(|e| map_resolve_error(host, "A/AAAA", &e))?;
        let addresses: Vec<IpAddr> = lookup.iter().collect();
        debug!(count = addresses.len(), "address answer");
        Ok(addresses)
    }
}

fn map_resolve_error(name: &str, kind: &'static str, error: &ResolveError) -> DirectoryLookupError {
    match error.kind() {
        ResolveErrorKind::NoRecordsFound { .. } => DirectoryLookupError::NotFound {
            name: name.to_string(),
            kind,
        },
        ResolveErrorKind::Timeout => DirectoryLookupError::Timeout {
            name: name.to_string(),
        },
        _ => DirectoryLookupError::Query {
            name: name.to_string(),
            message: error.to_string(),
        },
    }
}
