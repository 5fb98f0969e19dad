//! Error types for directory record resolution.

use thiserror::Error;

/// Errors raised while resolving the directory record or the source hostname.
///
/// Every variant is terminal for the run once the coordinator's bounded
/// lookup retries are spent.
#[derive(Debug, Error)]
pub enum DirectoryLookupError {
    /// NXDOMAIN or an empty answer.
    #[error("no {kind} records found for {name}")]
    NotFound {
        /// Queried name.
        name: String,
        /// Record type that was asked for (`TXT`, `A/AAAA`).
        kind: &'static str,
    },

    /// The resolver gave up waiting for an answer.
    #[error("DNS query for {name} timed out")]
    Timeout {
        /// Queried name.
        name: String,
    },

    /// Any other resolver failure (SERVFAIL, malformed response, I/O).
    #[error("DNS query for {name} failed: {message}")]
    Query {
        /// Queried name.
        name: String,
        /// Resolver error text.
        message: String,
    },

    /// The TXT payload does not follow a known directory layout.
    #[error("malformed directory record {name} ({payload:?}): {reason}")]
    Malformed {
        /// Queried name.
        name: String,
        /// Raw payload that failed to parse.
        payload: String,
        /// What was wrong with it.
        reason: String,
    },

    /// The source hostname resolved to no usable address and no fallback mirror exists.
    #[error("source host {host} has no addresses and no fallback mirrors are configured")]
    NoAddresses {
        /// Configured source hostname.
        host: String,
    },

    /// The system resolver configuration could not be loaded.
    #[error("DNS resolver unavailable: {message}")]
    Unavailable {
        /// Underlying error text.
        message: String,
    },
}

impl DirectoryLookupError {
    /// Creates a malformed-payload error.
    pub fn malformed(
        name: impl Into<String>,
        payload: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Malformed {
            name: name.into(),
            payload: payload.into(),
            reason: reason.into(),
        }
    }

    /// Returns true for failures a later lookup pass might not hit again.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::Timeout { .. } | Self::Query { .. }
        )
    }
}
