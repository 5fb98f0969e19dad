//! Source server candidates.

use std::fmt;
use std::net::{IpAddr, SocketAddr};

use serde::Serialize;

/// Port used when a candidate authority carries none.
pub const DEFAULT_HTTP_PORT: u16 = 80;

/// One source server eligible to serve artifacts for the current run.
///
/// Candidates built from resolved addresses keep the source hostname so the
/// request still carries the virtual host the mirror expects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ServerCandidate {
    authority: String,
    host: Option<String>,
}

impl ServerCandidate {
    /// Candidate for a resolved address of `hostname`.
    #[must_use]
    pub fn from_address(ip: IpAddr, port: u16, hostname: &str) -> Self {
        let host = if port == DEFAULT_HTTP_PORT {
            hostname.to_string()
        } else {
            format!("{hostname}:{port}")
        };
        Self {
            authority: SocketAddr::new(ip, port).to_string(),
            host: Some(host),
        }
    }

    /// Candidate for a literal `host[:port]` authority, used as-is.
    #[must_use]
    pub fn from_authority(authority: impl Into<String>) -> Self {
        Self {
            authority: authority.into(),
            host: None,
        }
    }

    /// The `host:port` part of request URLs.
    #[must_use]
    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// `Host` header override, when the authority is a bare address.
    #[must_use]
    pub fn host_header(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// URL of `file_name` on this candidate.
    #[must_use]
    pub fn url_for(&self, file_name: &str) -> String {
        format!("http://{}/{}", self.authority, file_name)
    }
}

impl fmt::Display for ServerCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.authority)
    }
}
