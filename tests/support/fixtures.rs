//! Shared fixtures: CVD payload builder, static DNS, candidate helpers.

use std::net::{IpAddr, Ipv4Addr};

use async_trait::async_trait;
use md5::{Digest, Md5};
use sigmirror_core::directory::{DirectoryLookupError, DnsLookup, ServerCandidate};
use wiremock::MockServer;

/// Hostname used for every resolved candidate in tests.
pub const TEST_HOSTNAME: &str = "db.example.net";

/// Directory record name used in tests.
pub const TEST_RECORD: &str = "current.cvd.example.net";

/// Builds a well-formed CVD payload with the given version and body.
pub fn cvd(version: u32, body: &[u8]) -> Vec<u8> {
    let digest = format!("{:x}", Md5::digest(body));
    let text = format!(
        "ClamAV-VDB:14 Mar 2024 07-24 -0400:{version}:2039522:90:{digest}:signature:builder:1710415464"
    );
    let mut bytes = text.into_bytes();
    bytes.resize(512, b' ');
    bytes.extend_from_slice(body);
    bytes
}

/// Builds a CVD whose header digest does not match its body.
pub fn corrupted_cvd(version: u32) -> Vec<u8> {
    let mut bytes = cvd(version, b"original signature body");
    let last = bytes.len() - 1;
    bytes[last] ^= 0xff;
    bytes
}

/// Candidate pointing at `server` and carrying the test hostname as `Host`.
pub fn candidate_for(server: &MockServer) -> ServerCandidate {
    let address = server.address();
    ServerCandidate::from_address(address.ip(), address.port(), TEST_HOSTNAME)
}

/// Literal `127.0.0.1:<port>` authority for `server`, as a fallback mirror.
pub fn authority_of(server: &MockServer) -> String {
    format!("127.0.0.1:{}", server.address().port())
}

/// DNS answering from fixed data.
#[derive(Debug, Clone)]
pub struct StaticDns {
    pub txt: Vec<String>,
    pub addresses: Vec<IpAddr>,
}

impl StaticDns {
    /// Publishes `record` and resolves the hostname to 127.0.0.1.
    pub fn localhost(record: &str) -> Self {
        Self {
            txt: vec![record.to_string()],
            addresses: vec![IpAddr::V4(Ipv4Addr::LOCALHOST)],
        }
    }

    /// Answers no TXT record at all.
    pub fn without_record() -> Self {
        Self {
            txt: Vec::new(),
            addresses: vec![IpAddr::V4(Ipv4Addr::LOCALHOST)],
        }
    }
}

#[async_trait]
impl DnsLookup for StaticDns {
    async fn txt(&self, name: &str) -> Result<Vec<String>, DirectoryLookupError> {
        if self.txt.is_empty() {
            return Err(DirectoryLookupError::NotFound {
                name: name.to_string(),
                kind: "TXT",
            });
        }
        Ok(self.txt.clone())
    }

    async fn addresses(&self, host: &str) -> Result<Vec<IpAddr>, DirectoryLookupError> {
        if self.addresses.is_empty() {
            return Err(DirectoryLookupError::NotFound {
                name: host.to_string(),
                kind: "A/AAAA",
            });
        }
        Ok(self.addresses.clone())
    }
}
