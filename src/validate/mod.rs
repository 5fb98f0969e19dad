//! Artifact validation.
//!
//! [`ArtifactValidator::validate`] is the gate every downloaded payload must
//! pass before it may be staged. It is pure: it only inspects bytes that were
//! already fully received, plus the advertised and previously mirrored
//! versions handed to it by the caller.

mod cvd;

use std::fmt;

use md5::{Digest, Md5};
use serde::Serialize;
use tracing::debug;

pub use cvd::{CVD_HEADER_LEN, CVD_MAGIC, CvdHeader, read_local_header};

/// Why a payload was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum InvalidReason {
    /// The payload is not a well-formed container.
    Malformed {
        /// What failed to parse or verify.
        detail: String,
    },
    /// The payload is well-formed but older than required.
    Stale {
        /// Version found in the payload header.
        found: u32,
        /// Minimum acceptable version.
        required: u32,
    },
}

impl InvalidReason {
    fn malformed(detail: impl Into<String>) -> Self {
        Self::Malformed {
            detail: detail.into(),
        }
    }
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed { detail } => write!(f, "malformed: {detail}"),
            Self::Stale { found, required } => {
                write!(f, "stale: version {found} is older than {required}")
            }
        }
    }
}

/// Outcome of validating one payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    /// The payload may be staged.
    Valid(CvdHeader),
    /// The payload must be discarded.
    Invalid(InvalidReason),
}

/// Structural and freshness checks for downloaded artifacts.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArtifactValidator {
    allow_downgrade: bool,
}

impl ArtifactValidator {
    /// Creates a validator. With `allow_downgrade`, a payload older than the
    /// local copy is accepted as long as it still matches the advertised version.
    #[must_use]
    pub fn new(allow_downgrade: bool) -> Self {
        Self { allow_downgrade }
    }

    /// Validates `bytes` against the advertised version and the version
    /// currently mirrored locally.
    #[must_use]
    pub fn validate(
        &self,
        bytes: &[u8],
        expected_version: Option<u32>,
        previous_local_version: Option<u32>,
    ) -> Validation {
        if bytes.is_empty() {
            return Validation::Invalid(InvalidReason::malformed("empty payload"));
        }

        let header = match CvdHeader::parse(bytes) {
            Ok(header) => header,
            Err(detail) => return Validation::Invalid(InvalidReason::malformed(detail)),
        };

        let body = &bytes[CVD_HEADER_LEN..];
        if body.is_empty() {
            return Validation::Invalid(InvalidReason::malformed("header without body"));
        }
        let digest = hex_digest(body);
        if digest != header.md5 {
            return Validation::Invalid(InvalidReason::malformed(format!(
                "body digest {digest} does not match header digest {}",
                header.md5
            )));
        }

        if let Some(required) = expected_version
            && header.version < required
        {
            return Validation::Invalid(InvalidReason::Stale {
                found: header.version,
                required,
            });
        }

        if let Some(required) = previous_local_version
            && header.version < required
            && !self.allow_downgrade
        {
            return Validation::Invalid(InvalidReason::Stale {
                found: header.version,
                required,
            });
        }

        debug!(
            version = header.version,
            signatures = header.signatures,
            "payload validated"
        );
        Validation::Valid(header)
    }
}

fn hex_digest(body: &[u8]) -> String {
    format!("{:x}", Md5::digest(body))
}
