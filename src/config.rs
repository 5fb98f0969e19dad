//! Run configuration.
//!
//! [`MirrorConfig`] is the validated, immutable description of one mirror
//! run. The binary builds it from command-line arguments; tests build it
//! directly with [`MirrorConfig::new`] and struct update syntax.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::directory::{DEFAULT_HTTP_PORT, is_artifact_name};
use crate::download::constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use crate::download::{DEFAULT_BASE_DELAY, DEFAULT_MAX_RETRIES};

/// Default source hostname.
pub const DEFAULT_HOSTNAME: &str = "database.clamav.net";

/// Default directory record name.
pub const DEFAULT_TEXT_RECORD: &str = "current.cvd.clamav.net";

/// Default working directory for staged files.
pub const DEFAULT_WORK_DIR: &str = "/var/spool/sigmirror";

/// Default mirror directory.
pub const DEFAULT_MIRROR_DIR: &str = "/srv/www/clamav";

/// Default lock directory.
pub const DEFAULT_LOCK_DIR: &str = "/var/lock/subsys";

/// Artifacts mirrored when none are configured.
pub const DEFAULT_ARTIFACTS: [&str; 4] = ["main", "daily", "bytecode", "safebrowsing"];

/// Default DNS query timeout in seconds.
pub const DEFAULT_DNS_TIMEOUT_SECS: u64 = 5;

/// Default number of directory lookup passes.
pub const DEFAULT_LOOKUP_ATTEMPTS: u32 = 4;

/// Default pause between directory lookup passes.
pub const DEFAULT_LOOKUP_PAUSE: Duration = Duration::from_secs(5);

/// Upper bound for attempts per candidate.
pub const MAX_ATTEMPTS_LIMIT: u32 = 10;

/// Name of the published copy of the directory record.
pub const DNS_FILE_NAME: &str = "dns.txt";

/// Invalid configuration values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required value is empty.
    #[error("{field} must not be empty")]
    Empty {
        /// Offending field.
        field: &'static str,
    },

    /// An artifact name cannot be used as a file name.
    #[error("invalid artifact name {name:?}: expected a letter followed by letters, digits, '-' or '_'")]
    InvalidArtifact {
        /// Offending name.
        name: String,
    },

    /// The same artifact is listed twice.
    #[error("artifact {name} is listed more than once")]
    DuplicateArtifact {
        /// Offending name.
        name: String,
    },

    /// A fallback mirror is not a bare `host[:port]` authority.
    #[error("invalid fallback mirror {value:?}: expected host[:port] without scheme or path")]
    InvalidMirror {
        /// Offending value.
        value: String,
    },

    /// A numeric value is outside its allowed range.
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        /// Offending field.
        field: &'static str,
        /// Given value.
        value: u64,
        /// Lower bound.
        min: u64,
        /// Upper bound.
        max: u64,
    },
}

/// Everything one run needs to know.
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    /// Source hostname resolved into candidates and sent as `Host`.
    pub hostname: String,
    /// DNS name of the TXT directory record.
    pub text_record: String,
    /// HTTP port for resolved candidates.
    pub port: u16,
    /// Extra `host[:port]` sources tried after the resolved ones.
    pub fallback_mirrors: Vec<String>,
    /// Artifacts to mirror, in processing order.
    pub artifacts: Vec<String>,
    /// Directory for staged files.
    pub work_dir: PathBuf,
    /// Directory served to clients.
    pub mirror_dir: PathBuf,
    /// Directory holding the run lock.
    pub lock_dir: PathBuf,
    /// Owner applied to published files.
    pub user: Option<String>,
    /// Group applied to published files.
    pub group: Option<String>,
    /// Fail the artifact when ownership cannot be applied.
    pub require_ownership: bool,
    /// Attempts per candidate, including the first.
    pub max_attempts: u32,
    /// Base delay of the per-candidate backoff.
    pub retry_base_delay: Duration,
    /// HTTP connect timeout.
    pub connect_timeout: Duration,
    /// HTTP total request timeout.
    pub read_timeout: Duration,
    /// DNS query timeout.
    pub dns_timeout: Duration,
    /// Directory lookup passes before giving up.
    pub lookup_attempts: u32,
    /// Pause between directory lookup passes.
    pub lookup_pause: Duration,
    /// Accept payloads older than the local copy.
    pub allow_downgrade: bool,
    /// Publish the raw directory record as `dns.txt`.
    pub write_dns_file: bool,
}

impl MirrorConfig {
    /// Default configuration with the given directories.
    #[must_use]
    pub fn new(
        work_dir: impl Into<PathBuf>,
        mirror_dir: impl Into<PathBuf>,
        lock_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            hostname: DEFAULT_HOSTNAME.to_string(),
            text_record: DEFAULT_TEXT_RECORD.to_string(),
            port: DEFAULT_HTTP_PORT,
            fallback_mirrors: Vec::new(),
            artifacts: DEFAULT_ARTIFACTS.iter().map(ToString::to_string).collect(),
            work_dir: work_dir.into(),
            mirror_dir: mirror_dir.into(),
            lock_dir: lock_dir.into(),
            user: None,
            group: None,
            require_ownership: false,
            max_attempts: DEFAULT_MAX_RETRIES,
            retry_base_delay: DEFAULT_BASE_DELAY,
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(READ_TIMEOUT_SECS),
            dns_timeout: Duration::from_secs(DEFAULT_DNS_TIMEOUT_SECS),
            lookup_attempts: DEFAULT_LOOKUP_ATTEMPTS,
            lookup_pause: DEFAULT_LOOKUP_PAUSE,
            allow_downgrade: false,
            write_dns_file: true,
        }
    }

    /// Checks the values that clap cannot check on its own.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hostname.trim().is_empty() {
            return Err(ConfigError::Empty { field: "hostname" });
        }
        if self.text_record.trim().is_empty() {
            return Err(ConfigError::Empty {
                field: "text record",
            });
        }
        if self.artifacts.is_empty() {
            return Err(ConfigError::Empty { field: "artifacts" });
        }
        for (index, name) in self.artifacts.iter().enumerate() {
            if !is_artifact_name(name) {
                return Err(ConfigError::InvalidArtifact { name: name.clone() });
            }
            if self.artifacts[..index].contains(name) {
                return Err(ConfigError::DuplicateArtifact { name: name.clone() });
            }
        }
        for mirror in &self.fallback_mirrors {
            if mirror.trim().is_empty() {
                return Err(ConfigError::Empty {
                    field: "fallback mirror",
                });
            }
            if mirror.contains("://") || mirror.contains('/') {
                return Err(ConfigError::InvalidMirror {
                    value: mirror.clone(),
                });
            }
        }
        check_range("max attempts", self.max_attempts, 1, MAX_ATTEMPTS_LIMIT)?;
        check_range("lookup attempts", self.lookup_attempts, 1, MAX_ATTEMPTS_LIMIT)?;
        if self.port == 0 {
            return Err(ConfigError::OutOfRange {
                field: "port",
                value: 0,
                min: 1,
                max: u64::from(u16::MAX),
            });
        }
        Ok(())
    }
}

fn check_range(field: &'static str, value: u32, min: u32, max: u32) -> Result<(), ConfigError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value: value.into(),
            min: min.into(),
            max: max.into(),
        })
    }
}
