//! Constants for the download module (timeouts, staging).

/// Default HTTP connect timeout (10 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default total request timeout (60 seconds; daily databases are tens of MB).
pub const READ_TIMEOUT_SECS: u64 = 60;

/// Suffix appended to the artifact filename while it sits in the working directory.
pub const STAGED_SUFFIX: &str = "staged";
