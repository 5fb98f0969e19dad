//! User-Agent string sent with every artifact request.

/// Project URL for User-Agent identification (RFC 9308).
const PROJECT_UA_URL: &str = "https://github.com/fierce/sigmirror";

/// Default User-Agent for artifact downloads (identifies the tool and its role).
#[must_use]
pub(crate) fn default_download_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("sigmirror/{version} (signature-mirror; +{PROJECT_UA_URL})")
}
