//! ClamAV CVD container header.
//!
//! A CVD file starts with a 512-byte ASCII header padded with spaces:
//!
//! ```text
//! ClamAV-VDB:<build time>:<version>:<signatures>:<f-level>:<md5>:<dsig>:<builder>[:<stime>]
//! ```
//!
//! followed by the compressed signature archive. The `md5` field is the
//! digest of everything after the header.

use std::path::Path;

use serde::Serialize;
use tokio::io::AsyncReadExt;

/// Size of the fixed header block.
pub const CVD_HEADER_LEN: usize = 512;

/// Leading header field identifying the container.
pub const CVD_MAGIC: &str = "ClamAV-VDB";

const MIN_FIELDS: usize = 8;
const MD5_HEX_LEN: usize = 32;

/// Fields extracted from a CVD header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CvdHeader {
    /// Human-readable build timestamp.
    pub build_time: String,
    /// Database version.
    pub version: u32,
    /// Number of signatures.
    pub signatures: u64,
    /// Minimum engine functionality level.
    pub functionality_level: u32,
    /// Lower-case hex MD5 of the body.
    pub md5: String,
    /// Name of the builder.
    pub builder: String,
}

impl CvdHeader {
    /// Parses the first [`CVD_HEADER_LEN`] bytes of `bytes`.
    ///
    /// # Errors
    ///
    /// Returns a reason string when the header is short, not ASCII, lacks the
    /// magic, or carries non-numeric fields.
    pub fn parse(bytes: &[u8]) -> Result<Self, String> {
        if bytes.len() < CVD_HEADER_LEN {
            return Err(format!(
                "payload of {} bytes is shorter than the {CVD_HEADER_LEN}-byte header",
                bytes.len()
            ));
        }
        let block = &bytes[..CVD_HEADER_LEN];
        if !block.is_ascii() {
            return Err("header is not ASCII".to_string());
        }
        let text = String::from_utf8_lossy(block);
        let text = text.trim_end_matches([' ', '\0', '\n']);

        let fields: Vec<&str> = text.split(':').collect();
        if fields[0] != CVD_MAGIC {
            return Err(format!("missing {CVD_MAGIC} magic"));
        }
        if fields.len() < MIN_FIELDS {
            return Err(format!(
                "header has {} fields, expected at least {MIN_FIELDS}",
                fields.len()
            ));
        }

        let version = fields[2]
            .trim()
            .parse()
            .map_err(|_| format!("version field {:?} is not numeric", fields[2]))?;
        let signatures = fields[3]
            .trim()
            .parse()
            .map_err(|_| format!("signature count {:?} is not numeric", fields[3]))?;
        let functionality_level = fields[4]
            .trim()
            .parse()
            .map_err(|_| format!("functionality level {:?} is not numeric", fields[4]))?;

        let md5 = fields[5].trim().to_ascii_lowercase();
        if md5.len() != MD5_HEX_LEN || !md5.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(format!("md5 field {:?} is not a hex digest", fields[5]));
        }

        Ok(Self {
            build_time: fields[1].trim().to_string(),
            version,
            signatures,
            functionality_level,
            md5,
            builder: fields[7].trim().to_string(),
        })
    }
}

/// Reads the header of an already mirrored file.
///
/// Returns `None` when the file is missing, short, or not a CVD; the caller
/// treats that as "nothing mirrored yet".
pub async fn read_local_header(path: &Path) -> Option<CvdHeader> {
    let mut file = tokio::fs::File::open(path).await.ok()?;
    let mut block = vec![0u8; CVD_HEADER_LEN];
    file.read_exact(&mut block).await.ok()?;
    CvdHeader::parse(&block).ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn header(text: &str) -> Vec<u8> {
        let mut bytes = text.as_bytes().to_vec();
        bytes.resize(CVD_HEADER_LEN, b' ');
        bytes
    }

    const DIGEST: &str = "0123456789abcdef0123456789ABCDEF";

    #[test]
    fn test_parse_valid_header() {
        let bytes = header(&format!(
            "ClamAV-VDB:14 Mar 2023 07-24 -0400:27000:2039522:90:{DIGEST}:sig:builder:1678793064"
        ));
        let parsed = CvdHeader::parse(&bytes).unwrap();
        assert_eq!(parsed.version, 27000);
        assert_eq!(parsed.signatures, 2_039_522);
        assert_eq!(parsed.functionality_level, 90);
        assert_eq!(parsed.md5, DIGEST.to_ascii_lowercase());
        assert_eq!(parsed.builder, "builder");
        assert_eq!(parsed.build_time, "14 Mar 2023 07-24 -0400");
    }

    #[test]
    fn test_parse_rejects_short_payload() {
        let err = CvdHeader::parse(b"ClamAV-VDB:x").unwrap_err();
        assert!(err.contains("shorter"), "{err}");
    }

    #[test]
    fn test_parse_rejects_wrong_magic() {
        let bytes = header(&format!("NotClamAV:t:1:1:90:{DIGEST}:sig:builder"));
        assert!(CvdHeader::parse(&bytes).unwrap_err().contains("magic"));
    }

    #[test]
    fn test_parse_rejects_non_numeric_version() {
        let bytes = header(&format!("ClamAV-VDB:t:abc:1:90:{DIGEST}:sig:builder"));
        assert!(CvdHeader::parse(&bytes).unwrap_err().contains("version"));
    }

    #[test]
    fn test_parse_rejects_bad_digest() {
        let bytes = header("ClamAV-VDB:t:1:1:90:nothex:sig:builder");
        assert!(CvdHeader::parse(&bytes).unwrap_err().contains("md5"));
    }

    #[test]
    fn test_parse_rejects_too_few_fields() {
        let bytes = header("ClamAV-VDB:t:1:1");
        assert!(CvdHeader::parse(&bytes).unwrap_err().contains("fields"));
    }

    #[tokio::test]
    async fn test_read_local_header_missing_file_is_none() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(read_local_header(&dir.path().join("main.cvd")).await.is_none());
    }

    #[tokio::test]
    async fn test_read_local_header_reads_version() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("daily.cvd");
        let mut bytes = header(&format!("ClamAV-VDB:t:41:1:90:{DIGEST}:sig:builder"));
        bytes.extend_from_slice(b"body");
        std::fs::write(&path, bytes).unwrap();
        assert_eq!(read_local_header(&path).await.unwrap().version, 41);
    }
}
