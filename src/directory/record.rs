//! Directory record parsing.
//!
//! The directory TXT record advertises the current version of every artifact.
//! Two layouts are understood:
//!
//! - **pairs**: whitespace-separated `name:version` tokens
//!   (`main:62 daily:27000 bytecode:334`)
//! - **positional**: one colon-separated token as published for the ClamAV
//!   tree (`0.103.8:62:27000:1678000000:1:90:49191:334`), where fields 1, 2,
//!   6 and 7 are the `main`, `daily`, `safebrowsing` and `bytecode` versions

use std::collections::BTreeMap;

use serde::Serialize;

/// Artifact names carried by the positional layout, with their field index.
const POSITIONAL_FIELDS: [(&str, usize); 4] =
    [("main", 1), ("daily", 2), ("safebrowsing", 6), ("bytecode", 7)];

/// Minimum number of fields in a positional record.
const POSITIONAL_MIN_FIELDS: usize = 8;

/// Parsed directory record: advertised version per artifact plus the raw text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryRecord {
    raw: String,
    versions: BTreeMap<String, u32>,
}

impl DirectoryRecord {
    /// Parses a TXT payload.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when the payload matches neither layout.
    pub fn parse(payload: &str) -> Result<Self, String> {
        let trimmed = payload.trim();
        if trimmed.is_empty() {
            return Err("empty payload".to_string());
        }

        let tokens: Vec<&str> = trimmed.split_whitespace().collect();
        let versions = if tokens.len() == 1 && tokens[0].split(':').count() >= POSITIONAL_MIN_FIELDS
        {
            parse_positional(tokens[0])?
        } else {
            parse_pairs(&tokens)?
        };

        Ok(Self {
            raw: trimmed.to_string(),
            versions,
        })
    }

    /// Advertised version for `artifact`, if the record lists it.
    #[must_use]
    pub fn version(&self, artifact: &str) -> Option<u32> {
        self.versions.get(artifact).copied()
    }

    /// All advertised versions, ordered by artifact name.
    #[must_use]
    pub fn versions(&self) -> &BTreeMap<String, u32> {
        &self.versions
    }

    /// The trimmed record text as received.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

fn parse_positional(token: &str) -> Result<BTreeMap<String, u32>, String> {
    let fields: Vec<&str> = token.split(':').collect();
    let mut versions = BTreeMap::new();
    for (name, index) in POSITIONAL_FIELDS {
        let version = parse_version(fields[index])
            .ok_or_else(|| format!("field {index} ({name}) is not a version: {:?}", fields[index]))?;
        versions.insert(name.to_string(), version);
    }
    Ok(versions)
}

fn parse_pairs(tokens: &[&str]) -> Result<BTreeMap<String, u32>, String> {
    let mut versions = BTreeMap::new();
    for token in tokens {
        let Some((name, version)) = token.split_once(':') else {
            return Err(format!("token {token:?} is not name:version"));
        };
        if !is_artifact_name(name) {
            return Err(format!("token {token:?} has an invalid artifact name"));
        }
        let version =
            parse_version(version).ok_or_else(|| format!("token {token:?} has no numeric version"))?;
        if versions.insert(name.to_string(), version).is_some() {
            return Err(format!("artifact {name} listed twice"));
        }
    }
    Ok(versions)
}

fn parse_version(field: &str) -> Option<u32> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse().ok()
}

/// Artifact names start with a letter and use `[A-Za-z0-9_-]`.
#[must_use]
pub fn is_artifact_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
