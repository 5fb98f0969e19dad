//! User/group ownership for published files.

use std::path::Path;

use serde::Serialize;

/// Owner and group to apply to published files, by name or numeric id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Ownership {
    /// User name or uid.
    pub user: Option<String>,
    /// Group name or gid.
    pub group: Option<String>,
}

impl Ownership {
    /// Returns `None` when neither user nor group is given.
    #[must_use]
    pub fn from_names(user: Option<String>, group: Option<String>) -> Option<Self> {
        if user.is_none() && group.is_none() {
            None
        } else {
            Some(Self { user, group })
        }
    }
}

/// Applies `ownership` to `path`. The error is a human-readable reason.
#[cfg(unix)]
pub(crate) fn apply(path: &Path, ownership: &Ownership) -> Result<(), String> {
    use nix::unistd::{Group, User};

    let uid = match ownership.user.as_deref() {
        None => None,
        Some(name) => Some(match name.parse::<u32>() {
            Ok(id) => id,
            Err(_) => User::from_name(name)
                .map_err(|e| format!("cannot look up user {name}: {e}"))?
                .ok_or_else(|| format!("unknown user {name}"))?
                .uid
                .as_raw(),
        }),
    };
    let gid = match ownership.group.as_deref() {
        None => None,
        Some(name) => Some(match name.parse::<u32>() {
            Ok(id) => id,
            Err(_) => Group::from_name(name)
                .map_err(|e| format!("cannot look up group {name}: {e}"))?
                .ok_or_else(|| format!("unknown group {name}"))?
                .gid
                .as_raw(),
        }),
    };

    std::os::unix::fs::chown(path, uid, gid).map_err(|e| e.to_string())
}

#[cfg(not(unix))]
pub(crate) fn apply(_path: &Path, _ownership: &Ownership) -> Result<(), String> {
    Err("file ownership is not supported on this platform".to_string())
}
