//! Utility functions

use std::path::{Component, Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Convert a `SystemTime` to nanoseconds since the UNIX epoch.
///
/// Times before the epoch clamp to zero.
pub fn system_time_to_nanos(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

/// Last modification time of `path` in nanoseconds since the UNIX epoch
pub fn modified_time(path: &Path) -> std::io::Result<u64> {
    let modified = std::fs::metadata(path)?.modified()?;
    Ok(system_time_to_nanos(modified))
}

/// Express `path` relative to `root` using forward slashes.
///
/// Relative inputs are taken as already relative to `root`. Returns `None`
/// when an absolute path does not live under `root` or when a relative path
/// escapes it through `..`.
pub fn to_relative_posix(root: &Path, path: &Path) -> Option<PathBuf> {
    let relative = if path.is_absolute() {
        path.strip_prefix(root).ok()?
    } else {
        path
    };

    let mut parts: Vec<String> = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            Component::ParentDir => {
                parts.pop()?;
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    if parts.is_empty() {
        return None;
    }
    Some(PathBuf::from(parts.join("/")))
}

/// Render a path with forward slashes regardless of platform
pub fn posix_string(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
