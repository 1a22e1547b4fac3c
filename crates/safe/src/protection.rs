//! Protection predicate and the encrypted-suffix convention
//!
//! Deciding whether a path is protected is an exact, flat membership test:
//! the path is made absolute, expressed relative to the manifest directory,
//! and looked up in the manifest's file set. No globbing, no prefixes.

use crate::error::{Result, SafeError};
use crate::manifest::Manifest;
use std::path::{Component, Path, PathBuf};

/// Suffix appended to a plaintext path to name its encrypted artifact
pub const ENCRYPTED_SUFFIX: &str = ".gpg.asc";

/// Whether the file name of `path` carries the encrypted suffix
#[must_use]
pub fn has_suffix(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.len() > ENCRYPTED_SUFFIX.len() && name.ends_with(ENCRYPTED_SUFFIX))
}

/// Return `path` with the encrypted suffix, appending it if missing
#[must_use]
pub fn ensure_suffix(path: &Path) -> PathBuf {
    if has_suffix(path) {
        return path.to_path_buf();
    }
    let mut name = path.as_os_str().to_os_string();
    name.push(ENCRYPTED_SUFFIX);
    PathBuf::from(name)
}

/// Return `path` with the encrypted suffix removed, if present
#[must_use]
pub fn trim_suffix(path: &Path) -> PathBuf {
    match path
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.strip_suffix(ENCRYPTED_SUFFIX))
    {
        Some(stem) if !stem.is_empty() => path.with_file_name(stem),
        _ => path.to_path_buf(),
    }
}

/// Logical (plaintext) name of a manifest-relative entry
#[must_use]
pub fn logical_name(rel: &str) -> &str {
    rel.strip_suffix(ENCRYPTED_SUFFIX).unwrap_or(rel)
}

/// Make `path` absolute against `base` and lexically normalize it.
///
/// `.` components are dropped and `..` pops the previous component. The
/// filesystem is not consulted, so the path need not exist.
pub fn absolutize(path: &Path, base: &Path) -> Result<PathBuf> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else if base.is_absolute() {
        base.join(path)
    } else {
        return Err(SafeError::PathResolution {
            path: path.to_path_buf(),
            reason: format!("base directory {} is not absolute", base.display()),
        });
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::Prefix(_) | Component::RootDir | Component::Normal(_) => {
                normalized.push(component.as_os_str());
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    return Err(SafeError::PathResolution {
                        path: path.to_path_buf(),
                        reason: "climbs above the filesystem root".to_string(),
                    });
                }
            }
        }
    }
    Ok(normalized)
}

/// Express an absolute path relative to `location` using `/` separators.
pub fn relative_to(path: &Path, location: &Path) -> Result<String> {
    let rel = path
        .strip_prefix(location)
        .map_err(|_| SafeError::PathResolution {
            path: path.to_path_buf(),
            reason: format!("outside of {}", location.display()),
        })?;

    let mut parts = Vec::new();
    for component in rel.components() {
        let part = component.as_os_str().to_str().ok_or_else(|| SafeError::PathResolution {
            path: path.to_path_buf(),
            reason: "path is not valid UTF-8".to_string(),
        })?;
        parts.push(part);
    }

    if parts.is_empty() {
        return Err(SafeError::PathResolution {
            path: path.to_path_buf(),
            reason: "refers to the manifest directory itself".to_string(),
        });
    }
    Ok(parts.join("/"))
}

/// Whether `path` is listed in the manifest.
///
/// Paths with no manifest-relative form (outside the manifest directory,
/// the directory itself, non-UTF-8) are never tracked, so they report false.
pub fn is_protected(path: &Path, workdir: &Path, manifest: &Manifest) -> Result<bool> {
    let absolute = absolutize(path, workdir)?;
    Ok(relative_to(&absolute, manifest.location()).is_ok_and(|rel| manifest.contains(&rel)))
}
