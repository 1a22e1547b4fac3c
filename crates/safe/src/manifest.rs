//! Manifest store
//!
//! The manifest (`safe.yml`) is the single on-disk record of which files are
//! protected and who may decrypt them. It is discovered by walking up from a
//! starting directory, loaded fully into memory, and rewritten atomically.

use crate::error::{Result, SafeError};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File name searched for during discovery
pub const MANIFEST_FILE_NAME: &str = "safe.yml";

/// In-memory manifest.
///
/// `files` and `overrides` keys are relative to [`Manifest::location`] and
/// always carry the encrypted suffix (e.g. `config/prod.yml.gpg.asc`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    /// Absolute path of the manifest file
    #[serde(skip)]
    path: PathBuf,

    /// Directory containing the manifest
    #[serde(skip)]
    location: PathBuf,

    /// Default decryption audience
    #[serde(default, deserialize_with = "null_as_default")]
    recipients: Vec<String>,

    /// Per-file recipient lists that replace `recipients`
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    overrides: BTreeMap<String, Vec<String>>,

    /// Protected files, serialized in sorted order
    #[serde(default, deserialize_with = "null_as_default")]
    files: BTreeSet<String>,
}

/// Treat an explicit YAML `null` the same as a missing key
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Search `start` and each of its ancestors for a manifest file.
///
/// Returns the path of the first `safe.yml` found, or `None` once the
/// filesystem root has been checked.
#[must_use]
pub fn discover(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(MANIFEST_FILE_NAME))
        .find(|candidate| candidate.is_file())
}

impl Manifest {
    /// Discover and load the manifest governing `start`.
    pub fn load(start: &Path) -> Result<Self> {
        let path = discover(start).ok_or_else(|| SafeError::ConfigNotFound {
            start: start.to_path_buf(),
        })?;
        Self::load_from(&path)
    }

    /// Load a specific manifest file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| SafeError::ConfigRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(|e| SafeError::io(path, e))?
                .join(path)
        };

        let manifest = Self::parse(&content, &path)?;
        debug!(
            "Loaded manifest {} ({} files, {} recipients)",
            path.display(),
            manifest.files.len(),
            manifest.recipients.len()
        );
        Ok(manifest)
    }

    /// Parse and validate manifest content as if it were stored at `path`.
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let mut manifest: Manifest =
            serde_yaml::from_str(content).map_err(|e| SafeError::InvalidConfig {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        if manifest.recipients.is_empty() {
            return Err(SafeError::InvalidConfig {
                path: path.to_path_buf(),
                reason: "no recipients".to_string(),
            });
        }

        if let Some((file, _)) = manifest.overrides.iter().find(|(_, r)| r.is_empty()) {
            return Err(SafeError::InvalidConfig {
                path: path.to_path_buf(),
                reason: format!("override for {file} has no recipients"),
            });
        }

        let location = path
            .parent()
            .ok_or_else(|| SafeError::PathResolution {
                path: path.to_path_buf(),
                reason: "manifest has no parent directory".to_string(),
            })?
            .to_path_buf();

        manifest.path = path.to_path_buf();
        manifest.location = location;
        Ok(manifest)
    }

    /// Persist the manifest.
    ///
    /// Writes to a temp file next to the manifest and renames it into place,
    /// so readers see either the previous or the new content.
    pub fn save(&self) -> Result<()> {
        let yaml = serde_yaml::to_string(self).map_err(|e| SafeError::ConfigWrite {
            path: self.path.clone(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        })?;

        let temp_path = self
            .location
            .join(format!(".{}.tmp-{}", MANIFEST_FILE_NAME, std::process::id()));

        let write_result = (|| -> std::io::Result<()> {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(yaml.as_bytes())?;
            file.sync_all()?;
            Ok(())
        })();

        if let Err(e) = write_result {
            let _ = fs::remove_file(&temp_path);
            return Err(SafeError::ConfigWrite {
                path: self.path.clone(),
                source: e,
            });
        }

        fs::rename(&temp_path, &self.path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            SafeError::ConfigWrite {
                path: self.path.clone(),
                source: e,
            }
        })?;

        info!("Wrote manifest {}", self.path.display());
        Ok(())
    }

    /// Absolute path of the manifest file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory all manifest-relative paths resolve against
    #[must_use]
    pub fn location(&self) -> &Path {
        &self.location
    }

    #[must_use]
    pub fn recipients(&self) -> &[String] {
        &self.recipients
    }

    #[must_use]
    pub fn overrides(&self) -> &BTreeMap<String, Vec<String>> {
        &self.overrides
    }

    #[must_use]
    pub fn files(&self) -> &BTreeSet<String> {
        &self.files
    }

    /// Whether `rel` is listed as protected
    #[must_use]
    pub fn contains(&self, rel: &str) -> bool {
        self.files.contains(rel)
    }

    /// Recipients that may decrypt `rel`.
    ///
    /// An override replaces the default list entirely.
    #[must_use]
    pub fn recipients_for(&self, rel: &str) -> &[String] {
        self.overrides
            .get(rel)
            .map_or(self.recipients.as_slice(), Vec::as_slice)
    }

    /// Start tracking `rel`. Returns `false` if it was already tracked.
    pub fn track(&mut self, rel: &str) -> bool {
        self.files.insert(rel.to_string())
    }

    /// Stop tracking `rel`. Returns `false` if it was not tracked.
    pub fn untrack(&mut self, rel: &str) -> bool {
        self.files.remove(rel)
    }
}
