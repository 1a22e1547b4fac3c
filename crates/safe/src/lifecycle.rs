//! Lifecycle engine
//!
//! Every operation that changes protection state goes through [`Lifecycle`].
//! It is the only component that writes both the filesystem and the
//! manifest, and it orders those writes so that an interrupted operation
//! leaves a state that re-running the same operation repairs:
//!
//! - `protect`: encrypt, record in the manifest, then delete the plaintext.
//!   A crash before the manifest write leaves plaintext and an untracked
//!   ciphertext, and protecting again overwrites the ciphertext.
//! - `remove`: delete the ciphertext, then drop it from the manifest. A
//!   crash in between leaves a tracked entry without a file, and removing
//!   again tolerates the missing file.
//! - `reencrypt_all`: one transaction per file, so a failure leaves earlier
//!   files done and later ones untouched.

use crate::cipher::{Cipher, CipherGateway};
use crate::editor::Editor;
use crate::env;
use crate::error::{Result, SafeError};
use crate::manifest::Manifest;
use crate::process::{exit_code, resolve_program};
use crate::protection::{self, absolutize, ensure_suffix, relative_to, trim_suffix};
use crate::vcs::{commit_message, Action, Vcs};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Locations of one logical file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Absolute plaintext path (no suffix)
    pub plaintext: PathBuf,
    /// Absolute encrypted path (with suffix)
    pub ciphertext: PathBuf,
    /// Manifest-relative encrypted path, as stored in `files`
    pub rel: String,
}

/// Result of an edit session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    /// Content was byte-identical after the editor exited; nothing written
    Unchanged,
    /// Content changed and was encrypted
    Saved,
}

/// A tracked file as reported by [`Lifecycle::list`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackedFile {
    /// Manifest-relative encrypted path
    pub path: String,
    /// Effective recipients
    pub recipients: Vec<String>,
    /// Whether the recipients come from an override
    pub overridden: bool,
    /// Whether the encrypted file exists on disk
    pub present: bool,
}

/// Protected-file lifecycle engine bound to one manifest
pub struct Lifecycle {
    manifest: Manifest,
    gateway: CipherGateway,
    vcs: Box<dyn Vcs>,
    editor: Box<dyn Editor>,
    /// Directory relative target paths resolve against
    workdir: PathBuf,
    scratch_dir: PathBuf,
}

impl Lifecycle {
    pub fn new(
        manifest: Manifest,
        cipher: Box<dyn Cipher>,
        vcs: Box<dyn Vcs>,
        editor: Box<dyn Editor>,
        workdir: &Path,
    ) -> Self {
        Self {
            manifest,
            gateway: CipherGateway::new(cipher),
            vcs,
            editor,
            workdir: workdir.to_path_buf(),
            scratch_dir: std::env::temp_dir(),
        }
    }

    /// Use `dir` for scratch plaintext instead of the system temp directory
    #[must_use]
    pub fn with_scratch_dir(mut self, dir: PathBuf) -> Self {
        self.scratch_dir = dir;
        self
    }

    #[must_use]
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Resolve a user-supplied path, with or without the suffix
    pub fn target(&self, path: &Path) -> Result<Target> {
        let ciphertext = ensure_suffix(&absolutize(path, &self.workdir)?);
        let rel = relative_to(&ciphertext, self.manifest.location())?;
        Ok(Target {
            plaintext: trim_suffix(&ciphertext),
            ciphertext,
            rel,
        })
    }

    /// Whether `path` is listed in the manifest (exact match, no suffix added)
    pub fn is_protected(&self, path: &Path) -> Result<bool> {
        protection::is_protected(path, &self.workdir, &self.manifest)
    }

    /// Encrypt a plaintext file, track it, and delete the plaintext.
    pub fn protect(&mut self, path: &Path, commit: bool) -> Result<Target> {
        let target = self.target(path)?;
        if self.manifest.contains(&target.rel) {
            if target.plaintext.exists() {
                warn!(
                    "Plaintext {} still exists next to its protected copy",
                    target.plaintext.display()
                );
            }
            return Err(SafeError::AlreadyProtected(target.plaintext));
        }

        let plaintext =
            fs::read(&target.plaintext).map_err(|e| SafeError::io(&target.plaintext, e))?;
        self.gateway
            .encrypt(&self.manifest, &target.rel, &target.ciphertext, &plaintext)?;
        self.record(&target.rel)?;

        fs::remove_file(&target.plaintext).map_err(|e| SafeError::io(&target.plaintext, e))?;
        info!("Protected {}", target.rel);

        if commit {
            self.commit(
                Action::Protect,
                &target.rel,
                vec![
                    self.manifest.path().to_path_buf(),
                    target.plaintext.clone(),
                    target.ciphertext.clone(),
                ],
            )?;
        }
        Ok(target)
    }

    /// Edit a protected file through a scratch copy, creating it if new.
    ///
    /// Leaving the content byte-identical is a no-op: no encryption, no
    /// manifest write, no commit.
    pub fn edit(&mut self, path: &Path, commit: bool) -> Result<EditOutcome> {
        let target = self.target(path)?;

        let scratch = if target.ciphertext.exists() {
            self.gateway
                .decrypt_to_scratch(&target.ciphertext, &self.scratch_dir)?
        } else {
            debug!("{} does not exist yet, starting empty", target.rel);
            self.gateway
                .empty_scratch(&target.ciphertext, &self.scratch_dir)?
        };

        self.editor.edit(scratch.path())?;
        let edited = scratch.read()?;
        let unchanged = edited == scratch.original();
        drop(scratch);

        if unchanged {
            info!("No changes to {}", target.rel);
            return Ok(EditOutcome::Unchanged);
        }

        self.encrypt_and_record(&target, &edited, Action::Edit, commit)?;
        Ok(EditOutcome::Saved)
    }

    /// Delete a protected file and stop tracking it.
    pub fn remove(&mut self, path: &Path, commit: bool) -> Result<()> {
        let target = self.target(path)?;
        if !self.manifest.contains(&target.rel) {
            return Err(SafeError::NotProtected(target.ciphertext));
        }

        match fs::remove_file(&target.ciphertext) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("{} was already deleted", target.ciphertext.display());
            }
            Err(e) => return Err(SafeError::io(&target.ciphertext, e)),
        }

        self.manifest.untrack(&target.rel);
        if let Err(e) = self.manifest.save() {
            self.manifest.track(&target.rel);
            return Err(e);
        }
        info!("Removed {}", target.rel);

        if commit {
            self.commit(
                Action::Remove,
                &target.rel,
                vec![target.ciphertext.clone(), self.manifest.path().to_path_buf()],
            )?;
        }
        Ok(())
    }

    /// Decrypt and re-encrypt every tracked file with its current recipients.
    ///
    /// Each file is its own transaction (and commit, when requested). Stops at
    /// the first failure. Returns the number of files re-encrypted.
    pub fn reencrypt_all(&mut self, commit: bool) -> Result<usize> {
        let files: Vec<String> = self.manifest.files().iter().cloned().collect();

        for rel in &files {
            let ciphertext = self.manifest.location().join(rel);
            let plaintext = self.gateway.decrypt(&ciphertext)?;
            let target = Target {
                plaintext: trim_suffix(&ciphertext),
                ciphertext,
                rel: rel.clone(),
            };
            self.encrypt_and_record(&target, &plaintext, Action::Reencrypt, commit)?;
            info!("Re-encrypted {}", rel);
        }

        Ok(files.len())
    }

    /// Environment overlay projected from a protected YAML file
    pub fn env_overlay(&self, path: &Path) -> Result<BTreeMap<String, String>> {
        let target = self.target(path)?;
        if !self.manifest.contains(&target.rel) {
            return Err(SafeError::NotProtected(target.ciphertext));
        }
        if !env::is_structured(&target.ciphertext) {
            return Err(SafeError::UnsupportedFormat {
                path: target.ciphertext,
                reason: format!(
                    "only {} files can be exported",
                    env::STRUCTURED_EXTENSIONS
                        .iter()
                        .map(|ext| format!(".{ext}"))
                        .collect::<Vec<_>>()
                        .join("/")
                ),
            });
        }

        let plaintext = self.gateway.decrypt(&target.ciphertext)?;
        let entries = env::parse_document(&target.ciphertext, &plaintext)?;
        Ok(env::overlay(&entries))
    }

    /// Run `command` with the variables from a protected YAML file.
    ///
    /// The variables are given to the child only; this process's environment
    /// is not modified. Standard streams are inherited. Returns the child's
    /// exit code.
    pub fn exec(&self, path: &Path, command: &[String]) -> Result<i32> {
        let (program, args) = command.split_first().ok_or(SafeError::NoCommand)?;
        let overlay = self.env_overlay(path)?;
        let resolved = resolve_program(program)?;

        info!(
            "Executing {} {:?} with {} exported variables",
            resolved.display(),
            args,
            overlay.len()
        );

        let status = Command::new(&resolved)
            .args(args)
            .envs(&overlay)
            .current_dir(&self.workdir)
            .status()
            .map_err(SafeError::CommandExecution)?;

        Ok(exit_code(status))
    }

    /// Every protected file under `dir`, in walk order
    pub fn find(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let root = absolutize(dir, &self.workdir)?;
        let mut found = Vec::new();

        let walker = WalkDir::new(&root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.file_name() != ".git");

        for entry in walker {
            let entry = entry.map_err(|e| {
                let path = e.path().map_or_else(|| root.clone(), Path::to_path_buf);
                SafeError::io(path, e.into())
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if protection::is_protected(entry.path(), &self.workdir, &self.manifest)? {
                found.push(entry.into_path());
            }
        }

        Ok(found)
    }

    /// Decrypted content of a protected file
    pub fn reveal(&self, path: &Path) -> Result<Vec<u8>> {
        let target = self.target(path)?;
        if !self.manifest.contains(&target.rel) {
            return Err(SafeError::NotProtected(target.ciphertext));
        }
        self.gateway.decrypt(&target.ciphertext)
    }

    /// Tracked files with their effective recipients
    #[must_use]
    pub fn list(&self) -> Vec<TrackedFile> {
        self.manifest
            .files()
            .iter()
            .map(|rel| TrackedFile {
                path: rel.clone(),
                recipients: self.manifest.recipients_for(rel).to_vec(),
                overridden: self.manifest.overrides().contains_key(rel),
                present: self.manifest.location().join(rel).is_file(),
            })
            .collect()
    }

    /// Track `rel` and persist, leaving memory untouched if the write fails
    fn record(&mut self, rel: &str) -> Result<()> {
        let newly_tracked = self.manifest.track(rel);
        if let Err(e) = self.manifest.save() {
            if newly_tracked {
                self.manifest.untrack(rel);
            }
            return Err(e);
        }
        Ok(())
    }

    fn encrypt_and_record(
        &mut self,
        target: &Target,
        plaintext: &[u8],
        action: Action,
        commit: bool,
    ) -> Result<()> {
        self.gateway
            .encrypt(&self.manifest, &target.rel, &target.ciphertext, plaintext)?;
        self.record(&target.rel)?;

        if commit {
            self.commit(
                action,
                &target.rel,
                vec![target.ciphertext.clone(), self.manifest.path().to_path_buf()],
            )?;
        }
        Ok(())
    }

    fn commit(&self, action: Action, rel: &str, paths: Vec<PathBuf>) -> Result<()> {
        self.vcs.stage_and_commit(&paths, &commit_message(action, rel))
    }
}
