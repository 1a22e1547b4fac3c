//! Cipher gateway
//!
//! The [`Cipher`] trait is the raw contract with the external encryption
//! tool. [`CipherGateway`] layers the lifecycle rules on top of it: existence
//! checks, recipient selection from the manifest, and scratch files for
//! decrypt-edit-encrypt cycles.

use crate::error::{Result, SafeError};
use crate::manifest::Manifest;
use crate::process::{failure_reason, CommandLine};
use crate::protection::trim_suffix;
use std::fs;
use std::io::Write;
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tracing::{debug, warn};

/// External asymmetric encryption service
pub trait Cipher {
    /// Decrypt the file at `path` and return exactly the original payload
    fn decrypt(&self, path: &Path) -> Result<Vec<u8>>;

    /// Encrypt `plaintext` for `recipients`, overwriting `path`
    fn encrypt(&self, path: &Path, plaintext: &[u8], recipients: &[String]) -> Result<()>;
}

/// `gpg` subprocess adapter.
///
/// Plaintext is fed on stdin with one trailing newline appended, and the
/// decrypted output has one trailing newline removed, so payloads round-trip
/// byte for byte. Ciphertext is ASCII armored.
#[derive(Debug, Clone)]
pub struct Gpg {
    command: CommandLine,
}

impl Gpg {
    pub fn new(command: CommandLine) -> Self {
        Self { command }
    }
}

impl Default for Gpg {
    fn default() -> Self {
        Self::new(CommandLine::new("gpg"))
    }
}

/// Append the newline the tool's framing expects
pub(crate) fn frame_plaintext(plaintext: &[u8]) -> Vec<u8> {
    let mut framed = Vec::with_capacity(plaintext.len() + 1);
    framed.extend_from_slice(plaintext);
    framed.push(b'\n');
    framed
}

/// Remove the single trailing newline added by framing
pub(crate) fn unframe_output(mut output: Vec<u8>) -> Vec<u8> {
    if output.last() == Some(&b'\n') {
        output.pop();
    }
    output
}

impl Cipher for Gpg {
    fn decrypt(&self, path: &Path) -> Result<Vec<u8>> {
        debug!("Decrypting {} with {}", path.display(), self.command);

        let output = self
            .command
            .command()?
            .args(["--quiet", "--decrypt"])
            .arg(path)
            .stdin(Stdio::inherit())
            .output()
            .map_err(SafeError::CommandExecution)?;

        if !output.status.success() {
            return Err(SafeError::DecryptFailed {
                path: path.to_path_buf(),
                reason: failure_reason(output.status, &output.stderr),
            });
        }

        Ok(unframe_output(output.stdout))
    }

    fn encrypt(&self, path: &Path, plaintext: &[u8], recipients: &[String]) -> Result<()> {
        debug!(
            "Encrypting {} for {:?} with {}",
            path.display(),
            recipients,
            self.command
        );

        let mut cmd = self.command.command()?;
        cmd.args(["--batch", "--armor", "--encrypt", "--yes", "--output"])
            .arg(path);
        for recipient in recipients {
            cmd.arg("--recipient").arg(recipient);
        }

        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(SafeError::CommandExecution)?;

        // The tool may exit before consuming stdin; its stderr explains why.
        let write_result = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(&frame_plaintext(plaintext)),
            None => Ok(()),
        };

        let output = child
            .wait_with_output()
            .map_err(SafeError::CommandExecution)?;

        if !output.status.success() {
            return Err(SafeError::EncryptFailed {
                path: path.to_path_buf(),
                reason: failure_reason(output.status, &output.stderr),
            });
        }
        write_result.map_err(|e| SafeError::EncryptFailed {
            path: path.to_path_buf(),
            reason: format!("failed to write plaintext: {}", e),
        })
    }
}

/// Deterministic scratch location for the logical file behind `source`
#[must_use]
pub fn scratch_path(source: &Path, scratch_dir: &Path) -> PathBuf {
    let logical = trim_suffix(source);
    let name = logical
        .file_name()
        .map_or_else(|| "unnamed".into(), |n| n.to_string_lossy());
    scratch_dir.join(format!("safe--{}", name))
}

/// Plaintext materialized on disk for the duration of an operation.
///
/// The file is created with mode 0600 and removed when the guard is dropped,
/// on success and error paths alike.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
    original: Vec<u8>,
}

impl ScratchFile {
    /// Write `contents` to `path` and take ownership of its removal
    pub fn create(path: PathBuf, contents: Vec<u8>) -> Result<Self> {
        let write_result = (|| -> std::io::Result<()> {
            let mut file = fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(&path)?;
            // A stale scratch file keeps its old mode; tighten it
            file.set_permissions(fs::Permissions::from_mode(0o600))?;
            file.write_all(&contents)?;
            file.sync_all()
        })();

        if let Err(e) = write_result {
            let _ = fs::remove_file(&path);
            return Err(SafeError::io(&path, e));
        }

        debug!("Created scratch file {}", path.display());
        Ok(Self {
            path,
            original: contents,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Contents written when the scratch file was created
    #[must_use]
    pub fn original(&self) -> &[u8] {
        &self.original
    }

    /// Current contents on disk
    pub fn read(&self) -> Result<Vec<u8>> {
        fs::read(&self.path).map_err(|e| SafeError::io(&self.path, e))
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed scratch file {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Failed to remove scratch file {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}

/// Lifecycle-facing wrapper around a [`Cipher`]
pub struct CipherGateway {
    cipher: Box<dyn Cipher>,
}

impl CipherGateway {
    pub fn new(cipher: Box<dyn Cipher>) -> Self {
        Self { cipher }
    }

    /// Decrypt an existing encrypted file
    pub fn decrypt(&self, path: &Path) -> Result<Vec<u8>> {
        if !path.is_file() {
            return Err(SafeError::CiphertextNotFound(path.to_path_buf()));
        }
        self.cipher.decrypt(path)
    }

    /// Decrypt `path` into its scratch file under `scratch_dir`
    pub fn decrypt_to_scratch(&self, path: &Path, scratch_dir: &Path) -> Result<ScratchFile> {
        let plaintext = self.decrypt(path)?;
        ScratchFile::create(scratch_path(path, scratch_dir), plaintext)
    }

    /// Empty scratch file for a logical file that has no ciphertext yet
    pub fn empty_scratch(&self, path: &Path, scratch_dir: &Path) -> Result<ScratchFile> {
        ScratchFile::create(scratch_path(path, scratch_dir), Vec::new())
    }

    /// Encrypt `plaintext` to `path` for the recipients the manifest assigns to `rel`.
    ///
    /// An override is used verbatim; otherwise the default recipients apply.
    pub fn encrypt(&self, manifest: &Manifest, rel: &str, path: &Path, plaintext: &[u8]) -> Result<()> {
        let recipients = manifest.recipients_for(rel);
        if recipients.is_empty() {
            return Err(SafeError::NoRecipients(rel.to_string()));
        }
        self.cipher.encrypt(path, plaintext, recipients)
    }
}
