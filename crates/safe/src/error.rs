//! Error types for the safe library

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while managing protected files
#[derive(Error, Debug)]
pub enum SafeError {
    // Manifest errors
    #[error("No safe.yml found in {start} or any parent directory")]
    ConfigNotFound { start: PathBuf },

    #[error("Invalid manifest {path}: {reason}")]
    InvalidConfig { path: PathBuf, reason: String },

    #[error("Failed to read manifest at {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write manifest to {path}: {source}")]
    ConfigWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    // Path errors
    #[error("Cannot resolve {path}: {reason}")]
    PathResolution { path: PathBuf, reason: String },

    // Lifecycle errors
    #[error("{0} is already protected")]
    AlreadyProtected(PathBuf),

    #[error("{0} is not protected")]
    NotProtected(PathBuf),

    #[error("Encrypted file not found: {0}")]
    CiphertextNotFound(PathBuf),

    #[error("No recipients configured for {0}")]
    NoRecipients(String),

    // External tool errors
    #[error("Failed to decrypt {path}: {reason}")]
    DecryptFailed { path: PathBuf, reason: String },

    #[error("Failed to encrypt {path}: {reason}")]
    EncryptFailed { path: PathBuf, reason: String },

    #[error("Unsupported format for {path}: {reason}")]
    UnsupportedFormat { path: PathBuf, reason: String },

    #[error("Editor '{editor}' failed: {reason}")]
    EditorFailed { editor: String, reason: String },

    #[error("Commit failed: {0}")]
    CommitFailed(String),

    // Command execution errors
    #[error("No command specified")]
    NoCommand,

    #[error("Command execution failed: {0}")]
    CommandExecution(#[source] std::io::Error),

    // I/O errors
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl SafeError {
    /// Wrap an I/O error with the path it occurred on
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SafeError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for safe operations
pub type Result<T> = std::result::Result<T, SafeError>;
