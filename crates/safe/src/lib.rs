//! safe - gpg-encrypted files tracked in a versioned manifest
//!
//! This library keeps three pieces of state consistent: the plaintext working
//! copy of a file, its encrypted artifact (`<name>.gpg.asc`), and the
//! `safe.yml` manifest recording which files are protected and who may
//! decrypt them.
//!
//! # Overview
//!
//! The encryption tool, version control, and editor are external services
//! behind the [`Cipher`], [`Vcs`] and [`Editor`] traits. [`Lifecycle`]
//! composes them into the protect / edit / remove / re-encrypt transitions,
//! ordering each step so an interrupted operation can be repaired by running
//! it again.
//!
//! # Example
//!
//! ```no_run
//! use safe::{CommandLine, Git, Gpg, Lifecycle, Manifest, SystemEditor};
//! use std::path::Path;
//!
//! fn main() -> safe::Result<()> {
//!     let cwd = std::env::current_dir().expect("cwd");
//!     let manifest = Manifest::load(&cwd)?;
//!     let git = Git::in_dir(manifest.location());
//!
//!     let mut engine = Lifecycle::new(
//!         manifest,
//!         Box::new(Gpg::new(CommandLine::new("gpg"))),
//!         Box::new(git),
//!         Box::new(SystemEditor::from_env()),
//!         &cwd,
//!     );
//!
//!     // Encrypts notes.md to notes.md.gpg.asc and deletes the plaintext
//!     engine.protect(Path::new("notes.md"), true)?;
//!     Ok(())
//! }
//! ```

pub mod cipher;
pub mod editor;
pub mod env;
pub mod error;
pub mod lifecycle;
pub mod manifest;
pub mod process;
pub mod protection;
pub mod vcs;

#[cfg(test)]
mod testing;

// Re-exports for convenience
pub use cipher::{Cipher, CipherGateway, Gpg, ScratchFile};
pub use editor::{Editor, SystemEditor};
pub use env::EnvValue;
pub use error::{Result, SafeError};
pub use lifecycle::{EditOutcome, Lifecycle, Target, TrackedFile};
pub use manifest::{discover, Manifest, MANIFEST_FILE_NAME};
pub use process::CommandLine;
pub use protection::{is_protected, ENCRYPTED_SUFFIX};
pub use vcs::{commit_message, Action, Git, Vcs};
