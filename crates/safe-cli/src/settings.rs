//! Environment-driven settings for the external tools

use safe::CommandLine;
use std::path::PathBuf;

/// Overrides the gpg command line (e.g. `gpg2 --homedir /keys`)
pub const GPG_VAR: &str = "SAFE_GPG";
/// Overrides the git command line
pub const GIT_VAR: &str = "SAFE_GIT";
/// Directory for decrypted scratch files
pub const SCRATCH_DIR_VAR: &str = "SAFE_SCRATCH_DIR";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub gpg: CommandLine,
    pub git: CommandLine,
    pub scratch_dir: PathBuf,
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let command = |var: &str, default: &str| {
            lookup(var)
                .and_then(|value| CommandLine::parse(&value))
                .unwrap_or_else(|| CommandLine::new(default))
        };

        let scratch_dir = lookup(SCRATCH_DIR_VAR)
            .filter(|value| !value.trim().is_empty())
            .map_or_else(std::env::temp_dir, PathBuf::from);

        Self {
            gpg: command(GPG_VAR, "gpg"),
            git: command(GIT_VAR, "git"),
            scratch_dir,
        }
    }
}
