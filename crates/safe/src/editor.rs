//! Interactive editor adapter

use crate::error::{Result, SafeError};
use crate::process::{exit_code, CommandLine};
use std::path::Path;
use tracing::debug;

/// Editor used when neither `VISUAL` nor `EDITOR` is set
pub const DEFAULT_EDITOR: &str = "vim";

/// Opens a file for interactive editing, blocking until the user is done
pub trait Editor {
    fn edit(&self, path: &Path) -> Result<()>;
}

/// Runs the user's configured editor with inherited terminal streams
#[derive(Debug, Clone)]
pub struct SystemEditor {
    command: CommandLine,
}

impl SystemEditor {
    pub fn new(command: CommandLine) -> Self {
        Self { command }
    }

    /// Editor from `VISUAL`, then `EDITOR`, then [`DEFAULT_EDITOR`]
    #[must_use]
    pub fn from_env() -> Self {
        let command = ["VISUAL", "EDITOR"]
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .find_map(|value| CommandLine::parse(&value))
            .unwrap_or_else(|| CommandLine::new(DEFAULT_EDITOR));
        Self { command }
    }
}

impl Editor for SystemEditor {
    fn edit(&self, path: &Path) -> Result<()> {
        debug!("Launching editor {} on {}", self.command, path.display());

        let status = self
            .command
            .command()?
            .arg(path)
            .status()
            .map_err(SafeError::CommandExecution)?;

        if !status.success() {
            return Err(SafeError::EditorFailed {
                editor: self.command.to_string(),
                reason: format!("exited with status {}", exit_code(status)),
            });
        }
        Ok(())
    }
}
