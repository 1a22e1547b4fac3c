//! Version-control commit adapter

use crate::error::{Result, SafeError};
use crate::process::{exit_code, CommandLine};
use crate::protection::logical_name;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Prefix of every generated commit message
pub const COMMIT_NAMESPACE: &str = "safe";

/// Lifecycle action recorded in a commit message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Protect,
    Edit,
    Remove,
    Reencrypt,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Protect => "protect",
            Action::Edit => "edit",
            Action::Remove => "remove",
            Action::Reencrypt => "reencrypt",
        };
        f.write_str(name)
    }
}

/// `"safe: <action> <logical-path>"` for a manifest-relative entry
#[must_use]
pub fn commit_message(action: Action, rel: &str) -> String {
    format!("{}: {} {}", COMMIT_NAMESPACE, action, logical_name(rel))
}

/// Stages paths and records them as one commit
pub trait Vcs {
    /// Stage each path independently, then commit everything staged.
    ///
    /// A path that fails to stage is skipped: a file deleted before it was
    /// ever tracked cannot be added, and that must not block the commit.
    fn stage_and_commit(&self, paths: &[PathBuf], message: &str) -> Result<()>;
}

/// `git` subprocess adapter operating on a fixed repository directory
#[derive(Debug, Clone)]
pub struct Git {
    command: CommandLine,
    workdir: PathBuf,
}

impl Git {
    pub fn new(command: CommandLine, workdir: &Path) -> Self {
        Self {
            command,
            workdir: workdir.to_path_buf(),
        }
    }

    /// Plain `git` run from `workdir`
    #[must_use]
    pub fn in_dir(workdir: &Path) -> Self {
        Self::new(CommandLine::new("git"), workdir)
    }
}

impl Vcs for Git {
    fn stage_and_commit(&self, paths: &[PathBuf], message: &str) -> Result<()> {
        for path in paths {
            let staged = self
                .command
                .command()?
                .arg("-C")
                .arg(&self.workdir)
                .args(["add", "--"])
                .arg(path)
                .output();
            match staged {
                Ok(output) if output.status.success() => {
                    debug!("Staged {}", path.display());
                }
                Ok(output) => debug!(
                    "Ignoring failure to stage {} (status {}): {}",
                    path.display(),
                    exit_code(output.status),
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
                Err(e) => debug!("Ignoring failure to stage {}: {}", path.display(), e),
            }
        }

        let status = self
            .command
            .command()?
            .arg("-C")
            .arg(&self.workdir)
            .args(["commit", "-m", message])
            .status()
            .map_err(|e| SafeError::CommitFailed(format!("failed to run git commit: {}", e)))?;

        if !status.success() {
            return Err(SafeError::CommitFailed(format!(
                "git commit exited with status {}",
                exit_code(status)
            )));
        }

        info!("Committed: {}", message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    /// Fake git: `add` fails for paths containing "untracked", every call is logged
    fn fake_git(dir: &Path, commit_status: i32) -> Git {
        let script = dir.join("fake-git.sh");
        let log = dir.join("git.log");
        fs::write(
            &script,
            format!(
                "shift 2\necho \"$@\" >> {log}\ncase \"$1:$3\" in\n  add:*untracked*) exit 128 ;;\n  commit:*) exit {commit_status} ;;\nesac\nexit 0\n",
                log = log.display(),
            ),
        )
        .expect("write script");
        Git::new(
            CommandLine::parse(&format!("sh {}", script.display())).expect("command line"),
            dir,
        )
    }

    #[test]
    fn test_commit_message_format() {
        assert_eq!(
            commit_message(Action::Protect, "cfg/app.yml.gpg.asc"),
            "safe: protect cfg/app.yml"
        );
        assert_eq!(commit_message(Action::Reencrypt, "a.gpg.asc"), "safe: reencrypt a");
    }

    #[test]
    fn test_stage_failures_are_swallowed() {
        let dir = TempDir::new().expect("tempdir");
        let git = fake_git(dir.path(), 0);

        git.stage_and_commit(
            &[
                dir.path().join("safe.yml"),
                dir.path().join("untracked.txt"),
                dir.path().join("notes.md.gpg.asc"),
            ],
            "safe: protect notes.md",
        )
        .expect("commit despite staging failure");

        let log = fs::read_to_string(dir.path().join("git.log")).expect("read log");
        let calls: Vec<_> = log.lines().collect();
        assert_eq!(calls.len(), 4);
        assert!(calls[1].contains("untracked.txt"));
        assert!(calls[2].ends_with("notes.md.gpg.asc"));
        assert_eq!(calls[3], "commit -m safe: protect notes.md");
    }

    #[test]
    fn test_commit_failure_propagates() {
        let dir = TempDir::new().expect("tempdir");
        let git = fake_git(dir.path(), 1);
        assert!(matches!(
            git.stage_and_commit(&[dir.path().join("safe.yml")], "safe: edit x"),
            Err(SafeError::CommitFailed(_))
        ));
    }
}
