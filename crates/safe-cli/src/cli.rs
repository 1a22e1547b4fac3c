//! CLI argument definitions for safe
//!
//! Uses clap for argument parsing. Every command operates on the `safe.yml`
//! found in the current directory or one of its parents.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// safe - keep secrets encrypted in your repository
///
/// Files listed in safe.yml are stored gpg-encrypted as <name>.gpg.asc for
/// the recipients configured there.
#[derive(Parser, Debug)]
#[command(name = "safe")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Silent mode - suppress status output
    #[arg(long, short = 's', global = true)]
    pub silent: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Edit a protected file in $EDITOR, creating it if it does not exist
    #[command(after_help = "EXAMPLES:
    # Edit and commit the change
    safe edit config/prod.yml --commit

    # The suffix is optional
    safe edit config/prod.yml.gpg.asc
")]
    Edit(TargetArgs),

    /// Encrypt a plaintext file, track it, and delete the plaintext
    #[command(after_help = "EXAMPLES:
    # Protect notes.md as notes.md.gpg.asc
    safe protect notes.md

    # Protect and commit manifest, plaintext removal and ciphertext together
    safe protect notes.md -c
")]
    Protect(TargetArgs),

    /// Delete a protected file and stop tracking it
    Remove(TargetArgs),

    /// Re-encrypt every tracked file for its current recipients
    #[command(after_help = "EXAMPLES:
    # After adding a recipient to safe.yml
    safe reencrypt --commit
")]
    Reencrypt(ReencryptArgs),

    /// Run a command with the keys of a protected YAML file as environment variables
    #[command(trailing_var_arg = true)]
    #[command(after_help = "EXAMPLES:
    # secrets.yml contains `database_url: postgres://...`
    safe exec secrets.yml -- ./server --port 8080

    # Keys are upper-cased, lists are comma-joined
    safe exec secrets.yml -- env
")]
    Exec(ExecArgs),

    /// List protected files below a directory
    Find(FindArgs),

    /// Print the decrypted content of a protected file
    Print(PrintArgs),

    /// Show tracked files and who can decrypt them
    List(ListArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct TargetArgs {
    /// File to operate on (with or without the .gpg.asc suffix)
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Commit the change to git
    #[arg(long, short = 'c')]
    pub commit: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct ReencryptArgs {
    /// Commit each re-encrypted file to git
    #[arg(long, short = 'c')]
    pub commit: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct ExecArgs {
    /// Protected .yml/.yaml file providing the environment
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Command to run
    #[arg(required = true)]
    pub command: Vec<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct FindArgs {
    /// Directory to search
    #[arg(value_name = "DIR", default_value = ".")]
    pub dir: PathBuf,
}

#[derive(Parser, Debug, Clone)]
pub struct PrintArgs {
    /// Protected file to print
    #[arg(value_name = "PATH")]
    pub path: PathBuf,
}

#[derive(Parser, Debug, Clone)]
pub struct ListArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protect_with_commit() {
        let cli = Cli::parse_from(["safe", "protect", "notes.md", "--commit"]);
        match cli.command {
            Commands::Protect(args) => {
                assert_eq!(args.path, PathBuf::from("notes.md"));
                assert!(args.commit);
            }
            _ => panic!("Expected Protect command"),
        }
    }

    #[test]
    fn test_commit_defaults_off() {
        let cli = Cli::parse_from(["safe", "remove", "a.txt.gpg.asc"]);
        match cli.command {
            Commands::Remove(args) => assert!(!args.commit),
            _ => panic!("Expected Remove command"),
        }
    }

    #[test]
    fn test_exec_collects_trailing_command() {
        let cli = Cli::parse_from(["safe", "exec", "cfg.yml", "--", "server", "--port", "80"]);
        match cli.command {
            Commands::Exec(args) => {
                assert_eq!(args.path, PathBuf::from("cfg.yml"));
                assert_eq!(args.command, ["server", "--port", "80"]);
            }
            _ => panic!("Expected Exec command"),
        }
    }

    #[test]
    fn test_exec_requires_command() {
        assert!(Cli::try_parse_from(["safe", "exec", "cfg.yml"]).is_err());
    }

    #[test]
    fn test_find_defaults_to_current_dir() {
        let cli = Cli::parse_from(["safe", "find"]);
        match cli.command {
            Commands::Find(args) => assert_eq!(args.dir, PathBuf::from(".")),
            _ => panic!("Expected Find command"),
        }
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::parse_from(["safe", "-vv", "reencrypt", "-c", "--silent"]);
        assert_eq!(cli.verbose, 2);
        assert!(cli.silent);
        match cli.command {
            Commands::Reencrypt(args) => assert!(args.commit),
            _ => panic!("Expected Reencrypt command"),
        }
    }
}
