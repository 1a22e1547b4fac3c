//! safe CLI - keep secrets gpg-encrypted in a repository
//!
//! This is the CLI binary that drives the safe library's lifecycle engine.

mod cli;
mod output;
mod settings;

use clap::Parser;
use cli::{Cli, Commands};
use safe::{EditOutcome, Git, Gpg, Lifecycle, Manifest, Result, SafeError, SystemEditor};
use settings::Settings;
use std::io::Write;
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("{}", e);
            eprintln!("safe: {}", e);
            std::process::exit(1);
        }
    }
}

/// `RUST_LOG` wins unless `-v` was given; the default level is `warn`
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => None,
        1 => Some("info"),
        2 => Some("debug"),
        _ => Some("trace"),
    };

    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Execute the parsed command, returning the process exit code
fn run(cli: Cli) -> Result<i32> {
    let settings = Settings::from_env();
    let cwd = std::env::current_dir().map_err(|e| SafeError::Io {
        path: PathBuf::from("."),
        source: e,
    })?;

    let manifest = Manifest::load(&cwd)?;
    let git = Git::new(settings.git, manifest.location());
    let mut engine = Lifecycle::new(
        manifest,
        Box::new(Gpg::new(settings.gpg)),
        Box::new(git),
        Box::new(SystemEditor::from_env()),
        &cwd,
    )
    .with_scratch_dir(settings.scratch_dir);

    let silent = cli.silent;
    match cli.command {
        Commands::Edit(args) => {
            let outcome = engine.edit(&args.path, args.commit)?;
            let shown = output::relative_display(&engine.target(&args.path)?.ciphertext, &cwd);
            match outcome {
                EditOutcome::Unchanged => output::print_unchanged(&shown, silent),
                EditOutcome::Saved => output::print_done("saved", &shown, silent),
            }
        }
        Commands::Protect(args) => {
            let target = engine.protect(&args.path, args.commit)?;
            output::print_done(
                "protected",
                &output::relative_display(&target.ciphertext, &cwd),
                silent,
            );
        }
        Commands::Remove(args) => {
            engine.remove(&args.path, args.commit)?;
            output::print_done(
                "removed",
                &output::relative_display(&args.path, &cwd),
                silent,
            );
        }
        Commands::Reencrypt(args) => {
            let count = engine.reencrypt_all(args.commit)?;
            output::print_reencrypted(count, silent);
        }
        Commands::Exec(args) => {
            return engine.exec(&args.path, &args.command);
        }
        Commands::Find(args) => {
            for path in engine.find(&args.dir)? {
                println!("{}", output::relative_display(&path, &cwd));
            }
        }
        Commands::Print(args) => {
            let mut plaintext = engine.reveal(&args.path)?;
            if plaintext.last() != Some(&b'\n') {
                plaintext.push(b'\n');
            }
            std::io::stdout()
                .lock()
                .write_all(&plaintext)
                .map_err(|e| SafeError::Io {
                    path: PathBuf::from("<stdout>"),
                    source: e,
                })?;
        }
        Commands::List(args) => {
            let files = engine.list();
            if args.json {
                let json = serde_json::to_string_pretty(&files).map_err(|e| SafeError::Io {
                    path: PathBuf::from("<stdout>"),
                    source: e.into(),
                })?;
                println!("{}", json);
            } else {
                output::print_tracked(&files);
            }
        }
    }

    Ok(0)
}
