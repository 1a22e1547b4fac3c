//! CLI output styling for safe

use colored::Colorize;
use safe::TrackedFile;
use std::path::Path;

/// Path as the user would type it from `cwd`
pub fn relative_display(path: &Path, cwd: &Path) -> String {
    path.strip_prefix(cwd).unwrap_or(path).display().to_string()
}

/// Print a completed lifecycle action
pub fn print_done(action: &str, path: &str, silent: bool) {
    if silent {
        return;
    }
    eprintln!("{} {}", action.green().bold(), path.white());
}

/// Print the no-op result of an edit session
pub fn print_unchanged(path: &str, silent: bool) {
    if silent {
        return;
    }
    eprintln!(
        "{} {}",
        "no changes".truecolor(150, 150, 150),
        path.truecolor(150, 150, 150)
    );
}

/// Print the summary of a re-encryption pass
pub fn print_reencrypted(count: usize, silent: bool) {
    if silent {
        return;
    }
    let noun = if count == 1 { "file" } else { "files" };
    eprintln!(
        "{} {} {}",
        "re-encrypted".green().bold(),
        count.to_string().white(),
        noun
    );
}

/// Print tracked files with their recipients
pub fn print_tracked(files: &[TrackedFile]) {
    if files.is_empty() {
        eprintln!("{}", "No protected files.".truecolor(150, 150, 150));
        return;
    }

    for file in files {
        let recipients = file.recipients.join(", ");
        let recipients = if file.overridden {
            format!("{} (override)", recipients).yellow()
        } else {
            recipients.green()
        };
        let missing = if file.present {
            String::new()
        } else {
            format!(" {}", "[missing]".red())
        };
        println!("{}  {}{}", file.path.white(), recipients, missing);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_display() {
        assert_eq!(
            relative_display(Path::new("/repo/cfg/app.yml.gpg.asc"), Path::new("/repo")),
            "cfg/app.yml.gpg.asc"
        );
        assert_eq!(
            relative_display(Path::new("/elsewhere/x"), Path::new("/repo")),
            "/elsewhere/x"
        );
    }
}
