//! Test doubles for the external collaborators

use crate::cipher::{Cipher, Gpg};
use crate::editor::Editor;
use crate::error::{Result, SafeError};
use crate::process::CommandLine;
use crate::vcs::Vcs;
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

const FAKE_HEADER: &str = "FAKE-CIPHER";

/// Reversible stand-in for gpg.
///
/// Writes a header line, the comma-joined recipients, then the plaintext.
#[derive(Debug, Default, Clone)]
pub struct FakeCipher {
    /// Encryption fails for any path whose string form contains this
    pub fail_encrypt_on: Option<String>,
}

impl FakeCipher {
    pub fn failing_on(fragment: &str) -> Self {
        Self {
            fail_encrypt_on: Some(fragment.to_string()),
        }
    }

    /// Recipients recorded in a fake ciphertext
    pub fn recipients_of(path: &Path) -> Vec<String> {
        let content = fs::read_to_string(path).expect("read fake ciphertext");
        let mut lines = content.splitn(3, '\n');
        assert_eq!(lines.next(), Some(FAKE_HEADER));
        lines
            .next()
            .expect("recipient line")
            .split(',')
            .map(str::to_string)
            .collect()
    }
}

impl Cipher for FakeCipher {
    fn decrypt(&self, path: &Path) -> Result<Vec<u8>> {
        let content = fs::read(path).map_err(|e| SafeError::io(path, e))?;
        let mut parts = content.splitn(3, |b| *b == b'\n');
        if parts.next() != Some(FAKE_HEADER.as_bytes()) {
            return Err(SafeError::DecryptFailed {
                path: path.to_path_buf(),
                reason: "not a fake ciphertext".to_string(),
            });
        }
        let _recipients = parts.next();
        Ok(parts.next().unwrap_or_default().to_vec())
    }

    fn encrypt(&self, path: &Path, plaintext: &[u8], recipients: &[String]) -> Result<()> {
        if let Some(fragment) = &self.fail_encrypt_on {
            if path.to_string_lossy().contains(fragment.as_str()) {
                return Err(SafeError::EncryptFailed {
                    path: path.to_path_buf(),
                    reason: "injected failure".to_string(),
                });
            }
        }
        let mut content = format!("{}\n{}\n", FAKE_HEADER, recipients.join(",")).into_bytes();
        content.extend_from_slice(plaintext);
        fs::write(path, content).map_err(|e| SafeError::io(path, e))
    }
}

/// Write a fake ciphertext directly, as if produced earlier
pub fn write_fake_ciphertext(path: &Path, recipients: &[&str], plaintext: &[u8]) {
    let recipients: Vec<String> = recipients.iter().map(|r| r.to_string()).collect();
    FakeCipher::default()
        .encrypt(path, plaintext, &recipients)
        .expect("write fake ciphertext");
}

/// `Gpg` adapter backed by a shell script that stores plaintext as-is
pub fn fake_gpg(dir: &Path) -> Gpg {
    let script = dir.join("fake-gpg.sh");
    fs::write(
        &script,
        r#"mode=""
out=""
last=""
while [ $# -gt 0 ]; do
  case "$1" in
    --decrypt) mode=decrypt ;;
    --encrypt) mode=encrypt ;;
    --output) shift; out="$1" ;;
    --recipient) shift ;;
    *) last="$1" ;;
  esac
  shift
done
if [ "$mode" = decrypt ]; then
  cat "$last"
else
  cat > "$out"
fi
"#,
    )
    .expect("write fake gpg");
    Gpg::new(CommandLine::parse(&format!("sh {}", script.display())).expect("command line"))
}

/// Commits captured by [`RecordingVcs`]
pub type CommitLog = Rc<RefCell<Vec<(Vec<PathBuf>, String)>>>;

/// Records commits instead of running git
#[derive(Default)]
pub struct RecordingVcs {
    pub commits: CommitLog,
}

impl Vcs for RecordingVcs {
    fn stage_and_commit(&self, paths: &[PathBuf], message: &str) -> Result<()> {
        self.commits
            .borrow_mut()
            .push((paths.to_vec(), message.to_string()));
        Ok(())
    }
}

/// What the scripted editor does to the scratch file
#[derive(Debug, Clone)]
pub enum EditScript {
    /// Leave the file untouched
    Keep,
    /// Replace the contents
    Write(Vec<u8>),
    /// Exit with failure after writing
    Fail,
}

/// Editor double that records what it saw
pub struct ScriptedEditor {
    pub script: EditScript,
    /// (scratch path, contents at launch) for every invocation
    pub seen: Rc<RefCell<Vec<(PathBuf, Vec<u8>)>>>,
}

impl ScriptedEditor {
    pub fn new(script: EditScript) -> Self {
        Self {
            script,
            seen: Rc::default(),
        }
    }
}

impl Editor for ScriptedEditor {
    fn edit(&self, path: &Path) -> Result<()> {
        let before = fs::read(path).map_err(|e| SafeError::io(path, e))?;
        self.seen.borrow_mut().push((path.to_path_buf(), before));
        match &self.script {
            EditScript::Keep => Ok(()),
            EditScript::Write(content) => fs::write(path, content).map_err(|e| SafeError::io(path, e)),
            EditScript::Fail => {
                fs::write(path, b"half-written").map_err(|e| SafeError::io(path, e))?;
                Err(SafeError::EditorFailed {
                    editor: "scripted".to_string(),
                    reason: "exited with status 1".to_string(),
                })
            }
        }
    }
}
