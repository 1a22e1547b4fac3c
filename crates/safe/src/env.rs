//! Projection of a decrypted YAML document onto environment variables

use crate::error::{Result, SafeError};
use crate::protection::trim_suffix;
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// Logical-name extensions `exec` accepts
pub const STRUCTURED_EXTENSIONS: &[&str] = &["yml", "yaml"];

/// A top-level value from the decrypted document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvValue {
    /// A string value, exported verbatim
    Scalar(String),
    /// A list, exported comma-joined
    Sequence(Vec<String>),
    /// Anything else (numbers, booleans, null, nested maps), exported stringified
    Other(String),
}

impl EnvValue {
    #[must_use]
    pub fn from_yaml(value: &Value) -> Self {
        match value {
            Value::String(s) => EnvValue::Scalar(s.clone()),
            Value::Sequence(items) => EnvValue::Sequence(items.iter().map(stringify).collect()),
            Value::Tagged(tagged) => EnvValue::from_yaml(&tagged.value),
            other => EnvValue::Other(stringify(other)),
        }
    }

    /// Value as it appears in the child's environment
    #[must_use]
    pub fn to_env_string(&self) -> String {
        match self {
            EnvValue::Scalar(s) | EnvValue::Other(s) => s.clone(),
            EnvValue::Sequence(items) => items.join(","),
        }
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Tagged(tagged) => stringify(&tagged.value),
        Value::Sequence(_) | Value::Mapping(_) => match serde_json::to_string(value) {
            Ok(json) => json,
            // JSON cannot express non-string keys; fall back to YAML
            Err(_) => serde_yaml::to_string(value)
                .map(|yaml| yaml.trim_end().to_string())
                .unwrap_or_default(),
        },
    }
}

/// Whether the logical name of `path` is a structured document `exec` can load
#[must_use]
pub fn is_structured(path: &Path) -> bool {
    trim_suffix(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| STRUCTURED_EXTENSIONS.contains(&ext))
}

/// Parse a flat key/value document into its top-level entries
pub fn parse_document(path: &Path, content: &[u8]) -> Result<Vec<(String, EnvValue)>> {
    if content.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }

    let document: Value =
        serde_yaml::from_slice(content).map_err(|e| SafeError::UnsupportedFormat {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    let mapping = match document {
        Value::Null => return Ok(Vec::new()),
        Value::Mapping(mapping) => mapping,
        _ => {
            return Err(SafeError::UnsupportedFormat {
                path: path.to_path_buf(),
                reason: "top level is not a mapping".to_string(),
            })
        }
    };

    Ok(mapping
        .iter()
        .map(|(key, value)| (stringify(key), EnvValue::from_yaml(value)))
        .collect())
}

/// Environment overlay: upper-cased keys mapped to their exported strings
#[must_use]
pub fn overlay(entries: &[(String, EnvValue)]) -> BTreeMap<String, String> {
    entries
        .iter()
        .map(|(key, value)| (key.to_uppercase(), value.to_env_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overlay_of(doc: &str) -> BTreeMap<String, String> {
        let entries = parse_document(Path::new("cfg.yml"), doc.as_bytes()).expect("parse");
        overlay(&entries)
    }

    #[test]
    fn test_scalar_export() {
        let env = overlay_of("key: value\n");
        assert_eq!(env.get("KEY").map(String::as_str), Some("value"));
    }

    #[test]
    fn test_value_variants() {
        let entries = parse_document(
            Path::new("cfg.yml"),
            b"name: api\nhosts: [a, b, 3]\nport: 8080\ndebug: true\nempty:\nnested: {x: 1}\n",
        )
        .expect("parse");
        let by_key: BTreeMap<_, _> = entries.into_iter().collect();

        assert_eq!(by_key["name"], EnvValue::Scalar("api".into()));
        assert_eq!(
            by_key["hosts"],
            EnvValue::Sequence(vec!["a".into(), "b".into(), "3".into()])
        );
        assert_eq!(by_key["port"], EnvValue::Other("8080".into()));
        assert_eq!(by_key["debug"], EnvValue::Other("true".into()));
        assert_eq!(by_key["empty"], EnvValue::Other(String::new()));
        assert_eq!(by_key["nested"], EnvValue::Other(r#"{"x":1}"#.into()));
    }

    #[test]
    fn test_overlay_joins_and_uppercases() {
        let env = overlay_of("db_hosts:\n  - one\n  - two\nMixed_Case: x\n");
        assert_eq!(env["DB_HOSTS"], "one,two");
        assert_eq!(env["MIXED_CASE"], "x");
    }

    #[test]
    fn test_empty_document() {
        assert!(overlay_of("").is_empty());
    }

    #[test]
    fn test_rejects_non_mapping() {
        assert!(matches!(
            parse_document(Path::new("cfg.yml"), b"- a\n- b\n"),
            Err(SafeError::UnsupportedFormat { .. })
        ));
        assert!(matches!(
            parse_document(Path::new("cfg.yml"), b"key: [unclosed\n"),
            Err(SafeError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_is_structured() {
        assert!(is_structured(Path::new("cfg.yml.gpg.asc")));
        assert!(is_structured(Path::new("dir/cfg.yaml")));
        assert!(!is_structured(Path::new("notes.md.gpg.asc")));
        assert!(!is_structured(Path::new("yml.gpg.asc")));
    }
}
