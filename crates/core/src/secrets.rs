use crate::error::ConfigError;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Secrets {
    values: BTreeMap<String, String>,
}

impl Secrets {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }

    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        let object: Map<String, Value> = serde_json::from_str(&raw)?;

        let mut values = BTreeMap::new();
        for (key, value) in object {
            match value {
                Value::String(text) => {
                    values.insert(key, text);
                }
                Value::Number(number) => {
                    values.insert(key, number.to_string());
                }
                Value::Bool(flag) => {
                    values.insert(key, flag.to_string());
                }
                other => {
                    warn!(key = %key, kind = value_kind(&other), "skipping non-scalar secret");
                }
            }
        }

        Ok(Self { values })
    }

    /// Value from the file, else from the environment.
    pub fn get(&self, key: &str) -> Option<String> {
        let present = |value: &String| !value.trim().is_empty();
        self.values
            .get(key)
            .filter(|value| present(value))
            .cloned()
            .or_else(|| std::env::var(key).ok().filter(present))
    }

    pub fn file_value(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Never fails: an unreadable or malformed file yields empty secrets.
pub fn load_secrets(path: &Path) -> Secrets {
    match Secrets::read(path) {
        Ok(secrets) => {
            info!(path = %path.display(), keys = secrets.len(), "loaded secrets");
            secrets
        }
        Err(error) => {
            warn!(
                path = %path.display(),
                %error,
                "failed loading secrets; falling back to environment variables"
            );
            Secrets::default()
        }
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
        _ => "scalar",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn every_key_in_file_is_available_verbatim() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("secrets.json");
        fs::write(
            &path,
            r#"{"HERMES_TEST_KEY_A": "sk-abc 123", "HERMES_TEST_KEY_B": "  padded  "}"#,
        )?;

        let secrets = load_secrets(&path);

        assert_eq!(secrets.len(), 2);
        assert_eq!(secrets.file_value("HERMES_TEST_KEY_A"), Some("sk-abc 123"));
        assert_eq!(secrets.file_value("HERMES_TEST_KEY_B"), Some("  padded  "));
        assert_eq!(secrets.get("HERMES_TEST_KEY_A").as_deref(), Some("sk-abc 123"));
        Ok(())
    }

    #[test]
    fn scalars_are_stringified_and_nested_values_skipped() -> Result<(), Box<dyn std::error::Error>>
    {
        let dir = tempdir()?;
        let path = dir.path().join("secrets.json");
        fs::write(&path, r#"{"PORT": 8080, "DEBUG": true, "NESTED": {"a": 1}}"#)?;

        let secrets = load_secrets(&path);

        assert_eq!(secrets.file_value("PORT"), Some("8080"));
        assert_eq!(secrets.file_value("DEBUG"), Some("true"));
        assert_eq!(secrets.file_value("NESTED"), None);
        Ok(())
    }

    #[test]
    fn missing_file_yields_empty_secrets() {
        let secrets = load_secrets(Path::new("/definitely/not/here/secrets.json"));
        assert!(secrets.is_empty());
    }

    #[test]
    fn malformed_file_yields_empty_secrets() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("secrets.json");
        fs::write(&path, "{ not json")?;

        assert!(load_secrets(&path).is_empty());
        assert!(Secrets::read(&path).is_err());
        Ok(())
    }

    #[test]
    fn lookup_falls_back_to_environment() {
        let secrets = Secrets::default();
        let path = std::env::var("PATH").ok();
        assert_eq!(secrets.get("PATH"), path.filter(|value| !value.trim().is_empty()));
    }

    #[test]
    fn blank_file_value_falls_back_to_environment() {
        let secrets = Secrets::from_pairs([("PATH", "  ")]);
        let path = std::env::var("PATH").ok();
        assert_eq!(secrets.get("PATH"), path.filter(|value| !value.trim().is_empty()));
        assert_eq!(secrets.file_value("PATH"), Some("  "));
    }
}
