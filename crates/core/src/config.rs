use crate::error::ConfigError;
use crate::models::{CleanupMode, IngestionOptions};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gpt-4-turbo";
pub const DEFAULT_TEMPERATURE: f32 = 0.0;
pub const DEFAULT_CHUNK_SIZE: usize = 512;
pub const DEFAULT_CHUNK_OVERLAP: usize = 64;
pub const DEFAULT_TOP_K: usize = 3;
pub const DEFAULT_STORAGE_ROOT: &str = "./app/data";
pub const DEFAULT_SECRETS_PATH: &str = "./app/secrets.json";
pub const DEFAULT_NAMESPACE: &str = "hermes/documents";
pub const DEFAULT_MANIFEST_PATH: &str = "record_manager_cache.sqlite";

#[derive(Debug, Clone, PartialEq)]
pub struct UploadPolicy {
    pub accept: Vec<String>,
    pub max_size_mb: u64,
    pub max_files: usize,
    pub timeout: Duration,
    pub max_attempts: u32,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            accept: vec!["pdf".to_string()],
            max_size_mb: 20,
            max_files: 100,
            timeout: Duration::from_secs(180),
            max_attempts: 3,
        }
    }
}

impl UploadPolicy {
    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_mb.saturating_mul(1024 * 1024)
    }

    pub fn accepts(&self, file_name: &str) -> bool {
        std::path::Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                self.accept
                    .iter()
                    .any(|accepted| accepted.eq_ignore_ascii_case(ext))
            })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatSettings {
    pub model: String,
    pub temperature: f32,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub storage_root: PathBuf,
    pub namespace: String,
    pub cleanup: CleanupMode,
    pub upload: UploadPolicy,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            top_k: DEFAULT_TOP_K,
            storage_root: PathBuf::from(DEFAULT_STORAGE_ROOT),
            namespace: DEFAULT_NAMESPACE.to_string(),
            cleanup: CleanupMode::Incremental,
            upload: UploadPolicy::default(),
        }
    }
}

impl ChatSettings {
    pub fn ingestion_options(&self) -> IngestionOptions {
        IngestionOptions {
            chunk_max_chars: self.chunk_size,
            chunk_overlap_chars: self.chunk_overlap,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(invalid("chunk_size", "must be greater than zero"));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(invalid(
                "chunk_overlap",
                format!(
                    "{} must be smaller than chunk_size {}",
                    self.chunk_overlap, self.chunk_size
                ),
            ));
        }
        if self.top_k == 0 {
            return Err(invalid("top_k", "must be greater than zero"));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(invalid("temperature", "must be within 0.0..=2.0"));
        }
        if self.namespace.trim().is_empty() {
            return Err(invalid("namespace", "must not be empty"));
        }
        if self.upload.max_files == 0 || self.upload.max_attempts == 0 {
            return Err(invalid(
                "upload",
                "max_files and max_attempts must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Rejects anything that is not an absolute http(s) URL.
pub fn validate_base_url(key: &str, value: &str) -> Result<url::Url, ConfigError> {
    let parsed = url::Url::parse(value)?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(invalid(key, format!("unsupported scheme {scheme}"))),
    }
}

fn invalid(key: &str, details: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        details: details.into(),
    }
}
