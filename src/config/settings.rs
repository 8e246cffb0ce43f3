//! Settings structures for TidyMind search configuration

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main settings structure matching `settings.yml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub search: SearchSettings,
    pub embedding: EmbeddingSettings,
    pub backend: BackendSettings,
    pub cache: CacheSettings,
}

impl Settings {
    /// Load settings from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse settings from YAML text
    pub fn from_yaml(content: &str) -> Result<Self> {
        let settings: Settings = serde_yaml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject timeouts that cannot be turned into a duration
    pub fn validate(&self) -> Result<()> {
        check_seconds("search.source_timeout", self.search.source_timeout, false)?;
        check_seconds("embedding.request_timeout", self.embedding.request_timeout, false)?;
        check_seconds("embedding.load_timeout", self.embedding.load_timeout, true)?;
        check_seconds("backend.request_timeout", self.backend.request_timeout, false)?;
        Ok(())
    }

    /// Merge with environment variables (TIDYMIND_* prefix)
    pub fn merge_env(&mut self) {
        if let Ok(val) = std::env::var("TIDYMIND_DEBUG") {
            self.general.debug = val.parse().unwrap_or(false);
        }
        if let Ok(val) = std::env::var("TIDYMIND_BACKEND_URL") {
            self.backend.url = val;
        }
        if let Ok(val) = std::env::var("TIDYMIND_API_KEY") {
            self.backend.api_key = Some(val);
        }
        if let Ok(val) = std::env::var("TIDYMIND_EMBEDDING_BACKEND") {
            match val.to_lowercase().as_str() {
                "hash" => self.embedding.backend = EmbeddingBackendKind::Hash,
                "fastembed" => self.embedding.backend = EmbeddingBackendKind::FastEmbed,
                other => tracing::warn!("Ignoring unknown embedding backend: {}", other),
            }
        }
        if let Ok(val) = std::env::var("TIDYMIND_MODEL_CACHE_DIR") {
            self.embedding.cache_dir = Some(PathBuf::from(val));
        }
    }
}

fn check_seconds(name: &str, value: f64, allow_zero: bool) -> Result<()> {
    ensure!(
        value.is_finite() && (value > 0.0 || (allow_zero && value == 0.0)),
        "{} must be a {} number of seconds, got {}",
        name,
        if allow_zero { "non-negative" } else { "positive" },
        value
    );
    Ok(())
}

/// Saturating conversion; values that fail validation map to zero
fn seconds(value: f64) -> Duration {
    if value.is_nan() || value <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(value).unwrap_or(Duration::MAX)
}

/// General settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Enable debug logging
    pub debug: bool,
    /// Instance name shown by the CLI
    pub instance_name: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            debug: false,
            instance_name: "TidyMind".to_string(),
        }
    }
}

/// Search orchestration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Quiet period before a typed query is committed (milliseconds)
    pub debounce_ms: u64,
    /// Queries shorter than this never reach the embedding worker
    pub semantic_min_chars: usize,
    /// Minimum similarity passed to the vector search
    pub similarity_threshold: f32,
    /// Result cap passed to the vector search
    pub max_semantic_results: usize,
    /// Lexical page size
    pub page_size: u32,
    /// Extra attempts for a failed vector search call
    pub semantic_retries: u32,
    /// Timeout for a single collaborator call in seconds
    pub source_timeout: f64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            debounce_ms: 250,
            semantic_min_chars: 3,
            similarity_threshold: 0.3,
            max_semantic_results: 5,
            page_size: 20,
            semantic_retries: 1,
            source_timeout: 5.0,
        }
    }
}

impl SearchSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn source_timeout(&self) -> Duration {
        seconds(self.source_timeout)
    }
}

/// Which embedding backend the worker loads
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackendKind {
    /// ONNX sentence-transformer via fastembed
    #[default]
    FastEmbed,
    /// Deterministic feature hashing, no model download
    Hash,
}

/// Embedding worker settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub backend: EmbeddingBackendKind,
    /// Fixed model identifier
    pub model: String,
    /// Vector dimension (used by the hash backend)
    pub dimension: usize,
    /// Where downloaded model files are kept
    pub cache_dir: Option<PathBuf>,
    /// Per-request timeout once the model is ready (seconds)
    pub request_timeout: f64,
    /// Extra allowance while the model is still loading (seconds)
    pub load_timeout: f64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackendKind::default(),
            model: crate::DEFAULT_MODEL.to_string(),
            dimension: crate::DEFAULT_DIMENSION,
            cache_dir: None,
            request_timeout: 10.0,
            load_timeout: 300.0,
        }
    }
}

impl EmbeddingSettings {
    pub fn request_timeout(&self) -> Duration {
        seconds(self.request_timeout)
    }

    pub fn load_timeout(&self) -> Duration {
        seconds(self.load_timeout)
    }

    /// Model cache directory, falling back to the user cache dir
    pub fn resolved_cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("tidymind")
                .join("models")
        })
    }
}

/// Hosted backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    /// Base URL of the hosted backend (REST root is `<url>/rest/v1`)
    pub url: String,
    /// Anonymous/service key sent as `apikey` and bearer token
    pub api_key: Option<String>,
    /// Default request timeout in seconds
    pub request_timeout: f64,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:54321".to_string(),
            api_key: None,
            request_timeout: 5.0,
        }
    }
}

impl BackendSettings {
    pub fn request_timeout(&self) -> Duration {
        seconds(self.request_timeout)
    }
}

/// Result cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub enabled: bool,
    pub ttl_seconds: u64,
    pub max_capacity: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_seconds: 60,
            max_capacity: 1000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.search.debounce_ms, 250);
        assert_eq!(settings.search.semantic_min_chars, 3);
        assert_eq!(settings.search.max_semantic_results, 5);
        assert!((settings.search.similarity_threshold - 0.3).abs() < f32::EPSILON);
        assert_eq!(settings.embedding.model, "all-MiniLM-L6-v2");
        assert_eq!(settings.embedding.request_timeout(), Duration::from_secs(10));
        assert!(!settings.general.debug);
    }

    #[test]
    fn test_partial_yaml() {
        let yaml = r#"
search:
  debounce_ms: 100
embedding:
  backend: hash
  dimension: 64
backend:
  url: https://notes.example.com
"#;
        let settings = Settings::from_yaml(yaml).unwrap();
        assert_eq!(settings.search.debounce_ms, 100);
        // untouched fields keep their defaults
        assert_eq!(settings.search.page_size, 20);
        assert_eq!(settings.embedding.backend, EmbeddingBackendKind::Hash);
        assert_eq!(settings.embedding.dimension, 64);
        assert_eq!(settings.backend.url, "https://notes.example.com");
        assert!(settings.cache.enabled);
    }

    #[test]
    fn test_invalid_timeouts_are_rejected() {
        let err = Settings::from_yaml("search:\n  source_timeout: -1.0\n").unwrap_err();
        assert!(err.to_string().contains("search.source_timeout"));

        let err = Settings::from_yaml("embedding:\n  request_timeout: .nan\n").unwrap_err();
        assert!(err.to_string().contains("embedding.request_timeout"));

        let err = Settings::from_yaml("backend:\n  request_timeout: 0\n").unwrap_err();
        assert!(err.to_string().contains("backend.request_timeout"));

        let settings = Settings::from_yaml("embedding:\n  load_timeout: 0\n").unwrap();
        assert_eq!(settings.embedding.load_timeout(), Duration::ZERO);
    }

    #[test]
    fn test_timeout_conversion_never_panics() {
        let mut search = SearchSettings::default();
        search.source_timeout = -1.0;
        assert_eq!(search.source_timeout(), Duration::ZERO);
        search.source_timeout = f64::NAN;
        assert_eq!(search.source_timeout(), Duration::ZERO);
        search.source_timeout = f64::INFINITY;
        assert_eq!(search.source_timeout(), Duration::MAX);
        search.source_timeout = 1.5;
        assert_eq!(search.source_timeout(), Duration::from_millis(1500));
    }

    #[test]
    fn test_cache_dir_override() {
        let mut settings = EmbeddingSettings::default();
        settings.cache_dir = Some(PathBuf::from("/tmp/models"));
        assert_eq!(settings.resolved_cache_dir(), PathBuf::from("/tmp/models"));
    }
}
