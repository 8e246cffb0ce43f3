//! Embedding backends executed on the worker thread
//!
//! A backend is created fresh every time the worker is (re)spawned, loads its
//! model once, then serves extractions one at a time.

use crate::config::{EmbeddingBackendKind, EmbeddingSettings};
use anyhow::{anyhow, Result};
use fastembed::{InitOptions, TextEmbedding};
use std::path::PathBuf;
use std::sync::Arc;

/// A text embedding model living on the worker thread
pub trait EmbeddingBackend: Send {
    /// Fixed model identifier
    fn model_id(&self) -> &str;

    /// Load the model, reporting progress in percent
    fn load(&mut self, progress: &mut dyn FnMut(f32)) -> Result<()>;

    /// Embed one text. Only called after a successful `load`.
    fn embed(&mut self, text: &str) -> Result<Vec<f32>>;
}

/// Builds a new backend for each worker incarnation
pub type BackendFactory = Arc<dyn Fn() -> Box<dyn EmbeddingBackend> + Send + Sync>;

/// Factory for the backend selected in settings
pub fn factory_from_settings(settings: &EmbeddingSettings) -> BackendFactory {
    match settings.backend {
        EmbeddingBackendKind::FastEmbed => {
            let model = settings.model.clone();
            let cache_dir = settings.resolved_cache_dir();
            Arc::new(move || {
                Box::new(FastEmbedBackend::new(&model, cache_dir.clone())) as Box<dyn EmbeddingBackend>
            })
        }
        EmbeddingBackendKind::Hash => {
            let dimension = settings.dimension;
            Arc::new(move || Box::new(HashEmbedder::new(dimension)) as Box<dyn EmbeddingBackend>)
        }
    }
}

/// Sentence-transformer backend (mean pooling, L2-normalized output)
pub struct FastEmbedBackend {
    model_name: String,
    cache_dir: PathBuf,
    model: Option<TextEmbedding>,
}

impl FastEmbedBackend {
    pub fn new(model_name: &str, cache_dir: PathBuf) -> Self {
        Self {
            model_name: model_name.to_string(),
            cache_dir,
            model: None,
        }
    }

    fn parse_model_name(name: &str) -> Result<fastembed::EmbeddingModel> {
        match name.to_lowercase().as_str() {
            "all-minilm-l6-v2" | "allminiml6v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
            "all-minilm-l6-v2-q" | "allminiml6v2q" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2Q),
            "bge-small-en-v1.5" | "bgesmallenv15" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
            _ => Err(anyhow!(
                "Unknown model: {}. Supported models: all-MiniLM-L6-v2, all-MiniLM-L6-v2-q, bge-small-en-v1.5",
                name
            )),
        }
    }
}

impl EmbeddingBackend for FastEmbedBackend {
    fn model_id(&self) -> &str {
        &self.model_name
    }

    fn load(&mut self, progress: &mut dyn FnMut(f32)) -> Result<()> {
        if self.model.is_some() {
            return Ok(());
        }

        let model_enum = Self::parse_model_name(&self.model_name)?;
        progress(0.0);

        std::fs::create_dir_all(&self.cache_dir)
            .map_err(|e| anyhow!("Failed to create models directory: {}", e))?;

        let options = InitOptions::new(model_enum)
            .with_cache_dir(self.cache_dir.clone())
            .with_show_download_progress(false);

        let model = TextEmbedding::try_new(options).map_err(|e| anyhow!(e.to_string()))?;
        progress(100.0);

        self.model = Some(model);
        Ok(())
    }

    fn embed(&mut self, text: &str) -> Result<Vec<f32>> {
        let model = self
            .model
            .as_mut()
            .ok_or_else(|| anyhow!("Model not loaded"))?;

        let embeddings = model
            .embed(vec![text], None)
            .map_err(|e| anyhow!(e.to_string()))?;

        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No embedding returned"))
    }
}

/// FNV-1a offset basis (64-bit)
const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;

/// FNV-1a prime (64-bit)
const FNV_PRIME: u64 = 0x100000001b3;

/// Deterministic feature-hashing embedder.
///
/// Captures lexical overlap rather than meaning, but needs no model download,
/// which makes it useful offline and in tests.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
    id: String,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        let dimension = dimension.max(1);
        Self {
            dimension,
            id: format!("fnv1a-{dimension}"),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|s| s.len() >= 2)
            .map(str::to_lowercase)
    }

    fn fnv1a_hash(bytes: &[u8]) -> u64 {
        let mut hash = FNV_OFFSET_BASIS;
        for byte in bytes {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(FNV_PRIME);
        }
        hash
    }

    /// Embed text synchronously
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimension];

        for token in Self::tokenize(text) {
            let hash = Self::fnv1a_hash(token.as_bytes());
            let idx = (hash as usize) % self.dimension;
            let sign = if (hash >> 63) == 0 { 1.0 } else { -1.0 };
            embedding[idx] += sign;
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for x in embedding.iter_mut() {
                *x /= norm;
            }
        }
        embedding
    }
}

impl EmbeddingBackend for HashEmbedder {
    fn model_id(&self) -> &str {
        &self.id
    }

    fn load(&mut self, progress: &mut dyn FnMut(f32)) -> Result<()> {
        progress(100.0);
        Ok(())
    }

    fn embed(&mut self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_text(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_embedder_is_normalized() {
        let embedder = HashEmbedder::new(64);
        let v = embedder.embed_text("rust ownership and borrowing");
        assert_eq!(v.len(), 64);

        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_hash_embedder_is_deterministic() {
        let embedder = HashEmbedder::new(128);
        assert_eq!(embedder.embed_text("Cat food"), embedder.embed_text("cat FOOD"));
        assert_ne!(embedder.embed_text("cat food"), embedder.embed_text("dog walks"));
    }

    #[test]
    fn test_hash_embedder_short_tokens_yield_zero_vector() {
        let embedder = HashEmbedder::new(16);
        assert!(embedder.embed_text("a b c").iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_fastembed_rejects_unknown_model_before_download() {
        let mut backend = FastEmbedBackend::new("nonexistent-model", std::env::temp_dir());
        let mut calls = 0;
        let result = backend.load(&mut |_| calls += 1);
        assert!(result.is_err());
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_factory_builds_fresh_backends() {
        let settings = EmbeddingSettings {
            backend: EmbeddingBackendKind::Hash,
            dimension: 32,
            ..Default::default()
        };
        let factory = factory_from_settings(&settings);
        let mut backend = factory();
        assert_eq!(backend.model_id(), "fnv1a-32");
        backend.load(&mut |_| {}).unwrap();
        assert_eq!(backend.embed("hello world").unwrap().len(), 32);
    }
}
