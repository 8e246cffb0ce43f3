//! Search source traits

use crate::query::SearchQuery;
use crate::results::{LexicalHit, SemanticHit};
use anyhow::Result;
use async_trait::async_trait;

/// Full-text search over notes
#[async_trait]
pub trait LexicalSource: Send + Sync {
    /// Source name used in logs
    fn name(&self) -> &str {
        "lexical"
    }

    /// Run a keyword search for a non-empty query
    async fn search(&self, query: &SearchQuery) -> Result<Vec<LexicalHit>>;
}

/// Vector similarity search over note embeddings
#[async_trait]
pub trait SemanticSource: Send + Sync {
    fn name(&self) -> &str {
        "semantic"
    }

    /// Return notes whose similarity to `embedding` is at least `threshold`,
    /// at most `max_results` of them
    async fn match_notes(
        &self,
        embedding: &[f32],
        threshold: f32,
        max_results: usize,
    ) -> Result<Vec<SemanticHit>>;
}
