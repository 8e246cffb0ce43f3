//! Result type definitions

use super::highlight::{self, Segment};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A keyword (full-text) match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LexicalHit {
    pub note_id: String,
    pub folder_id: String,
    pub title: String,
    #[serde(default)]
    pub content: Option<String>,
    /// Server-provided relevance; 0 for fallback matches
    #[serde(default)]
    pub rank: f64,
    /// Title with `<em>`-style highlight markup
    #[serde(default)]
    pub highlighted_title: Option<String>,
    /// Content excerpt with highlight markup
    #[serde(default)]
    pub highlighted_snippet: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl LexicalHit {
    pub fn new(note_id: impl Into<String>, folder_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            note_id: note_id.into(),
            folder_id: folder_id.into(),
            title: title.into(),
            content: None,
            rank: 0.0,
            highlighted_title: None,
            highlighted_snippet: None,
            created_at: None,
        }
    }

    pub fn with_rank(mut self, rank: f64) -> Self {
        self.rank = rank;
        self
    }

    /// Title runs, preferring the highlighted variant
    pub fn display_title(&self) -> Vec<Segment> {
        highlight::parse(self.highlighted_title.as_deref().unwrap_or(&self.title))
    }

    /// Snippet runs; empty when the server sent no snippet
    pub fn display_snippet(&self) -> Vec<Segment> {
        self.highlighted_snippet
            .as_deref()
            .map(highlight::parse)
            .unwrap_or_default()
    }
}

/// A vector-similarity match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticHit {
    pub note_id: String,
    pub folder_id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    /// Cosine similarity in `[0, 1]`
    pub similarity: f32,
}

impl SemanticHit {
    pub fn new(
        note_id: impl Into<String>,
        folder_id: impl Into<String>,
        title: impl Into<String>,
        similarity: f32,
    ) -> Self {
        Self {
            note_id: note_id.into(),
            folder_id: folder_id.into(),
            title: title.into(),
            content: String::new(),
            similarity: clamp_similarity(similarity),
        }
    }

    /// Similarity as a whole percentage
    pub fn percent(&self) -> u32 {
        (clamp_similarity(self.similarity) * 100.0).round() as u32
    }
}

/// Clamp a similarity score into `[0, 1]`; NaN becomes 0
pub fn clamp_similarity(similarity: f32) -> f32 {
    if similarity.is_nan() {
        0.0
    } else {
        similarity.clamp(0.0, 1.0)
    }
}

/// Which result source a value belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Lexical,
    Semantic,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lexical => "lexical",
            Self::Semantic => "semantic",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a search source failed for one query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum SearchSourceError {
    #[error("Request timed out")]
    Timeout,
    /// The collaborator (backend) call failed
    #[error("Backend error: {0}")]
    Backend(String),
    /// The query embedding could not be computed
    #[error("Embedding error: {0}")]
    Embedding(String),
}

/// Per-source state machine: `idle → pending → (ready | failed)`.
///
/// `Unavailable` marks the semantic source when the embedding worker is in
/// its error state; it is distinct from `Ready` with no hits.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceState<T> {
    Idle,
    Pending,
    Ready(Vec<T>),
    Failed(SearchSourceError),
    Unavailable,
}

impl<T> Default for SourceState<T> {
    fn default() -> Self {
        Self::Idle
    }
}

impl<T> SourceState<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Not waiting on anything
    pub fn is_settled(&self) -> bool {
        !self.is_pending()
    }

    pub fn hits(&self) -> &[T] {
        match self {
            Self::Ready(hits) => hits,
            _ => &[],
        }
    }

    pub fn error(&self) -> Option<&SearchSourceError> {
        match self {
            Self::Failed(e) => Some(e),
            _ => None,
        }
    }
}
