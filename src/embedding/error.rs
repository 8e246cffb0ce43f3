use std::time::Duration;

/// Errors returned by [`crate::embedding::EmbeddingService::embed`]
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EmbeddingError {
    /// The worker could not start or load its model. Persists until the
    /// worker is shut down and recreated.
    #[error("Embedding worker failed to initialize: {0}")]
    WorkerInit(String),

    /// A single extraction failed; the worker stays usable.
    #[error("Embedding generation failed: {0}")]
    Extraction(String),

    #[error("Embedding timed out after {0:?}")]
    Timeout(Duration),

    /// The worker went away (shutdown) before answering.
    #[error("Embedding worker terminated before responding")]
    WorkerGone,
}

impl EmbeddingError {
    /// Whether this failure disables semantic search as a whole
    pub fn is_worker_failure(&self) -> bool {
        matches!(self, Self::WorkerInit(_))
    }
}
