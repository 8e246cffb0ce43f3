//! Client-side text embeddings
//!
//! A single long-lived worker thread loads the embedding model once and serves
//! every caller in the process.
//!
//! - `backend`: model implementations run on the worker thread
//! - `worker`: the bridge (`EmbeddingService`) with request/response correlation
//! - `status`: observable lifecycle state (`idle | loading | ready | error`)

mod backend;
mod error;
mod status;
mod worker;

pub use backend::{factory_from_settings, BackendFactory, EmbeddingBackend, FastEmbedBackend, HashEmbedder};
pub use error::EmbeddingError;
pub use status::{LifecycleState, StatusStore, WorkerStatus};
pub use worker::EmbeddingService;

use async_trait::async_trait;

/// Anything that can turn text into a vector for the search orchestrator
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Lifecycle status used to decide whether semantic search is available
    fn status(&self) -> WorkerStatus;
}
