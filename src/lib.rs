//! TidyMind search: client-side search coordination for a notes application
//!
//! Combines keyword search against the hosted notes backend with semantic
//! search driven by a locally computed query embedding. The embedding model
//! runs on a single shared worker thread; the orchestrator debounces input,
//! keeps each source independent, and never lets a stale response overwrite
//! newer results.

pub mod autocomplete;
pub mod cache;
pub mod config;
pub mod embedding;
pub mod metrics;
pub mod network;
pub mod query;
pub mod results;
pub mod search;
pub mod sources;

pub use config::Settings;
pub use embedding::{Embedder, EmbeddingError, EmbeddingService};
pub use query::{SearchFilters, SearchQuery};
pub use results::{ResultGroups, SearchSourceError};
pub use search::{Dispatch, Search};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Embedding model loaded by the worker unless configured otherwise
pub const DEFAULT_MODEL: &str = "all-MiniLM-L6-v2";

/// Output dimension of [`DEFAULT_MODEL`]
pub const DEFAULT_DIMENSION: usize = 384;
