//! Search sources
//!
//! The orchestrator talks to two collaborators: a lexical (full-text) source
//! and a semantic (vector similarity) source. The hosted implementations call
//! the notes backend through [`BackendClient`](crate::network::BackendClient).

mod lexical;
mod semantic;
mod traits;

pub use lexical::RpcLexicalSource;
pub use semantic::RpcSemanticSource;
pub use traits::{LexicalSource, SemanticSource};
