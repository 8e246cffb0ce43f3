//! Search orchestration module
//!
//! Turns a live, frequently changing query string into up-to-date lexical
//! and semantic result sets. Keystrokes are debounced, each source runs
//! independently, and responses for superseded queries are discarded.

mod debounce;
mod executor;
mod models;

pub use debounce::Debouncer;
pub use executor::{ResultsSubscription, Search};
pub use models::*;
