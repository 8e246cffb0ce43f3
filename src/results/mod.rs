//! Result types and presentation grouping
//!
//! Defines the hit types returned by each source, the per-source state and
//! error taxonomy, and the grouped view handed to callers.

mod container;
pub mod highlight;
mod types;

pub use container::{model_banner, GroupKind, GroupStatus, ResultGroup, ResultGroups};
pub use types::*;
