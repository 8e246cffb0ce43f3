//! Orchestrator state models

use crate::query::SearchQuery;
use crate::results::{LexicalHit, SemanticHit, SourceState};

/// Observable orchestrator state for the most recently committed query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchState {
    /// Last committed query
    pub query: SearchQuery,
    pub lexical: SourceState<LexicalHit>,
    pub semantic: SourceState<SemanticHit>,
    /// Bumped on every commit; responses tagged with an older value are
    /// discarded
    pub generation: u64,
}

impl SearchState {
    /// Neither source is waiting on a response
    pub fn is_settled(&self) -> bool {
        self.lexical.is_settled() && self.semantic.is_settled()
    }
}

/// Outcome of handing a query to the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Waiting for the debounce window to pass
    Scheduled,
    /// Query committed and sources dispatched under this generation
    Committed { generation: u64 },
    /// Blank input: state reset, nothing dispatched
    EmptyQueryNoop,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_settled() {
        let state = SearchState::default();
        assert!(state.is_settled());
        assert_eq!(state.generation, 0);
        assert!(state.query.is_empty());
    }

    #[test]
    fn test_pending_source_is_not_settled() {
        let state = SearchState {
            semantic: SourceState::Pending,
            ..Default::default()
        };
        assert!(!state.is_settled());
    }
}
