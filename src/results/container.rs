//! Presentation merge of the two result sources
//!
//! Lexical and semantic hits are kept in separate labelled groups, each in its
//! own source's relevance order. Scores from different sources are never
//! compared or normalized against each other and hits are never interleaved.

use super::types::*;
use crate::embedding::{LifecycleState, WorkerStatus};
use crate::search::SearchState;
use serde::Serialize;

/// Identifies a result group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum GroupKind {
    LexicalMatches,
    SemanticMatches,
}

impl GroupKind {
    /// Stable identifier (`lexical-matches`, `semantic-matches`)
    pub fn id(&self) -> &'static str {
        match self {
            Self::LexicalMatches => "lexical-matches",
            Self::SemanticMatches => "semantic-matches",
        }
    }

    /// Human-readable heading
    pub fn label(&self) -> &'static str {
        match self {
            Self::LexicalMatches => "Keyword Matches",
            Self::SemanticMatches => "AI Semantic Matches",
        }
    }
}

/// What a group should render besides its hits
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupStatus {
    /// Nothing requested for this source
    Idle,
    Loading,
    Ready,
    Failed(SearchSourceError),
    /// Semantic search disabled (embedding worker failed)
    Unavailable,
}

/// One source's hits, ordered by that source's relevance
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultGroup<T> {
    pub kind: GroupKind,
    pub status: GroupStatus,
    pub hits: Vec<T>,
}

impl<T: Clone> ResultGroup<T> {
    fn from_source(kind: GroupKind, state: &SourceState<T>) -> Self {
        let status = match state {
            SourceState::Idle => GroupStatus::Idle,
            SourceState::Pending => GroupStatus::Loading,
            SourceState::Ready(_) => GroupStatus::Ready,
            SourceState::Failed(e) => GroupStatus::Failed(e.clone()),
            SourceState::Unavailable => GroupStatus::Unavailable,
        };
        Self {
            kind,
            status,
            hits: state.hits().to_vec(),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.status == GroupStatus::Loading
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, GroupStatus::Failed(_))
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

/// Renderable result set for one committed query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultGroups {
    pub query: String,
    pub lexical: ResultGroup<LexicalHit>,
    pub semantic: ResultGroup<SemanticHit>,
}

impl ResultGroups {
    /// Build the grouped view of an orchestrator state
    pub fn from_state(state: &SearchState) -> Self {
        let mut lexical = ResultGroup::from_source(GroupKind::LexicalMatches, &state.lexical);
        let mut semantic = ResultGroup::from_source(GroupKind::SemanticMatches, &state.semantic);

        // Stable: equal server ranks (e.g. fallback rows) keep server order
        lexical.hits.sort_by(|a, b| b.rank.total_cmp(&a.rank));

        for hit in &mut semantic.hits {
            hit.similarity = clamp_similarity(hit.similarity);
        }
        semantic
            .hits
            .sort_by(|a, b| b.similarity.total_cmp(&a.similarity));

        Self {
            query: state.query.text.clone(),
            lexical,
            semantic,
        }
    }

    /// Both groups finished
    pub fn is_settled(&self) -> bool {
        !self.lexical.is_loading() && !self.semantic.is_loading()
    }

    /// "No results" for a non-empty, fully settled query.
    ///
    /// A failed source does not count as having returned zero items, so a
    /// set with an error is never reported as empty.
    pub fn is_empty(&self) -> bool {
        !self.query.is_empty()
            && self.is_settled()
            && !self.lexical.is_failed()
            && !self.semantic.is_failed()
            && self.total() == 0
    }

    /// Number of hits across both groups
    pub fn total(&self) -> usize {
        self.lexical.len() + self.semantic.len()
    }

    /// Best semantic similarity, if any
    pub fn top_similarity(&self) -> Option<f32> {
        self.semantic.hits.first().map(|h| h.similarity)
    }

    /// Groups in display order
    pub fn group_ids(&self) -> [&'static str; 2] {
        [self.lexical.kind.id(), self.semantic.kind.id()]
    }
}

/// Status line for the embedding model, shown above semantic results
pub fn model_banner(status: &WorkerStatus) -> Option<String> {
    match status.state {
        LifecycleState::Loading => Some(format!(
            "Initializing AI Search... ({}%)",
            status.progress.round() as u32
        )),
        LifecycleState::Error => {
            Some("AI Search unavailable. Using keyword search only.".to_string())
        }
        LifecycleState::Idle | LifecycleState::Ready => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::SearchQuery;

    fn state(
        text: &str,
        lexical: SourceState<LexicalHit>,
        semantic: SourceState<SemanticHit>,
    ) -> SearchState {
        SearchState {
            query: SearchQuery::simple(text),
            lexical,
            semantic,
            ..Default::default()
        }
    }

    #[test]
    fn test_groups_are_ordered_per_source() {
        let lexical = vec![
            LexicalHit::new("a", "f", "A").with_rank(0.1),
            LexicalHit::new("b", "f", "B").with_rank(0.9),
            LexicalHit::new("c", "f", "C").with_rank(0.1),
        ];
        let semantic = vec![
            SemanticHit::new("x", "f", "X", 0.4),
            SemanticHit::new("y", "f", "Y", 0.8),
        ];
        let groups = ResultGroups::from_state(&state(
            "cat",
            SourceState::Ready(lexical),
            SourceState::Ready(semantic),
        ));

        let lex: Vec<_> = groups.lexical.hits.iter().map(|h| h.note_id.as_str()).collect();
        assert_eq!(lex, vec!["b", "a", "c"]);
        let sem: Vec<_> = groups.semantic.hits.iter().map(|h| h.note_id.as_str()).collect();
        assert_eq!(sem, vec!["y", "x"]);
        assert_eq!(groups.top_similarity(), Some(0.8));
        assert_eq!(groups.group_ids(), ["lexical-matches", "semantic-matches"]);
    }

    #[test]
    fn test_same_note_stays_in_both_groups() {
        let groups = ResultGroups::from_state(&state(
            "cat",
            SourceState::Ready(vec![LexicalHit::new("n1", "f", "Cats")]),
            SourceState::Ready(vec![SemanticHit::new("n1", "f", "Cats", 0.9)]),
        ));
        assert_eq!(groups.total(), 2);
    }

    #[test]
    fn test_emptiness_requires_settled_non_empty_query() {
        let pending = ResultGroups::from_state(&state(
            "cat",
            SourceState::Ready(vec![]),
            SourceState::Pending,
        ));
        assert!(!pending.is_empty());

        let settled = ResultGroups::from_state(&state(
            "cat",
            SourceState::Ready(vec![]),
            SourceState::Ready(vec![]),
        ));
        assert!(settled.is_empty());

        let blank = ResultGroups::from_state(&state("", SourceState::Idle, SourceState::Idle));
        assert!(!blank.is_empty());
        assert_eq!(blank.total(), 0);
    }

    #[test]
    fn test_unavailable_is_not_no_matches() {
        let groups = ResultGroups::from_state(&state(
            "cat",
            SourceState::Ready(vec![LexicalHit::new("a", "f", "A")]),
            SourceState::Unavailable,
        ));
        assert_eq!(groups.semantic.status, GroupStatus::Unavailable);
        assert_ne!(groups.semantic.status, GroupStatus::Ready);

        let failed = ResultGroups::from_state(&state(
            "cat",
            SourceState::Ready(vec![]),
            SourceState::Failed(SearchSourceError::Timeout),
        ));
        assert!(!failed.is_empty());
    }

    #[test]
    fn test_model_banner() {
        let loading = WorkerStatus {
            state: LifecycleState::Loading,
            progress: 41.6,
        };
        assert_eq!(
            model_banner(&loading).as_deref(),
            Some("Initializing AI Search... (42%)")
        );
        let error = WorkerStatus {
            state: LifecycleState::Error,
            progress: 0.0,
        };
        assert!(model_banner(&error).unwrap().contains("keyword search only"));
        assert!(model_banner(&WorkerStatus::default()).is_none());
    }
}
