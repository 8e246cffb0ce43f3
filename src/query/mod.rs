//! Search query model
//!
//! A query is the raw search-box text plus optional folder and tag filters.
//! Whitespace-only input is empty and never produces any work.

use serde::{Deserialize, Serialize};

/// Optional scoping for lexical search
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SearchFilters {
    /// Restrict to a single folder
    pub folder_id: Option<String>,
    /// Require all of these tags
    pub tags: Option<Vec<String>>,
}

impl SearchFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_folder(mut self, folder_id: impl Into<String>) -> Self {
        self.folder_id = Some(folder_id.into());
        self
    }

    /// Set the tag filter; an empty list clears it
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tags: Vec<String> = tags.into_iter().map(Into::into).collect();
        self.tags = if tags.is_empty() { None } else { Some(tags) };
        self
    }

    /// Parse comma-separated tag input (`"rust, async,,db"`)
    pub fn parse_tags(input: &str) -> Vec<String> {
        input
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from)
            .collect()
    }

    /// Tags as a slice, `None` when no tag filter is active
    pub fn tag_filter(&self) -> Option<&[String]> {
        self.tags.as_deref().filter(|t| !t.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.folder_id.is_none() && self.tag_filter().is_none()
    }
}

/// A committed search query
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// The search text, trimmed
    pub text: String,
    pub filters: SearchFilters,
    /// Lexical page (1-indexed)
    pub page: u32,
}

impl SearchQuery {
    /// Build a query from raw search-box input
    pub fn new(raw: &str, filters: SearchFilters) -> Self {
        Self {
            text: raw.trim().to_string(),
            filters,
            page: 1,
        }
    }

    /// Query with no filters
    pub fn simple(raw: &str) -> Self {
        Self::new(raw, SearchFilters::default())
    }

    /// Set page number
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }

    /// Check if query is empty
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Length in characters (not bytes)
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    /// Whether the query is long enough to justify computing an embedding
    pub fn semantic_eligible(&self, min_chars: usize) -> bool {
        !self.is_empty() && self.char_len() >= min_chars
    }
}
