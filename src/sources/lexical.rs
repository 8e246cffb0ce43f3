//! Full-text search against the notes backend

use super::traits::LexicalSource;
use crate::network::{BackendClient, BackendRequest};
use crate::query::SearchQuery;
use crate::results::LexicalHit;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

/// Row returned by the `search_notes` procedure
#[derive(Debug, Deserialize)]
struct RankedRow {
    note_id: String,
    folder_id: String,
    title: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    rank: f64,
    #[serde(default)]
    snippet_title: Option<String>,
    #[serde(default)]
    snippet_content: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

impl From<RankedRow> for LexicalHit {
    fn from(row: RankedRow) -> Self {
        Self {
            note_id: row.note_id,
            folder_id: row.folder_id,
            title: row.title,
            content: row.content,
            rank: row.rank,
            highlighted_title: row.snippet_title,
            highlighted_snippet: row.snippet_content,
            created_at: row.created_at,
        }
    }
}

/// Row from the `notes_view` substring fallback
#[derive(Debug, Deserialize)]
struct ViewRow {
    id: String,
    folder_id: String,
    title: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

impl From<ViewRow> for LexicalHit {
    fn from(row: ViewRow) -> Self {
        let mut hit = LexicalHit::new(row.id, row.folder_id, row.title);
        hit.content = row.content;
        hit.created_at = row.created_at;
        hit
    }
}

/// Lexical source backed by the `search_notes` procedure.
///
/// Tag-filtered queries, procedure errors and empty procedure results fall
/// back to a case-insensitive substring match on `notes_view`, newest first.
/// Fallback hits carry rank 0 and no highlights.
pub struct RpcLexicalSource {
    client: BackendClient,
    page_size: usize,
}

impl RpcLexicalSource {
    pub fn new(client: BackendClient, page_size: usize) -> Self {
        Self {
            client,
            page_size: page_size.max(1),
        }
    }

    async fn ranked(&self, query: &SearchQuery) -> Result<Vec<LexicalHit>> {
        let args = json!({
            "q": query.text,
            "folder": query.filters.folder_id,
            "page": query.page.max(1),
            "page_size": self.page_size,
        });
        let rows: Vec<RankedRow> = self
            .client
            .fetch_json(BackendRequest::rpc("search_notes", args))
            .await?;
        Ok(rows.into_iter().map(LexicalHit::from).collect())
    }

    async fn substring(&self, query: &SearchQuery) -> Result<Vec<LexicalHit>> {
        let term = format!("*{}*", sanitize_term(&query.text));
        let mut request = BackendRequest::select("notes_view")
            .param("select", "*")
            .param("or", format!("(title.ilike.{},content.ilike.{})", term, term))
            .param("order", "created_at.desc")
            .param("limit", self.page_size.to_string());

        if let Some(folder) = &query.filters.folder_id {
            request = request.param("folder_id", format!("eq.{}", folder));
        }
        if let Some(tags) = query.filters.tag_filter() {
            request = request.param("tags", format!("cs.{{{}}}", tags.join(",")));
        }

        let rows: Vec<ViewRow> = self.client.fetch_json(request).await?;
        Ok(rows.into_iter().map(LexicalHit::from).collect())
    }
}

#[async_trait]
impl LexicalSource for RpcLexicalSource {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<LexicalHit>> {
        if query.filters.tag_filter().is_none() {
            match self.ranked(query).await {
                Ok(hits) if !hits.is_empty() => return Ok(hits),
                Ok(_) => debug!("search_notes returned no rows, using substring fallback"),
                Err(e) => warn!("search_notes failed, using substring fallback: {}", e),
            }
        }
        self.substring(query).await
    }
}

/// Characters with meaning inside a PostgREST `or=(...)` filter
fn sanitize_term(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            ',' | '(' | ')' | '*' => ' ',
            c => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::SearchFilters;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn ranked_row(id: &str, rank: f64) -> serde_json::Value {
        json!({
            "note_id": id,
            "folder_id": "f1",
            "title": format!("Note {}", id),
            "content": "about cats",
            "rank": rank,
            "snippet_title": format!("Note <em>{}</em>", id),
            "snippet_content": null,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    fn view_row(id: &str) -> serde_json::Value {
        json!({
            "id": id,
            "folder_id": "f1",
            "title": "Cat care",
            "content": null,
            "created_at": "2024-01-01T00:00:00Z",
            "tags": ["pets"]
        })
    }

    async fn source(server: &MockServer) -> RpcLexicalSource {
        RpcLexicalSource::new(BackendClient::new(&server.uri()).unwrap(), 20)
    }

    #[tokio::test]
    async fn test_ranked_results() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/rpc/search_notes"))
            .and(body_partial_json(json!({"q": "cat", "page": 1, "page_size": 20})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([ranked_row("n1", 0.9), ranked_row("n2", 0.4)])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let hits = source(&server)
            .await
            .search(&SearchQuery::simple("cat"))
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].note_id, "n1");
        assert_eq!(hits[0].highlighted_title.as_deref(), Some("Note <em>n1</em>"));
    }

    #[tokio::test]
    async fn test_empty_rpc_falls_back_to_substring() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/rpc/search_notes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/notes_view"))
            .and(query_param("or", "(title.ilike.*cat*,content.ilike.*cat*)"))
            .and(query_param("order", "created_at.desc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([view_row("n3")])))
            .mount(&server)
            .await;

        let hits = source(&server)
            .await
            .search(&SearchQuery::simple("cat"))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].note_id, "n3");
        assert_eq!(hits[0].rank, 0.0);
        assert!(hits[0].highlighted_title.is_none());
        assert_eq!(
            hits[0].created_at.map(|t| t.to_rfc3339()).as_deref(),
            Some("2024-01-01T00:00:00+00:00")
        );
    }

    #[tokio::test]
    async fn test_rpc_error_falls_back() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/rpc/search_notes"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({"message": "boom"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/notes_view"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([view_row("n4")])))
            .mount(&server)
            .await;

        let hits = source(&server)
            .await
            .search(&SearchQuery::simple("cat"))
            .await
            .unwrap();
        assert_eq!(hits[0].note_id, "n4");
    }

    #[tokio::test]
    async fn test_tags_skip_rpc() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/rpc/search_notes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([ranked_row("x", 1.0)])))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/notes_view"))
            .and(query_param("tags", "cs.{pets,home}"))
            .and(query_param("folder_id", "eq.f1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([view_row("n5")])))
            .mount(&server)
            .await;

        let filters = SearchFilters::new().with_folder("f1").with_tags(["pets", "home"]);
        let hits = source(&server)
            .await
            .search(&SearchQuery::new("cat", filters))
            .await
            .unwrap();
        assert_eq!(hits[0].note_id, "n5");
    }

    #[tokio::test]
    async fn test_fallback_error_propagates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/rpc/search_notes"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/notes_view"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .mount(&server)
            .await;

        let err = source(&server)
            .await
            .search(&SearchQuery::simple("cat"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn test_sanitize_term() {
        assert_eq!(sanitize_term("a,b(c)*"), "a b c  ");
    }
}
