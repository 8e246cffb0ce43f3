//! Note title suggestions
//!
//! Completes `[[wiki-link` input with matching note titles.

use crate::network::{BackendClient, BackendRequest};
use anyhow::Result;
use serde::{Deserialize, Serialize};

const SUGGESTION_LIMIT: usize = 10;

/// A note matching the typed title fragment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleSuggestion {
    pub id: String,
    pub title: String,
    pub folder_id: String,
    pub folder_name: String,
}

#[derive(Debug, Deserialize)]
struct FolderRef {
    name: String,
}

#[derive(Debug, Deserialize)]
struct NoteRow {
    id: String,
    title: String,
    folder_id: String,
    folders: Option<FolderRef>,
}

impl From<NoteRow> for TitleSuggestion {
    fn from(row: NoteRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            folder_id: row.folder_id,
            folder_name: row.folders.map(|f| f.name).unwrap_or_default(),
        }
    }
}

/// Title lookup against the `notes` table
pub struct TitleSuggestions {
    client: BackendClient,
}

impl TitleSuggestions {
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }

    /// Up to ten notes whose title contains `query`, ordered by title.
    /// Blank input returns nothing without touching the network.
    pub async fn suggest(&self, query: &str) -> Result<Vec<TitleSuggestion>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let request = BackendRequest::select("notes")
            .param("select", "id,title,folder_id,folders!inner(name)")
            .param("title", format!("ilike.*{}*", query.replace('*', " ")))
            .param("order", "title")
            .param("limit", SUGGESTION_LIMIT.to_string());

        let rows: Vec<NoteRow> = self.client.fetch_json(request).await?;
        Ok(rows.into_iter().map(TitleSuggestion::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_suggest() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/notes"))
            .and(query_param("title", "ilike.*cat*"))
            .and(query_param("order", "title"))
            .and(query_param("limit", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "n1", "title": "Cat care", "folder_id": "f1", "folders": {"name": "Pets"}}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let suggestions = TitleSuggestions::new(BackendClient::new(&server.uri()).unwrap());
        let found = suggestions.suggest(" cat ").await.unwrap();

        assert_eq!(
            found,
            vec![TitleSuggestion {
                id: "n1".to_string(),
                title: "Cat care".to_string(),
                folder_id: "f1".to_string(),
                folder_name: "Pets".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_blank_query_skips_network() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(0)
            .mount(&server)
            .await;

        let suggestions = TitleSuggestions::new(BackendClient::new(&server.uri()).unwrap());
        assert!(suggestions.suggest("   ").await.unwrap().is_empty());
    }
}
