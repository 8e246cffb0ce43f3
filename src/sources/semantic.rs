//! Vector similarity search against the notes backend

use super::traits::SemanticSource;
use crate::network::{BackendClient, BackendRequest};
use crate::results::SemanticHit;
use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
struct MatchRow {
    id: String,
    #[serde(default)]
    folder_id: String,
    title: String,
    #[serde(default)]
    content: Option<String>,
    similarity: f32,
}

impl From<MatchRow> for SemanticHit {
    fn from(row: MatchRow) -> Self {
        let mut hit = SemanticHit::new(row.id, row.folder_id, row.title, row.similarity);
        hit.content = row.content.unwrap_or_default();
        hit
    }
}

/// Semantic source backed by the `match_notes` procedure
pub struct RpcSemanticSource {
    client: BackendClient,
}

impl RpcSemanticSource {
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SemanticSource for RpcSemanticSource {
    async fn match_notes(
        &self,
        embedding: &[f32],
        threshold: f32,
        max_results: usize,
    ) -> Result<Vec<SemanticHit>> {
        let args = json!({
            "query_embedding": embedding,
            "match_threshold": threshold,
            "match_count": max_results,
        });
        let rows: Vec<MatchRow> = self
            .client
            .fetch_json(BackendRequest::rpc("match_notes", args))
            .await?;
        Ok(rows.into_iter().map(SemanticHit::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_match_notes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/rpc/match_notes"))
            .and(body_partial_json(json!({"match_count": 5})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "n1", "folder_id": "f1", "title": "Cats", "content": "purr", "similarity": 0.82},
                {"id": "n2", "folder_id": "f2", "title": "Dogs", "content": null, "similarity": 1.3}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let source = RpcSemanticSource::new(BackendClient::new(&server.uri()).unwrap());
        let hits = source.match_notes(&[0.1, 0.2], 0.3, 5).await.unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].note_id, "n1");
        assert_eq!(hits[0].content, "purr");
        assert_eq!(hits[1].similarity, 1.0);
    }

    #[tokio::test]
    async fn test_backend_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/rpc/match_notes"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"message": "dimension mismatch"})),
            )
            .mount(&server)
            .await;

        let source = RpcSemanticSource::new(BackendClient::new(&server.uri()).unwrap());
        let err = source.match_notes(&[0.1], 0.3, 5).await.unwrap_err();
        assert!(err.to_string().contains("dimension mismatch"));
    }
}
