//! HTTP client for the hosted notes backend
//!
//! The backend exposes a PostgREST-style REST root at `<url>/rest/v1`:
//! stored procedures under `/rpc/<name>` and table/view selects under `/<table>`.

use crate::config::BackendSettings;
use anyhow::{anyhow, Result};
use reqwest::{Client, Response};
use url::Url;

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// Request against the backend REST root
#[derive(Debug, Clone)]
pub struct BackendRequest {
    /// Path relative to the REST root (e.g. `rpc/search_notes`)
    pub path: String,
    pub method: HttpMethod,
    /// Query parameters, order preserved
    pub params: Vec<(String, String)>,
    /// JSON body for POST requests
    pub body: Option<serde_json::Value>,
}

impl BackendRequest {
    /// Call a stored procedure with a JSON argument object
    pub fn rpc(name: &str, args: serde_json::Value) -> Self {
        Self {
            path: format!("rpc/{}", name),
            method: HttpMethod::Post,
            params: Vec::new(),
            body: Some(args),
        }
    }

    /// Select rows from a table or view
    pub fn select(table: &str) -> Self {
        Self {
            path: table.to_string(),
            method: HttpMethod::Get,
            params: Vec::new(),
            body: None,
        }
    }

    /// Add a query parameter
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }
}

/// Backend response
#[derive(Debug)]
pub struct BackendResponse {
    pub status: u16,
    pub text: String,
}

impl BackendResponse {
    /// Parse response as JSON
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.text)?)
    }

    /// Check if response is successful (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Fail with the backend's message unless the response is 2xx
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }
        let message = serde_json::from_str::<serde_json::Value>(&self.text)
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
            .unwrap_or_else(|| self.text.clone());
        Err(anyhow!("HTTP error {}: {}", self.status, message))
    }
}

/// HTTP client wrapper carrying the backend base URL and credentials
#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    rest_root: Url,
    api_key: Option<String>,
}

impl BackendClient {
    /// Create a new client from backend settings
    pub fn with_settings(settings: &BackendSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.request_timeout())
            .gzip(true)
            .brotli(true)
            .build()?;

        let base = settings.url.trim_end_matches('/');
        let rest_root = Url::parse(&format!("{}/rest/v1/", base))?;

        Ok(Self {
            client,
            rest_root,
            api_key: settings.api_key.clone(),
        })
    }

    /// Create a client for a base URL with no credentials
    pub fn new(url: &str) -> Result<Self> {
        Self::with_settings(&BackendSettings {
            url: url.to_string(),
            ..Default::default()
        })
    }

    /// Resolve a request path against the REST root
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.rest_root.join(path.trim_start_matches('/'))?)
    }

    /// Execute a backend request
    pub async fn execute(&self, request: BackendRequest) -> Result<BackendResponse> {
        let url = self.endpoint(&request.path)?;

        let mut req_builder = match request.method {
            HttpMethod::Get => self.client.get(url),
            HttpMethod::Post => self.client.post(url),
        };

        req_builder = req_builder.header("Accept", "application/json");

        if let Some(ref key) = self.api_key {
            req_builder = req_builder
                .header("apikey", key)
                .header("Authorization", format!("Bearer {}", key));
        }

        if !request.params.is_empty() {
            req_builder = req_builder.query(&request.params);
        }

        if let Some(body) = request.body {
            req_builder = req_builder.json(&body);
        }

        let response = req_builder.send().await?;

        Self::parse_response(response).await
    }

    /// Execute a request and decode a successful JSON body
    pub async fn fetch_json<T: serde::de::DeserializeOwned>(
        &self,
        request: BackendRequest,
    ) -> Result<T> {
        self.execute(request).await?.error_for_status()?.json()
    }

    async fn parse_response(response: Response) -> Result<BackendResponse> {
        let status = response.status().as_u16();
        let text = response.text().await?;
        Ok(BackendResponse { status, text })
    }
}
