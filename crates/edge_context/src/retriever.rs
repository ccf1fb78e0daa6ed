//! Vector retrieval seam and its HTTP client.
//!
//! The vector store is reached through a retrieval sidecar:
//!
//! ```text
//! POST {endpoint}/retrieve  {"collection": "...", "query": "...", "top_k": 15}
//! 200 {"results": [{"text": "...", "score": 0.83, "metadata": {"path": "docs/02_hmi.txt"}}]}
//! ```

use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use edge_core::RetrievalSettings;

use crate::error::{ContextError, ContextResult, RetrievalError, RetrievalResult};

/// Upper bound for one retrieval round trip.
const RETRIEVAL_TIMEOUT: Duration = Duration::from_secs(15);

/// A ranked passage with attribution metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievedPassage {
    pub text: String,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl RetrievedPassage {
    pub fn new(text: impl Into<String>, score: Option<f64>, path: Option<&str>) -> Self {
        let mut metadata = Map::new();
        if let Some(path) = path {
            metadata.insert("path".to_string(), Value::String(path.to_string()));
        }
        Self {
            text: text.into(),
            score,
            metadata,
        }
    }

    /// Source path from `path`, `file_path` or `filename` metadata.
    pub fn source_path(&self) -> &str {
        ["path", "file_path", "filename"]
            .iter()
            .find_map(|key| {
                self.metadata
                    .get(*key)
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
            })
            .unwrap_or("unknown")
    }
}

/// Similarity search over the documentation collection.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Up to `top_k` passages, best first.
    async fn retrieve(&self, query: &str, top_k: usize) -> RetrievalResult<Vec<RetrievedPassage>>;
}

#[derive(Debug, Serialize)]
struct RetrieveRequest<'a> {
    collection: &'a str,
    query: &'a str,
    top_k: usize,
}

#[derive(Debug, Deserialize)]
struct RetrieveResponse {
    results: Vec<RetrievedPassage>,
}

/// Retriever talking to the retrieval sidecar over HTTP.
#[derive(Debug, Clone)]
pub struct HttpRetriever {
    client: reqwest::Client,
    endpoint: String,
    collection: String,
}

impl HttpRetriever {
    pub fn new(endpoint: impl Into<String>, collection: impl Into<String>) -> ContextResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(RETRIEVAL_TIMEOUT)
            .build()
            .map_err(|e| ContextError::Client(e.to_string()))?;
        let endpoint: String = endpoint.into();
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            collection: collection.into(),
        })
    }

    pub fn from_settings(settings: &RetrievalSettings) -> ContextResult<Self> {
        Self::new(&settings.endpoint, &settings.collection)
    }

    fn retrieve_url(&self) -> String {
        format!("{}/retrieve", self.endpoint)
    }
}

#[async_trait]
impl Retriever for HttpRetriever {
    async fn retrieve(&self, query: &str, top_k: usize) -> RetrievalResult<Vec<RetrievedPassage>> {
        let request = RetrieveRequest {
            collection: &self.collection,
            query,
            top_k,
        };
        let response = self
            .client
            .post(self.retrieve_url())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(RetrievalError::BadStatus {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let parsed: RetrieveResponse =
            serde_json::from_str(&body).map_err(|e| RetrievalError::Decode(e.to_string()))?;
        debug!(
            collection = %self.collection,
            results = parsed.results.len(),
            "Retrieved passages"
        );
        Ok(parsed.results)
    }
}
