//! Chroma vector index over HTTP.
//!
//! The query text is embedded with Ollama (`/api/embeddings`), the
//! collection id is resolved by name, and the nearest neighbours are read
//! back from `/api/v1/collections/{id}/query`. Scores are `1 - distance`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, instrument};

use crate::domain::errors::IndexError;
use crate::domain::models::{IndexConfig, RetrievedPassage};
use crate::domain::ports::VectorIndex;

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct CollectionResponse {
    id: String,
}

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    query_embeddings: Vec<Vec<f32>>,
    n_results: usize,
    include: [&'a str; 3],
}

/// Chroma returns one inner list per query embedding.
#[derive(Debug, Default, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    ids: Vec<Vec<String>>,
    #[serde(default)]
    documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    metadatas: Option<Vec<Vec<Option<Map<String, Value>>>>>,
    #[serde(default)]
    distances: Option<Vec<Vec<f32>>>,
}

/// [`VectorIndex`] backed by a Chroma server.
pub struct ChromaIndex {
    http: Client,
    chroma_url: String,
    collection: String,
    embedding_host: String,
    embedding_model: String,
    timeout: Duration,
}

impl ChromaIndex {
    /// `embedding_host` is the Ollama server that embeds queries.
    pub fn new(config: &IndexConfig, embedding_host: &str) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            chroma_url: config.chroma_url.trim_end_matches('/').to_string(),
            collection: config.collection.clone(),
            embedding_host: embedding_host.trim_end_matches('/').to_string(),
            embedding_model: config.embedding_model.clone(),
            timeout,
        })
    }

    fn transport(&self, err: &reqwest::Error) -> IndexError {
        if err.is_timeout() {
            IndexError::Timeout(self.timeout.as_secs())
        } else {
            IndexError::Unreachable(err.to_string())
        }
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, IndexError> {
        let response = self
            .http
            .post(format!("{}/api/embeddings", self.embedding_host))
            .json(&EmbeddingRequest {
                model: &self.embedding_model,
                prompt: text,
            })
            .send()
            .await
            .map_err(|e| self.transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IndexError::Unreachable(format!("embedding HTTP {status}: {body}")));
        }

        let embedding: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| IndexError::InvalidResponse(format!("embedding: {e}")))?;
        Ok(embedding.embedding)
    }

    /// Resolve the collection id; `None` when the collection does not exist.
    async fn collection_id(&self) -> Result<Option<String>, IndexError> {
        let response = self
            .http
            .get(format!("{}/api/v1/collections/{}", self.chroma_url, self.collection))
            .send()
            .await
            .map_err(|e| self.transport(&e))?;

        let status = response.status();
        if status.is_success() {
            let collection: CollectionResponse = response
                .json()
                .await
                .map_err(|e| IndexError::InvalidResponse(format!("collection: {e}")))?;
            return Ok(Some(collection.id));
        }

        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::NOT_FOUND || body.contains("does not exist") {
            return Ok(None);
        }
        Err(IndexError::Unreachable(format!("collection HTTP {status}: {body}")))
    }
}

fn into_passages(response: QueryResponse) -> Vec<RetrievedPassage> {
    let ids = response.ids.into_iter().next().unwrap_or_default();
    let documents = response
        .documents
        .and_then(|d| d.into_iter().next())
        .unwrap_or_default();
    let metadatas = response
        .metadatas
        .and_then(|m| m.into_iter().next())
        .unwrap_or_default();
    let distances = response
        .distances
        .and_then(|d| d.into_iter().next())
        .unwrap_or_default();

    ids.into_iter()
        .enumerate()
        .filter_map(|(i, id)| {
            let text = documents.get(i).cloned().flatten()?;
            let source_id = metadatas
                .get(i)
                .and_then(Option::as_ref)
                .and_then(|m| m.get("source"))
                .and_then(Value::as_str)
                .map_or(id, ToString::to_string);
            let score = distances.get(i).map_or(0.0, |d| 1.0 - d);
            Some(RetrievedPassage::new(text, source_id, score))
        })
        .collect()
}

#[async_trait]
impl VectorIndex for ChromaIndex {
    fn name(&self) -> &str {
        "chroma"
    }

    #[instrument(skip(self, text), fields(collection = %self.collection))]
    async fn query(&self, text: &str, k: usize) -> Result<Vec<RetrievedPassage>, IndexError> {
        let Some(id) = self.collection_id().await? else {
            debug!("Collection missing, no passages");
            return Ok(Vec::new());
        };

        let embedding = self.embed(text).await?;
        let response = self
            .http
            .post(format!("{}/api/v1/collections/{id}/query", self.chroma_url))
            .json(&QueryRequest {
                query_embeddings: vec![embedding],
                n_results: k,
                include: ["documents", "metadatas", "distances"],
            })
            .send()
            .await
            .map_err(|e| self.transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IndexError::Unreachable(format!("query HTTP {status}: {body}")));
        }

        let parsed: QueryResponse = response
            .json()
            .await
            .map_err(|e| IndexError::InvalidResponse(format!("query: {e}")))?;
        let passages = into_passages(parsed);
        debug!(hits = passages.len(), "Chroma query completed");
        Ok(passages)
    }
}
