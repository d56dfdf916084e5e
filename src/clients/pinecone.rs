//! Pinecone control plane (index lifecycle) and data plane (query, upsert).
//!
//! The control plane lives at a fixed controller URL. Each index has its own
//! data-plane host, returned by `describe_index`; an [`IndexHandle`] is bound
//! to that host.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::clients::openai::EMBEDDING_DIMENSION;
use crate::config::Config;
use crate::error::AppError;
use crate::models::matches::QueryMatch;

const SERVICE: &str = "Pinecone";
const API_VERSION: &str = "2024-07";

/// Index metadata returned by the control plane.
#[derive(Debug, Clone, Deserialize)]
pub struct IndexDescription {
    pub name: String,
    pub host: String,
    #[serde(default)]
    pub dimension: Option<u32>,
    #[serde(default)]
    pub metric: Option<String>,
    pub status: IndexStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexStatus {
    pub ready: bool,
    #[serde(default)]
    pub state: Option<String>,
}

/// Body of `POST /indexes`.
///
/// # Example
///
/// ```json
/// {
///   "name": "video-context",
///   "dimension": 1536,
///   "metric": "cosine",
///   "spec": { "serverless": { "cloud": "aws", "region": "us-east-1" } }
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct CreateIndexRequest {
    pub name: String,
    pub dimension: u32,
    pub metric: String,
    pub spec: IndexSpec,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexSpec {
    pub serverless: ServerlessSpec,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerlessSpec {
    pub cloud: String,
    pub region: String,
}

impl CreateIndexRequest {
    /// Serverless cosine index sized for the embedding model (`aws` / `us-east-1`).
    pub fn serverless(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dimension: EMBEDDING_DIMENSION,
            metric: "cosine".to_string(),
            spec: IndexSpec {
                serverless: ServerlessSpec {
                    cloud: "aws".to_string(),
                    region: "us-east-1".to_string(),
                },
            },
        }
    }
}

/// Body of `POST /query`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub vector: Vec<f32>,
    pub top_k: u32,
    pub include_values: bool,
    pub include_metadata: bool,
}

impl QueryRequest {
    /// Query returning metadata but not stored vector values.
    pub fn with_metadata(vector: Vec<f32>, top_k: u32) -> Self {
        Self {
            vector,
            top_k,
            include_values: false,
            include_metadata: true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

/// A vector to store, keyed by `id`.
#[derive(Debug, Clone, Serialize)]
pub struct Vector {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct UpsertRequest<'a> {
    vectors: &'a [Vector],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: u64,
}

/// Control-plane client.
#[derive(Debug, Clone)]
pub struct PineconeClient {
    http: reqwest::Client,
    controller: Url,
    api_key: String,
}

impl PineconeClient {
    pub fn new(controller_url: &str, api_key: impl Into<String>, timeout: Duration) -> Result<Self, AppError> {
        Ok(Self {
            http: super::http_client(timeout)?,
            controller: super::base_url(controller_url)?,
            api_key: api_key.into(),
        })
    }

    /// # Errors
    ///
    /// Returns `MissingSetting` if `PINECONE_API_KEY` is not configured.
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let api_key = config
            .pinecone_api_key
            .clone()
            .filter(|key| !key.is_empty())
            .ok_or(AppError::MissingSetting("PINECONE_API_KEY"))?;
        Self::new(&config.pinecone_controller_url, api_key, config.http_timeout())
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
    }

    /// Describe `name`, or `None` if the index does not exist.
    pub async fn describe_index(&self, name: &str) -> Result<Option<IndexDescription>, AppError> {
        let url = self.controller.join(&format!("indexes/{}", name))?;
        let response = self.request(reqwest::Method::GET, url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let description = super::check_status(SERVICE, response).await?.json().await?;
        Ok(Some(description))
    }

    pub async fn create_index(&self, request: &CreateIndexRequest) -> Result<IndexDescription, AppError> {
        let url = self.controller.join("indexes")?;
        let response = self
            .request(reqwest::Method::POST, url)
            .json(request)
            .send()
            .await?;

        let description = super::check_status(SERVICE, response).await?.json().await?;
        tracing::info!(index = %request.name, "Index created");
        Ok(description)
    }

    /// Data-plane handle for an existing index.
    ///
    /// # Errors
    ///
    /// Returns `IndexNotFound` if the index does not exist.
    pub async fn index(&self, name: &str) -> Result<IndexHandle, AppError> {
        let description = self
            .describe_index(name)
            .await?
            .ok_or_else(|| AppError::IndexNotFound(name.to_string()))?;
        self.handle(&description)
    }

    /// Bind a handle to the host in `description`.
    ///
    /// Hosts are returned without a scheme; `https` is assumed unless one is present.
    pub fn handle(&self, description: &IndexDescription) -> Result<IndexHandle, AppError> {
        let host = if description.host.contains("://") {
            description.host.clone()
        } else {
            format!("https://{}", description.host)
        };

        Ok(IndexHandle {
            http: self.http.clone(),
            base: super::base_url(&host)?,
            api_key: self.api_key.clone(),
            name: description.name.clone(),
        })
    }
}

/// Data-plane client bound to one index.
#[derive(Debug, Clone)]
pub struct IndexHandle {
    http: reqwest::Client,
    base: Url,
    api_key: String,
    name: String,
}

impl IndexHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    fn post(&self, path: &str) -> Result<reqwest::RequestBuilder, AppError> {
        Ok(self
            .http
            .post(self.base.join(path)?)
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION))
    }

    /// Nearest neighbours of `request.vector`, best first.
    pub async fn query(&self, request: &QueryRequest) -> Result<Vec<QueryMatch>, AppError> {
        let response = self.post("query")?.json(request).send().await?;
        let body: QueryResponse = super::check_status(SERVICE, response).await?.json().await?;

        tracing::debug!(index = %self.name, matches = body.matches.len(), "Query complete");
        Ok(body.matches)
    }

    /// Insert or overwrite `vectors`; returns the count Pinecone reports.
    pub async fn upsert(&self, vectors: &[Vector]) -> Result<u64, AppError> {
        let response = self
            .post("vectors/upsert")?
            .json(&UpsertRequest { vectors })
            .send()
            .await?;
        let body: UpsertResponse = super::check_status(SERVICE, response).await?.json().await?;
        Ok(body.upserted_count)
    }
}
