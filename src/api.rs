//! HTTP client for the resume-assistant backend.
//!
//! The backend exposes two endpoints: `POST /ingest` (multipart upload) and
//! `POST /chat` (JSON query). Everything else about retrieval lives server-side.

use async_trait::async_trait;
use reqwest::{multipart, Client, Response};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

use crate::citations::{self, Citation};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API error (status {status}): {body}")]
    Status { status: u16, body: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Could not read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Background task failed: {0}")]
    Task(String),
}

impl ApiError {
    /// Best-effort text for the transcript: a JSON `detail` field, then the raw
    /// body, then the error's own message.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Status { status, body } => {
                let detail = extract_detail(body);
                if detail.is_empty() {
                    status.to_string()
                } else {
                    format!("{} {}", status, detail)
                }
            }
            other => other.to_string(),
        }
    }
}

fn extract_detail(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        match value.get("detail") {
            Some(serde_json::Value::String(detail)) => return detail.clone(),
            Some(serde_json::Value::Null) | None => {}
            Some(other) => return other.to_string(),
        }
    }
    body.trim().to_string()
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IngestResponse {
    pub filename: String,
    pub chunks: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub query: String,
    pub k: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub answer: String,
    #[serde(default, deserialize_with = "lenient_citations")]
    pub citations: Vec<Citation>,
}

// A malformed citation is dropped rather than failing the whole answer.
fn lenient_citations<'de, D>(deserializer: D) -> Result<Vec<Citation>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Array(values) => values,
        _ => Vec::new(),
    };
    Ok(citations::parse_lenient(raw))
}

/// The two backend operations the client components depend on.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn ingest(&self, path: &Path) -> Result<IngestResponse, ApiError>;

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ApiError>;
}

/// Name shown to the user for a local file.
pub fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

async fn success_body(response: Response) -> Result<String, ApiError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response.text().await?)
}

#[async_trait]
impl Backend for ApiClient {
    async fn ingest(&self, path: &Path) -> Result<IngestResponse, ApiError> {
        let url = format!("{}/ingest", self.base_url);
        let filename = file_label(path);

        let bytes = tokio::fs::read(path).await.map_err(|source| ApiError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let part = multipart::Part::bytes(bytes).file_name(filename.clone());
        let form = multipart::Form::new().part("file", part);

        debug!(%url, file = %filename, "sending ingest request");
        let response = self.client.post(&url).multipart(form).send().await?;
        let body = success_body(response).await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ApiError> {
        let url = format!("{}/chat", self.base_url);

        debug!(%url, k = request.k, model = ?request.model, "sending chat request");
        let response = self.client.post(&url).json(request).send().await?;
        let body = success_body(response).await?;
        Ok(serde_json::from_str(&body)?)
    }
}
