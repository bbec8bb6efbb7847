//! Figure storage collaborator.
//!
//! Rendered figures are stored through a three-step upload-URL handshake:
//! request an upload URL, POST the raw bytes to it (yielding a storage id),
//! then confirm the metadata (yielding the figure id questions reference).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::error::StorageError;

/// Metadata confirmed after a successful upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FigureMeta {
    pub storage_id: String,
    pub width: u32,
    pub height: u32,
    pub alt_text: String,
    pub aspect_ratio: String,
}

/// Reference to a stored figure, carried by questions and DLQ records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FigureRef {
    /// Id the question document references.
    pub figure_id: String,
    /// Id of the underlying stored bytes.
    pub storage_id: String,
    pub alt_text: String,
}

/// Trait for the external figure storage collaborator.
#[async_trait]
pub trait FigureStore: Send + Sync {
    /// Requests a one-shot upload URL.
    async fn request_upload_url(&self) -> Result<String, StorageError>;

    /// Uploads raw image bytes to `url`, returning the storage id.
    async fn upload(&self, url: &str, bytes: &[u8], mime_type: &str)
        -> Result<String, StorageError>;

    /// Confirms metadata for an uploaded figure, returning the figure id.
    async fn store_metadata(&self, meta: &FigureMeta) -> Result<String, StorageError>;
}

/// HTTP implementation against the hosted backend.
pub struct HttpFigureStore {
    api_base: String,
    http_client: Client,
}

impl HttpFigureStore {
    /// Creates a store talking to the backend at `api_base`.
    pub fn new(api_base: String) -> Self {
        Self {
            api_base,
            http_client: Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .expect("Failed to build HTTP client"),
        }
    }

    /// Creates a store from the `QUIZFORGE_API_BASE` environment variable.
    pub fn from_env() -> Result<Self, StorageError> {
        let api_base = env::var("QUIZFORGE_API_BASE")
            .map_err(|_| StorageError::MissingApiBase("QUIZFORGE_API_BASE"))?;
        Ok(Self::new(api_base))
    }
}

#[derive(Debug, Deserialize)]
struct UploadUrlResponse {
    url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    storage_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetadataResponse {
    figure_id: String,
}

/// Reads an error body and maps a non-success status.
async fn error_from_response(response: reqwest::Response) -> StorageError {
    let code = response.status().as_u16();
    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "Failed to read error response".to_string());
    StorageError::ApiError { code, message }
}

#[async_trait]
impl FigureStore for HttpFigureStore {
    async fn request_upload_url(&self) -> Result<String, StorageError> {
        let url = format!("{}/storage/upload-url", self.api_base);
        let response = self
            .http_client
            .post(&url)
            .send()
            .await
            .map_err(|e| StorageError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let parsed: UploadUrlResponse = response
            .json()
            .await
            .map_err(|e| StorageError::ParseError(e.to_string()))?;
        Ok(parsed.url)
    }

    async fn upload(
        &self,
        url: &str,
        bytes: &[u8],
        mime_type: &str,
    ) -> Result<String, StorageError> {
        let response = self
            .http_client
            .post(url)
            .header("Content-Type", mime_type)
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let parsed: UploadResponse = response
            .json()
            .await
            .map_err(|e| StorageError::ParseError(e.to_string()))?;
        Ok(parsed.storage_id)
    }

    async fn store_metadata(&self, meta: &FigureMeta) -> Result<String, StorageError> {
        let url = format!("{}/figures", self.api_base);
        let response = self
            .http_client
            .post(&url)
            .json(meta)
            .send()
            .await
            .map_err(|e| StorageError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let parsed: MetadataResponse = response
            .json()
            .await
            .map_err(|e| StorageError::ParseError(e.to_string()))?;
        Ok(parsed.figure_id)
    }
}
