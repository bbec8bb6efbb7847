//! Question persistence collaborator.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::env;
use std::time::Duration;

use crate::content::QuestionDocument;
use crate::error::StorageError;

/// Trait for the external question persistence collaborator.
#[async_trait]
pub trait QuestionSink: Send + Sync {
    /// Persists a fully assembled question, returning its new id.
    async fn store_question(&self, doc: &QuestionDocument) -> Result<String, StorageError>;
}

/// HTTP implementation against the hosted backend.
pub struct HttpQuestionSink {
    api_base: String,
    http_client: Client,
}

impl HttpQuestionSink {
    /// Creates a sink talking to the backend at `api_base`.
    pub fn new(api_base: String) -> Self {
        Self {
            api_base,
            http_client: Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .expect("Failed to build HTTP client"),
        }
    }

    /// Creates a sink from the `QUIZFORGE_API_BASE` environment variable.
    pub fn from_env() -> Result<Self, StorageError> {
        let api_base = env::var("QUIZFORGE_API_BASE")
            .map_err(|_| StorageError::MissingApiBase("QUIZFORGE_API_BASE"))?;
        Ok(Self::new(api_base))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreQuestionResponse {
    question_id: String,
}

#[async_trait]
impl QuestionSink for HttpQuestionSink {
    async fn store_question(&self, doc: &QuestionDocument) -> Result<String, StorageError> {
        let url = format!("{}/questions", self.api_base);
        let response = self
            .http_client
            .post(&url)
            .json(doc)
            .send()
            .await
            .map_err(|e| StorageError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            let code = response.status().as_u16();
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());
            return Err(StorageError::ApiError { code, message });
        }

        let parsed: StoreQuestionResponse = response
            .json()
            .await
            .map_err(|e| StorageError::ParseError(e.to_string()))?;
        Ok(parsed.question_id)
    }
}
