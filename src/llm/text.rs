//! Text generation client.
//!
//! The pipeline's two text stages call through the [`TextProvider`] trait.
//! The shipped implementation targets the Anthropic Messages API: one user
//! message in, a list of content blocks out. The pipeline always consumes the
//! first text block.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::error::LlmError;

/// Default API endpoint.
const DEFAULT_API_BASE: &str = "https://api.anthropic.com";

/// Default text model.
const DEFAULT_MODEL: &str = "claude-sonnet-4-5";

/// API version header value required by the Messages API.
const API_VERSION: &str = "2023-06-01";

/// One block of a message response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: String },
    #[serde(other)]
    Unknown,
}

/// Response from a text generation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    /// Content blocks in response order.
    pub content: Vec<ContentBlock>,
}

impl MessageResponse {
    /// The first text block, if the response carried any text at all.
    pub fn first_text(&self) -> Option<&str> {
        self.content.iter().find_map(|block| match block {
            ContentBlock::Text { text } => Some(text.as_str()),
            ContentBlock::Unknown => None,
        })
    }
}

/// Trait for providers that can generate text from a single prompt.
#[async_trait]
pub trait TextProvider: Send + Sync {
    /// Sends one user prompt and returns the response content blocks.
    async fn create_message(
        &self,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<MessageResponse, LlmError>;
}

/// Client for the Anthropic Messages API.
pub struct AnthropicClient {
    api_base: String,
    api_key: String,
    model: String,
    http_client: Client,
}

impl AnthropicClient {
    /// Creates a client with explicit configuration.
    pub fn new(api_base: String, api_key: String, model: String) -> Self {
        Self {
            api_base,
            api_key,
            model,
            http_client: Client::builder()
                .timeout(Duration::from_secs(120))
                .build()
                .expect("Failed to build HTTP client"),
        }
    }

    /// Creates a client from environment variables.
    ///
    /// - `ANTHROPIC_API_KEY`: API key (required)
    /// - `ANTHROPIC_API_BASE`: endpoint override (default: api.anthropic.com)
    /// - `QUIZFORGE_TEXT_MODEL`: model override
    pub fn from_env() -> Result<Self, LlmError> {
        let api_key =
            env::var("ANTHROPIC_API_KEY").map_err(|_| LlmError::MissingApiKey("ANTHROPIC_API_KEY"))?;
        let api_base =
            env::var("ANTHROPIC_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string());
        let model =
            env::var("QUIZFORGE_TEXT_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        Ok(Self::new(api_base, api_key, model))
    }

    /// The configured model.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// The configured API base URL.
    pub fn api_base(&self) -> &str {
        &self.api_base
    }
}

/// Internal request structure for the Messages API.
#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ApiMessage<'a>>,
}

/// Internal message structure.
#[derive(Debug, Serialize)]
struct ApiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// Internal response structure from the Messages API.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    content: Vec<ContentBlock>,
}

/// Error response from the API.
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

/// Error detail from the API.
#[derive(Debug, Deserialize)]
#[allow(dead_code)] // Fields kept for complete API error deserialization
struct ApiErrorDetail {
    message: String,
    #[serde(rename = "type")]
    error_type: Option<String>,
}

#[async_trait]
impl TextProvider for AnthropicClient {
    async fn create_message(
        &self,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<MessageResponse, LlmError> {
        let api_request = ApiRequest {
            model: &self.model,
            max_tokens,
            messages: vec![ApiMessage {
                role: "user",
                content: prompt,
            }],
        };

        let url = format!("{}/v1/messages", self.api_base);

        let http_response = self
            .http_client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&api_request)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        let status = http_response.status();

        if !status.is_success() {
            let status_code = status.as_u16();
            let error_text = http_response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());

            if let Ok(error_response) = serde_json::from_str::<ApiErrorResponse>(&error_text) {
                if status_code == 429 {
                    return Err(LlmError::RateLimited(error_response.error.message));
                }
                return Err(LlmError::ApiError {
                    code: status_code,
                    message: error_response.error.message,
                });
            }

            return Err(LlmError::ApiError {
                code: status_code,
                message: error_text,
            });
        }

        let api_response: ApiResponse = http_response
            .json()
            .await
            .map_err(|e| LlmError::ParseError(e.to_string()))?;

        Ok(MessageResponse {
            content: api_response.content,
        })
    }
}
