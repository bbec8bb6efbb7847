//! Image generation client.
//!
//! Figure rendering goes through the [`ImageProvider`] trait. The shipped
//! implementation targets the Gemini `generateContent` API: a text prompt in,
//! candidates whose parts may carry inline base64 image bytes out. Scanning
//! the parts for the first inline image is left to the stage executor, so a
//! "no image" response stays a stage-level failure rather than a client error.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::error::LlmError;

/// Default API endpoint.
const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";

/// Default image model.
const DEFAULT_MODEL: &str = "gemini-2.5-flash-image";

/// One part of a response candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ImagePart {
    /// Inline image payload: MIME type plus base64-encoded bytes.
    InlineData { mime_type: String, data: String },
    /// Text the model emitted alongside (or instead of) an image.
    Text { text: String },
}

/// Response from an image generation call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageResponse {
    /// Parts of every candidate, flattened in response order.
    pub parts: Vec<ImagePart>,
}

impl ImageResponse {
    /// First inline image as `(mime_type, base64_data)`, if any part carries one.
    pub fn first_inline_image(&self) -> Option<(&str, &str)> {
        self.parts.iter().find_map(|part| match part {
            ImagePart::InlineData { mime_type, data } => {
                Some((mime_type.as_str(), data.as_str()))
            }
            ImagePart::Text { .. } => None,
        })
    }
}

/// Trait for providers that can render an image from a prompt.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Sends one rendering prompt and returns the response parts.
    async fn generate_image(&self, prompt: &str) -> Result<ImageResponse, LlmError>;
}

/// Client for the Gemini `generateContent` API.
pub struct GeminiImageClient {
    api_base: String,
    api_key: String,
    model: String,
    http_client: Client,
}

impl GeminiImageClient {
    /// Creates a client with explicit configuration.
    pub fn new(api_base: String, api_key: String, model: String) -> Self {
        Self {
            api_base,
            api_key,
            model,
            http_client: Client::builder()
                .timeout(Duration::from_secs(180))
                .build()
                .expect("Failed to build HTTP client"),
        }
    }

    /// Creates a client from environment variables.
    ///
    /// - `GEMINI_API_KEY`: API key (required)
    /// - `GEMINI_API_BASE`: endpoint override
    /// - `QUIZFORGE_IMAGE_MODEL`: model override
    pub fn from_env() -> Result<Self, LlmError> {
        let api_key =
            env::var("GEMINI_API_KEY").map_err(|_| LlmError::MissingApiKey("GEMINI_API_KEY"))?;
        let api_base = env::var("GEMINI_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string());
        let model = env::var("QUIZFORGE_IMAGE_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        Ok(Self::new(api_base, api_key, model))
    }

    /// The configured model.
    pub fn model(&self) -> &str {
        &self.model
    }
}

/// Internal request structure for generateContent.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiRequest<'a> {
    contents: Vec<ApiContent<'a>>,
    generation_config: ApiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct ApiContent<'a> {
    parts: Vec<ApiTextPart<'a>>,
}

#[derive(Debug, Serialize)]
struct ApiTextPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiGenerationConfig {
    response_modalities: Vec<&'static str>,
}

/// Internal response structures from generateContent.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    candidates: Vec<ApiCandidate>,
}

#[derive(Debug, Deserialize)]
struct ApiCandidate {
    #[serde(default)]
    content: Option<ApiCandidateContent>,
}

#[derive(Debug, Deserialize)]
struct ApiCandidateContent {
    #[serde(default)]
    parts: Vec<ApiResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    inline_data: Option<ApiInlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiInlineData {
    mime_type: String,
    data: String,
}

/// Error response from the API.
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)] // Fields kept for complete API error deserialization
struct ApiErrorDetail {
    message: String,
    code: Option<u32>,
    status: Option<String>,
}

#[async_trait]
impl ImageProvider for GeminiImageClient {
    async fn generate_image(&self, prompt: &str) -> Result<ImageResponse, LlmError> {
        let api_request = ApiRequest {
            contents: vec![ApiContent {
                parts: vec![ApiTextPart { text: prompt }],
            }],
            generation_config: ApiGenerationConfig {
                response_modalities: vec!["IMAGE"],
            },
        };

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_base, self.model
        );

        let http_response = self
            .http_client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("x-goog-api-key", &self.api_key)
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

        let parts = api_response
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|content| content.parts)
            .filter_map(|part| {
                if let Some(inline) = part.inline_data {
                    Some(ImagePart::InlineData {
                        mime_type: inline.mime_type,
                        data: inline.data,
                    })
                } else {
                    part.text.map(|text| ImagePart::Text { text })
                }
            })
            .collect();

        Ok(ImageResponse { parts })
    }
}
