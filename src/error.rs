//! Error types for quizforge operations.
//!
//! Defines error types for the external collaborators the pipeline calls:
//! - Text and image generation APIs
//! - Figure upload and question persistence backends
//!
//! Store- and module-specific errors (`DlqError`, `ChartDataError`,
//! `ConfigError`) live next to the code that produces them.

use thiserror::Error;

/// Errors that can occur during text or image generation calls.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Missing API key: {0} environment variable not set")]
    MissingApiKey(&'static str),

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("API error ({code}): {message}")]
    ApiError { code: u16, message: String },
}

/// Errors that can occur talking to the figure store or question backend.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Missing API base: {0} environment variable not set")]
    MissingApiBase(&'static str),

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse backend response: {0}")]
    ParseError(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Backend error ({code}): {message}")]
    ApiError { code: u16, message: String },
}
