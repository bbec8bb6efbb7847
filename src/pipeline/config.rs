//! Pipeline configuration.
//!
//! Settings for the generation pipeline: retry budget, pacing between items,
//! DLQ database location, and the model names recorded into question
//! provenance.

use std::time::Duration;
use thiserror::Error;

use crate::content::DataType;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration for the generation pipeline and its drivers.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// DLQ database connection URL.
    pub dlq_database_url: String,
    /// Retry budget fixed into each DLQ record at creation.
    pub max_retries: u32,
    /// Sleep between consecutive items in a batch or retry sweep.
    pub item_pacing: Duration,
    /// Data types cycled through when a batch does not specify its own.
    pub data_types: Vec<DataType>,
    /// Text model name recorded into question provenance.
    pub text_model: String,
    /// Image model name recorded into question provenance.
    pub image_model: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dlq_database_url: "sqlite://quizforge_dlq.db".to_string(),
            max_retries: 3,
            item_pacing: Duration::from_secs(2),
            data_types: DataType::ALL.to_vec(),
            text_model: "claude-sonnet-4-5".to_string(),
            image_model: "gemini-2.5-flash-image".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `QUIZFORGE_DLQ_DB`: DLQ database URL (default: sqlite://quizforge_dlq.db)
    /// - `QUIZFORGE_MAX_RETRIES`: retry budget per item (default: 3)
    /// - `QUIZFORGE_PACING_MS`: sleep between items in milliseconds (default: 2000)
    /// - `QUIZFORGE_DATA_TYPES`: comma-separated data types (default: all)
    /// - `QUIZFORGE_TEXT_MODEL`: text model name (default: claude-sonnet-4-5)
    /// - `QUIZFORGE_IMAGE_MODEL`: image model name (default: gemini-2.5-flash-image)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable has an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("QUIZFORGE_DLQ_DB") {
            config.dlq_database_url = val;
        }

        if let Ok(val) = std::env::var("QUIZFORGE_MAX_RETRIES") {
            config.max_retries = parse_env_value(&val, "QUIZFORGE_MAX_RETRIES")?;
        }

        if let Ok(val) = std::env::var("QUIZFORGE_PACING_MS") {
            let ms: u64 = parse_env_value(&val, "QUIZFORGE_PACING_MS")?;
            config.item_pacing = Duration::from_millis(ms);
        }

        if let Ok(val) = std::env::var("QUIZFORGE_DATA_TYPES") {
            config.data_types = parse_data_types(&val, "QUIZFORGE_DATA_TYPES")?;
        }

        if let Ok(val) = std::env::var("QUIZFORGE_TEXT_MODEL") {
            config.text_model = val;
        }

        if let Ok(val) = std::env::var("QUIZFORGE_IMAGE_MODEL") {
            config.image_model = val;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_retries == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_retries must be at least 1".to_string(),
            ));
        }
        if self.data_types.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "data_types must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Sets the DLQ database URL.
    pub fn with_dlq_database_url(mut self, url: impl Into<String>) -> Self {
        self.dlq_database_url = url.into();
        self
    }

    /// Sets the retry budget.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the pacing between items.
    pub fn with_item_pacing(mut self, pacing: Duration) -> Self {
        self.item_pacing = pacing;
        self
    }

    /// Sets the data types to cycle through.
    pub fn with_data_types(mut self, data_types: Vec<DataType>) -> Self {
        self.data_types = data_types;
        self
    }

    /// Sets the model names recorded into provenance.
    pub fn with_models(mut self, text_model: impl Into<String>, image_model: impl Into<String>) -> Self {
        self.text_model = text_model.into();
        self.image_model = image_model.into();
        self
    }
}

/// Parses a numeric environment value with a descriptive error.
fn parse_env_value<T: std::str::FromStr>(val: &str, key: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    val.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        message: e.to_string(),
    })
}

/// Parses a comma-separated data type list.
fn parse_data_types(val: &str, key: &str) -> Result<Vec<DataType>, ConfigError> {
    val.split(',')
        .map(|s| {
            s.trim()
                .parse::<DataType>()
                .map_err(|e| ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: e.to_string(),
                })
        })
        .collect()
}
