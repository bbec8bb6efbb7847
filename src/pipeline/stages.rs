//! Stage executors.
//!
//! Each executor wraps exactly one external call chain and reports failure as
//! a plain [`StageError`] message. Executors do not know which pipeline stage
//! they implement; the orchestrator tags failures with an
//! [`ErrorStage`](super::orchestrator::ErrorStage) one layer up.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::Value;
use std::fmt;

use crate::content::{ChartData, DataType, GeneratedQuestionContent};
use crate::error::{LlmError, StorageError};
use crate::generator::SampledParams;
use crate::llm::{extract_json_object, ImageProvider, TextProvider};
use crate::prompts::{chart_data_prompt, figure_prompt, question_prompt};
use crate::storage::figures::{FigureMeta, FigureRef, FigureStore};

/// Token budget for the chart data stage.
const CHART_DATA_MAX_TOKENS: u32 = 2048;

/// Token budget for the question stage.
const QUESTION_MAX_TOKENS: u32 = 4096;

/// Nominal rendered figure dimensions confirmed to the figure store.
const FIGURE_WIDTH: u32 = 800;
const FIGURE_HEIGHT: u32 = 600;
const FIGURE_ASPECT_RATIO: &str = "4:3";

/// A stage-level failure message.
///
/// Carries no stage identity; the orchestrator knows which stage it invoked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageError {
    message: String,
}

impl StageError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for StageError {}

impl From<LlmError> for StageError {
    fn from(e: LlmError) -> Self {
        Self::new(e.to_string())
    }
}

impl From<StorageError> for StageError {
    fn from(e: StorageError) -> Self {
        Self::new(e.to_string())
    }
}

/// Stage 1: generates and validates structured chart data.
///
/// The model is not trusted to emit pure JSON, so the first balanced JSON
/// object is extracted from the text before parsing, then checked against the
/// structural requirements of `data_type`.
pub async fn generate_chart_data(
    text_provider: &dyn TextProvider,
    params: &SampledParams,
    data_type: DataType,
) -> Result<ChartData, StageError> {
    let prompt = chart_data_prompt(params, data_type);
    let response = text_provider
        .create_message(&prompt, CHART_DATA_MAX_TOKENS)
        .await?;

    let text = response
        .first_text()
        .ok_or_else(|| StageError::new("no text response"))?;
    let json = extract_json_object(text).ok_or_else(|| StageError::new("invalid JSON"))?;
    let value: Value =
        serde_json::from_str(json).map_err(|_| StageError::new("invalid JSON"))?;

    ChartData::from_value(data_type, value).map_err(|e| StageError::new(e.to_string()))
}

/// Stage 2: renders the chart as a figure and stores it.
///
/// The image response parts are scanned for the first inline image; its bytes
/// go through the figure store's upload-URL handshake. The returned reference
/// is what the final question document carries.
pub async fn generate_figure(
    image_provider: &dyn ImageProvider,
    figure_store: &dyn FigureStore,
    chart: &ChartData,
) -> Result<FigureRef, StageError> {
    let prompt = figure_prompt(chart);
    let response = image_provider.generate_image(&prompt).await?;

    let (mime_type, data) = response
        .first_inline_image()
        .ok_or_else(|| StageError::new("no image in response"))?;
    let bytes = BASE64
        .decode(data)
        .map_err(|e| StageError::new(format!("invalid base64 image data: {e}")))?;

    let upload_url = figure_store.request_upload_url().await?;
    let storage_id = figure_store.upload(&upload_url, &bytes, mime_type).await?;

    let alt_text = format!("Figure: {}", chart.title());
    let meta = FigureMeta {
        storage_id: storage_id.clone(),
        width: FIGURE_WIDTH,
        height: FIGURE_HEIGHT,
        alt_text: alt_text.clone(),
        aspect_ratio: FIGURE_ASPECT_RATIO.to_string(),
    };
    let figure_id = figure_store.store_metadata(&meta).await?;

    Ok(FigureRef {
        figure_id,
        storage_id,
        alt_text,
    })
}

/// Stage 3: generates the question content from the validated chart data.
pub async fn generate_question(
    text_provider: &dyn TextProvider,
    params: &SampledParams,
    chart: &ChartData,
) -> Result<GeneratedQuestionContent, StageError> {
    let prompt = question_prompt(params, &chart.to_json());
    let response = text_provider
        .create_message(&prompt, QUESTION_MAX_TOKENS)
        .await?;

    let text = response
        .first_text()
        .ok_or_else(|| StageError::new("no text response"))?;
    let json = extract_json_object(text).ok_or_else(|| StageError::new("invalid JSON"))?;
    let value: Value =
        serde_json::from_str(json).map_err(|_| StageError::new("invalid JSON"))?;

    GeneratedQuestionContent::from_value(value)
}
