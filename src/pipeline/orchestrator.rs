//! Pipeline orchestrator.
//!
//! [`Pipeline::run`] drives one work item through the strict linear state
//! machine
//!
//! ```text
//! data_generation -> image_generation -> question_generation -> storage -> done
//! ```
//!
//! Every failure is returned as [`PipelineResult::Failure`] carrying the
//! failed stage and whatever artifacts earlier stages produced; the
//! orchestrator itself never returns `Err` and never touches the DLQ. A
//! [`ResumeState`] with a prior artifact skips the corresponding stage, so
//! re-running an item with its persisted partial result never duplicates
//! completed work.

use chrono::Utc;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::content::question::GenerationMetadata;
use crate::content::{
    ChartData, DataType, DifficultyFactors, GeneratedQuestionContent, QuestionDocument,
};
use crate::generator::SampledParams;
use crate::llm::{ImageProvider, TextProvider};
use crate::storage::figures::{FigureRef, FigureStore};
use crate::storage::questions::QuestionSink;

use super::config::PipelineConfig;
use super::stages;

/// Fixed question type for everything this pipeline produces.
const QUESTION_TYPE: &str = "chart_reading";

/// Fixed skill tag for everything this pipeline produces.
const SKILL: &str = "quantitative_evidence";

/// The pipeline stage a failure occurred at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorStage {
    DataGeneration,
    ImageGeneration,
    QuestionGeneration,
    Storage,
}

impl ErrorStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorStage::DataGeneration => "data_generation",
            ErrorStage::ImageGeneration => "image_generation",
            ErrorStage::QuestionGeneration => "question_generation",
            ErrorStage::Storage => "storage",
        }
    }
}

impl fmt::Display for ErrorStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ErrorStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "data_generation" => Ok(ErrorStage::DataGeneration),
            "image_generation" => Ok(ErrorStage::ImageGeneration),
            "question_generation" => Ok(ErrorStage::QuestionGeneration),
            "storage" => Ok(ErrorStage::Storage),
            other => Err(format!("unknown error stage '{other}'")),
        }
    }
}

/// Artifacts carried over from a prior attempt.
///
/// A present artifact skips its producing stage entirely.
#[derive(Debug, Clone, Default)]
pub struct ResumeState {
    pub chart_data: Option<ChartData>,
    pub figure: Option<FigureRef>,
}

/// Outcome of running one item through the pipeline.
#[derive(Debug, Clone)]
pub enum PipelineResult {
    Success {
        question_id: String,
        figure: FigureRef,
        chart_data: ChartData,
        chart_title: String,
    },
    Failure {
        /// Stage the run stopped at; fixed at first failure.
        stage: ErrorStage,
        error: String,
        /// The parameters the item was generated with, verbatim.
        params: SampledParams,
        /// Chart data, if the data stage ever completed.
        chart_data: Option<ChartData>,
        /// Stored figure, if the image stage ever completed.
        figure: Option<FigureRef>,
    },
}

impl PipelineResult {
    pub fn is_success(&self) -> bool {
        matches!(self, PipelineResult::Success { .. })
    }
}

/// Drives work items through the generation stages.
pub struct Pipeline {
    config: PipelineConfig,
    text_provider: Arc<dyn TextProvider>,
    image_provider: Arc<dyn ImageProvider>,
    figure_store: Arc<dyn FigureStore>,
    question_sink: Arc<dyn QuestionSink>,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        text_provider: Arc<dyn TextProvider>,
        image_provider: Arc<dyn ImageProvider>,
        figure_store: Arc<dyn FigureStore>,
        question_sink: Arc<dyn QuestionSink>,
    ) -> Self {
        Self {
            config,
            text_provider,
            image_provider,
            figure_store,
            question_sink,
        }
    }

    /// Runs one item through the pipeline.
    ///
    /// `resume` supplies artifacts from a prior attempt; present artifacts
    /// skip their stage. Never returns `Err`: every failure is a
    /// [`PipelineResult::Failure`] carrying the artifacts produced so far.
    pub async fn run(
        &self,
        data_type: DataType,
        params: &SampledParams,
        resume: ResumeState,
        batch_id: Option<&str>,
    ) -> PipelineResult {
        let chart = match resume.chart_data {
            Some(chart) => {
                tracing::debug!(data_type = %data_type, "resuming with prior chart data");
                chart
            }
            None => {
                match stages::generate_chart_data(self.text_provider.as_ref(), params, data_type)
                    .await
                {
                    Ok(chart) => chart,
                    Err(e) => {
                        return self.failure(ErrorStage::DataGeneration, e.message(), params, None, None)
                    }
                }
            }
        };

        let figure = match resume.figure {
            Some(figure) => {
                tracing::debug!(figure_id = %figure.figure_id, "resuming with prior figure");
                figure
            }
            None => {
                match stages::generate_figure(
                    self.image_provider.as_ref(),
                    self.figure_store.as_ref(),
                    &chart,
                )
                .await
                {
                    Ok(figure) => figure,
                    Err(e) => {
                        return self.failure(
                            ErrorStage::ImageGeneration,
                            e.message(),
                            params,
                            Some(chart),
                            None,
                        )
                    }
                }
            }
        };

        let content =
            match stages::generate_question(self.text_provider.as_ref(), params, &chart).await {
                Ok(content) => content,
                Err(e) => {
                    return self.failure(
                        ErrorStage::QuestionGeneration,
                        e.message(),
                        params,
                        Some(chart),
                        Some(figure),
                    )
                }
            };

        let document = self.assemble_document(data_type, params, &figure, content, batch_id);
        match self.question_sink.store_question(&document).await {
            Ok(question_id) => {
                tracing::info!(question_id, data_type = %data_type, "question stored");
                let chart_title = chart.title().to_string();
                PipelineResult::Success {
                    question_id,
                    figure,
                    chart_data: chart,
                    chart_title,
                }
            }
            Err(e) => self.failure(
                ErrorStage::Storage,
                &e.to_string(),
                params,
                Some(chart),
                Some(figure),
            ),
        }
    }

    /// Builds the final document handed to the question sink.
    fn assemble_document(
        &self,
        data_type: DataType,
        params: &SampledParams,
        figure: &FigureRef,
        content: GeneratedQuestionContent,
        batch_id: Option<&str>,
    ) -> QuestionDocument {
        QuestionDocument {
            question_type: QUESTION_TYPE.to_string(),
            data_type,
            domain: params.domain.to_string(),
            skill: SKILL.to_string(),
            passage: content.passage,
            question_stem: content.question_stem,
            choices: content.choices,
            correct_choice: content.correct_choice,
            explanation: content.explanation,
            figure: figure.clone(),
            difficulty: DifficultyFactors::from_params(params),
            metadata: GenerationMetadata {
                sampled_params: params.clone(),
                text_model: self.config.text_model.clone(),
                image_model: self.config.image_model.clone(),
                generated_at: Utc::now(),
            },
            tags: vec![
                "generated".to_string(),
                data_type.as_str().to_string(),
                params.domain.as_str().to_string(),
            ],
            batch_id: batch_id.map(str::to_string),
        }
    }

    fn failure(
        &self,
        stage: ErrorStage,
        error: &str,
        params: &SampledParams,
        chart_data: Option<ChartData>,
        figure: Option<FigureRef>,
    ) -> PipelineResult {
        tracing::warn!(stage = %stage, error, "pipeline item failed");
        PipelineResult::Failure {
            stage,
            error: error.to_string(),
            params: params.clone(),
            chart_data,
            figure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{LlmError, StorageError};
    use crate::llm::{ContentBlock, ImagePart, ImageResponse, MessageResponse};
    use crate::storage::figures::FigureMeta;
    use async_trait::async_trait;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const CHART_JSON: &str =
        r#"{"title": "Test", "categories": ["A", "B"], "values": [1, 2], "yAxisLabel": "Y"}"#;

    fn question_json() -> String {
        json!({
            "passage": "p",
            "questionStem": "q",
            "choices": ["a", "b", "c", "d"],
            "correctChoice": 0,
            "explanation": "e"
        })
        .to_string()
    }

    /// Text provider returning canned responses in call order.
    struct ScriptedText {
        responses: Mutex<Vec<String>>,
        calls: AtomicUsize,
    }

    impl ScriptedText {
        fn new(responses: Vec<String>) -> Self {
            let mut responses = responses;
            responses.reverse();
            Self {
                responses: Mutex::new(responses),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TextProvider for ScriptedText {
        async fn create_message(
            &self,
            _prompt: &str,
            _max_tokens: u32,
        ) -> Result<MessageResponse, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let text = self.responses.lock().unwrap().pop().unwrap_or_default();
            Ok(MessageResponse {
                content: vec![ContentBlock::Text { text }],
            })
        }
    }

    /// Image provider that can be told to fail.
    struct StubImage {
        fail: bool,
        calls: AtomicUsize,
    }

    impl StubImage {
        fn ok() -> Self {
            Self {
                fail: false,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ImageProvider for StubImage {
        async fn generate_image(&self, _prompt: &str) -> Result<ImageResponse, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(LlmError::RequestFailed("image backend down".to_string()));
            }
            Ok(ImageResponse {
                parts: vec![ImagePart::InlineData {
                    mime_type: "image/png".to_string(),
                    data: BASE64.encode(b"png"),
                }],
            })
        }
    }

    struct StubFigureStore;

    #[async_trait]
    impl FigureStore for StubFigureStore {
        async fn request_upload_url(&self) -> Result<String, StorageError> {
            Ok("http://upload.test/u1".to_string())
        }

        async fn upload(
            &self,
            _url: &str,
            _bytes: &[u8],
            _mime_type: &str,
        ) -> Result<String, StorageError> {
            Ok("st_1".to_string())
        }

        async fn store_metadata(&self, _meta: &FigureMeta) -> Result<String, StorageError> {
            Ok("fig_1".to_string())
        }
    }

    struct StubSink {
        calls: AtomicUsize,
    }

    impl StubSink {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl QuestionSink for StubSink {
        async fn store_question(&self, _doc: &QuestionDocument) -> Result<String, StorageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("q_1".to_string())
        }
    }

    fn pipeline(
        text: Arc<ScriptedText>,
        image: Arc<StubImage>,
        sink: Arc<StubSink>,
    ) -> Pipeline {
        Pipeline::new(
            PipelineConfig::default(),
            text,
            image,
            Arc::new(StubFigureStore),
            sink,
        )
    }

    #[tokio::test]
    async fn test_clean_run_stores_once() {
        let text = Arc::new(ScriptedText::new(vec![
            CHART_JSON.to_string(),
            question_json(),
        ]));
        let sink = Arc::new(StubSink::new());
        let p = pipeline(Arc::clone(&text), Arc::new(StubImage::ok()), Arc::clone(&sink));

        let params = SampledParams::fixture();
        let result = p
            .run(DataType::BarChart, &params, ResumeState::default(), None)
            .await;

        match result {
            PipelineResult::Success {
                question_id,
                chart_title,
                ..
            } => {
                assert_eq!(question_id, "q_1");
                assert_eq!(chart_title, "Test");
            }
            PipelineResult::Failure { stage, error, .. } => {
                panic!("expected success, failed at {stage}: {error}")
            }
        }
        assert_eq!(sink.calls.load(Ordering::SeqCst), 1);
        assert_eq!(text.calls(), 2);
    }

    #[tokio::test]
    async fn test_image_failure_carries_chart_data() {
        let text = Arc::new(ScriptedText::new(vec![CHART_JSON.to_string()]));
        let sink = Arc::new(StubSink::new());
        let p = pipeline(
            Arc::clone(&text),
            Arc::new(StubImage::failing()),
            Arc::clone(&sink),
        );

        let params = SampledParams::fixture();
        let result = p
            .run(DataType::BarChart, &params, ResumeState::default(), None)
            .await;

        match result {
            PipelineResult::Failure {
                stage,
                chart_data,
                figure,
                ..
            } => {
                assert_eq!(stage, ErrorStage::ImageGeneration);
                assert_eq!(chart_data.unwrap().title(), "Test");
                assert!(figure.is_none());
            }
            PipelineResult::Success { .. } => panic!("expected failure"),
        }
        assert_eq!(sink.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_resume_skips_completed_stages() {
        // Only the question stage should hit the text provider.
        let text = Arc::new(ScriptedText::new(vec![question_json()]));
        let image = Arc::new(StubImage::ok());
        let sink = Arc::new(StubSink::new());
        let p = pipeline(Arc::clone(&text), Arc::clone(&image), Arc::clone(&sink));

        let chart = ChartData::from_value(
            DataType::BarChart,
            serde_json::from_str(CHART_JSON).unwrap(),
        )
        .unwrap();
        let figure = FigureRef {
            figure_id: "fig_prior".to_string(),
            storage_id: "st_prior".to_string(),
            alt_text: "Figure: Test".to_string(),
        };
        let resume = ResumeState {
            chart_data: Some(chart),
            figure: Some(figure),
        };

        let params = SampledParams::fixture();
        let result = p.run(DataType::BarChart, &params, resume, None).await;

        assert!(result.is_success());
        assert_eq!(text.calls(), 1);
        assert_eq!(image.calls.load(Ordering::SeqCst), 0);
        if let PipelineResult::Success { figure, .. } = result {
            assert_eq!(figure.figure_id, "fig_prior");
        }
    }

    #[tokio::test]
    async fn test_data_failure_carries_nothing() {
        let text = Arc::new(ScriptedText::new(vec!["no json here".to_string()]));
        let p = pipeline(text, Arc::new(StubImage::ok()), Arc::new(StubSink::new()));

        let params = SampledParams::fixture();
        let result = p
            .run(DataType::BarChart, &params, ResumeState::default(), None)
            .await;

        match result {
            PipelineResult::Failure {
                stage,
                error,
                chart_data,
                figure,
                ..
            } => {
                assert_eq!(stage, ErrorStage::DataGeneration);
                assert_eq!(error, "invalid JSON");
                assert!(chart_data.is_none());
                assert!(figure.is_none());
            }
            PipelineResult::Success { .. } => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn test_storage_failure_carries_both_artifacts() {
        struct FailingSink;

        #[async_trait]
        impl QuestionSink for FailingSink {
            async fn store_question(
                &self,
                _doc: &QuestionDocument,
            ) -> Result<String, StorageError> {
                Err(StorageError::RequestFailed("backend unreachable".to_string()))
            }
        }

        let text = Arc::new(ScriptedText::new(vec![
            CHART_JSON.to_string(),
            question_json(),
        ]));
        let p = Pipeline::new(
            PipelineConfig::default(),
            text,
            Arc::new(StubImage::ok()),
            Arc::new(StubFigureStore),
            Arc::new(FailingSink),
        );

        let params = SampledParams::fixture();
        let result = p
            .run(DataType::BarChart, &params, ResumeState::default(), None)
            .await;

        match result {
            PipelineResult::Failure {
                stage,
                error,
                chart_data,
                figure,
                ..
            } => {
                assert_eq!(stage, ErrorStage::Storage);
                assert!(error.contains("backend unreachable"));
                assert_eq!(chart_data.unwrap().title(), "Test");
                assert_eq!(figure.unwrap().figure_id, "fig_1");
            }
            PipelineResult::Success { .. } => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn test_batch_id_lands_in_document() {
        struct CapturingSink {
            batch_id: Mutex<Option<String>>,
        }

        #[async_trait]
        impl QuestionSink for CapturingSink {
            async fn store_question(
                &self,
                doc: &QuestionDocument,
            ) -> Result<String, StorageError> {
                *self.batch_id.lock().unwrap() = doc.batch_id.clone();
                Ok("q_1".to_string())
            }
        }

        let text = Arc::new(ScriptedText::new(vec![
            CHART_JSON.to_string(),
            question_json(),
        ]));
        let sink = Arc::new(CapturingSink {
            batch_id: Mutex::new(None),
        });
        let p = Pipeline::new(
            PipelineConfig::default(),
            text,
            Arc::new(StubImage::ok()),
            Arc::new(StubFigureStore),
            Arc::clone(&sink) as Arc<dyn QuestionSink>,
        );

        let params = SampledParams::fixture();
        let result = p
            .run(
                DataType::BarChart,
                &params,
                ResumeState::default(),
                Some("batch-7"),
            )
            .await;

        assert!(result.is_success());
        assert_eq!(sink.batch_id.lock().unwrap().as_deref(), Some("batch-7"));
    }

    #[test]
    fn test_error_stage_round_trip() {
        for stage in [
            ErrorStage::DataGeneration,
            ErrorStage::ImageGeneration,
            ErrorStage::QuestionGeneration,
            ErrorStage::Storage,
        ] {
            assert_eq!(stage.as_str().parse::<ErrorStage>().unwrap(), stage);
        }
        assert!("rendering".parse::<ErrorStage>().is_err());
    }
}
