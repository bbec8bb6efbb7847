//! Question content contracts.
//!
//! [`GeneratedQuestionContent`] is the third stage artifact: the question
//! text parsed out of the model's JSON. Its schema is fixed regardless of the
//! chart's [`DataType`](super::DataType), so its required-field check is
//! separate from the chart validator.
//!
//! [`QuestionDocument`] is the fully assembled record handed to the question
//! sink: content plus figure reference, computed difficulty factors, and
//! generation provenance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::content::DataType;
use crate::generator::SampledParams;
use crate::pipeline::stages::StageError;
use crate::storage::figures::FigureRef;

/// Fields the question stage must produce, checked before parsing.
const REQUIRED_FIELDS: [&str; 4] = ["passage", "questionStem", "choices", "explanation"];

/// Question text produced by the question-generation stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedQuestionContent {
    /// Short passage framing the figure.
    pub passage: String,
    /// The question itself.
    pub question_stem: String,
    /// Answer options, in presentation order.
    pub choices: Vec<String>,
    /// Index of the correct choice, when the model supplied one.
    #[serde(default)]
    pub correct_choice: Option<u32>,
    /// Explanation of the correct answer.
    pub explanation: String,
}

impl GeneratedQuestionContent {
    /// Parses question content from untrusted model JSON.
    ///
    /// Fails naming whichever required field is absent; parse failures after
    /// the presence check (wrong value types) surface the serde message.
    pub fn from_value(value: Value) -> Result<Self, StageError> {
        let obj = value
            .as_object()
            .ok_or_else(|| StageError::new("question content is not a JSON object"))?;

        for field in REQUIRED_FIELDS {
            if !obj.contains_key(field) {
                return Err(StageError::new(format!(
                    "missing required field '{field}'"
                )));
            }
        }

        serde_json::from_value(value)
            .map_err(|e| StageError::new(format!("malformed question content: {e}")))
    }
}

/// Per-domain difficulty factors derived from the sampled parameters.
///
/// Closed-form blends of the sampled factors; no model calls involved.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DifficultyFactors {
    pub overall: f64,
    pub information_and_ideas: f64,
    pub craft_and_structure: f64,
    pub quantitative_reasoning: f64,
}

impl DifficultyFactors {
    /// Computes the factors from sampled parameters, each clamped to [0, 1].
    pub fn from_params(params: &SampledParams) -> Self {
        let d = params.difficulty;
        let t = params.text_complexity;
        let q = params.data_density;
        Self {
            overall: d.clamp(0.0, 1.0),
            information_and_ideas: (0.6 * d + 0.4 * q).clamp(0.0, 1.0),
            craft_and_structure: (0.5 * d + 0.5 * t).clamp(0.0, 1.0),
            quantitative_reasoning: (0.4 * d + 0.6 * q).clamp(0.0, 1.0),
        }
    }
}

/// Provenance recorded alongside every stored question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationMetadata {
    /// The exact sampled parameters, so a regeneration reproduces the intent.
    pub sampled_params: SampledParams,
    /// Text model that produced the data and question stages.
    pub text_model: String,
    /// Image model that rendered the figure.
    pub image_model: String,
    pub generated_at: DateTime<Utc>,
}

/// Fully assembled question handed to the question sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDocument {
    /// Fixed question type for this pipeline.
    pub question_type: String,
    pub data_type: DataType,
    pub domain: String,
    pub skill: String,
    pub passage: String,
    pub question_stem: String,
    pub choices: Vec<String>,
    pub correct_choice: Option<u32>,
    pub explanation: String,
    pub figure: FigureRef,
    pub difficulty: DifficultyFactors,
    pub metadata: GenerationMetadata,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn question_fixture() -> Value {
        json!({
            "passage": "The figure shows rainfall by month.",
            "questionStem": "Which month had the most rainfall?",
            "choices": ["January", "February", "March", "April"],
            "correctChoice": 2,
            "explanation": "March's bar is tallest."
        })
    }

    #[test]
    fn test_parses_well_formed_content() {
        let content = GeneratedQuestionContent::from_value(question_fixture()).unwrap();
        assert_eq!(content.choices.len(), 4);
        assert_eq!(content.correct_choice, Some(2));
        assert_eq!(content.question_stem, "Which month had the most rainfall?");
    }

    #[test]
    fn test_each_required_field_enforced() {
        for field in ["passage", "questionStem", "choices", "explanation"] {
            let mut v = question_fixture();
            v.as_object_mut().unwrap().remove(field);
            let err = GeneratedQuestionContent::from_value(v).unwrap_err();
            assert!(
                err.to_string().contains(field),
                "error should name '{field}', got: {err}"
            );
        }
    }

    #[test]
    fn test_correct_choice_optional() {
        let mut v = question_fixture();
        v.as_object_mut().unwrap().remove("correctChoice");
        let content = GeneratedQuestionContent::from_value(v).unwrap();
        assert_eq!(content.correct_choice, None);
    }

    #[test]
    fn test_wrong_type_surfaces_parse_error() {
        let mut v = question_fixture();
        v["choices"] = json!("A, B, C");
        let err = GeneratedQuestionContent::from_value(v).unwrap_err();
        assert!(err.to_string().contains("malformed question content"));
    }

    #[test]
    fn test_difficulty_factors_clamped() {
        let mut params = SampledParams::fixture();
        params.difficulty = 1.0;
        params.text_complexity = 1.0;
        params.data_density = 1.0;
        let factors = DifficultyFactors::from_params(&params);
        assert!(factors.overall <= 1.0);
        assert!(factors.information_and_ideas <= 1.0);
        assert!(factors.craft_and_structure <= 1.0);
        assert!(factors.quantitative_reasoning <= 1.0);
    }
}
