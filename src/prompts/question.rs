//! Prompt builder for the question-generation stage.

use crate::generator::SampledParams;

use super::{factor_label, strategy_lines};

/// Builds the prompt asking the text model for question content.
///
/// Takes the chart payload as pre-serialized JSON so the prompt reflects the
/// exact artifact the previous stages produced.
pub fn question_prompt(params: &SampledParams, chart_json: &str) -> String {
    format!(
        r#"You are writing one multiple-choice reading question about a figure.

The figure shows this data (JSON):
{chart_json}

Question parameters:
- Domain: {domain}
- Claim type: the correct answer must be a claim that {claim} the data
- Passage complexity: {complexity}
- Difficulty: {difficulty}

Distractor requirements - each incorrect choice must follow one of:
{strategies}

Output a single JSON object with exactly this shape:
{{
  "passage": "2-3 sentence passage introducing the figure's context",
  "questionStem": "the question",
  "choices": ["choice A", "choice B", "choice C", "choice D"],
  "correctChoice": 0,
  "explanation": "why the correct choice is right and each distractor is wrong"
}}

Output ONLY the JSON object. No additional text."#,
        chart_json = chart_json,
        domain = params.domain.as_str(),
        claim = params.claim_type.as_str(),
        complexity = factor_label(params.text_complexity),
        difficulty = factor_label(params.difficulty),
        strategies = strategy_lines(params),
    )
}
