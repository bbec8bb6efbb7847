//! Prompt builder for the chart-data generation stage.

use crate::content::DataType;
use crate::generator::SampledParams;

use super::factor_label;

/// Expected JSON schema for each data type, echoed into the prompt so the
/// model emits the keys the structural validator requires.
fn schema_hint(data_type: DataType) -> &'static str {
    match data_type {
        DataType::BarChart => {
            r#"{
  "title": "string",
  "categories": ["string", ...],
  "values": [number, ...],
  "yAxisLabel": "string"
}"#
        }
        DataType::MultiSeriesBar => {
            r#"{
  "title": "string",
  "categories": ["string", ...],
  "series": [{"name": "string", "values": [number, ...]}, ...],
  "yAxisLabel": "string"
}"#
        }
        DataType::LineGraph => {
            r#"{
  "title": "string",
  "xValues": ["string", ...],
  "series": [{"name": "string", "values": [number, ...]}, ...],
  "xAxisLabel": "string",
  "yAxisLabel": "string"
}"#
        }
        DataType::DataTable => {
            r#"{
  "title": "string",
  "columns": ["string", ...],
  "rows": [["cell", ...], ...]
}"#
        }
    }
}

/// Builds the prompt asking the text model for a realistic chart payload.
pub fn chart_data_prompt(params: &SampledParams, data_type: DataType) -> String {
    format!(
        r#"You are generating realistic data for a {label} used in a standardized reading question.

Domain: {domain}
Data density: {density} (how many categories/points the {label} should carry)
Difficulty: {difficulty}

Requirements:
1. The data must be plausible for the domain and internally consistent.
2. Values must support one clear claim a question can be written about.
3. The title must describe what is measured, not give away the answer.
4. Do not reuse well-known published statistics verbatim.

Output a single JSON object with exactly this shape:
{schema}

Output ONLY the JSON object. No additional text."#,
        label = data_type.label(),
        domain = params.domain.as_str(),
        density = factor_label(params.data_density),
        difficulty = factor_label(params.difficulty),
        schema = schema_hint(data_type),
    )
}
