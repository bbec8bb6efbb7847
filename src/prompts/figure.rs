//! Prompt builder for the figure-rendering stage.

use crate::content::ChartData;

/// Builds the rendering prompt handed to the image model.
///
/// The full chart JSON is embedded so the rendered figure matches the data
/// the question stage will reason about.
pub fn figure_prompt(chart: &ChartData) -> String {
    format!(
        r#"Render a clean, print-quality {label} for a standardized test.

Title: {title}

Data (JSON):
{json}

Style requirements:
1. White background, dark axis lines, clearly labeled axes.
2. Every value in the data must be readable from the figure.
3. No legend unless the data has multiple series.
4. No decorative elements, watermarks, or extra text."#,
        label = chart.data_type().label(),
        title = chart.title(),
        json = chart.to_json(),
    )
}
