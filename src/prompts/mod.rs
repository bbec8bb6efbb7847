//! Prompt builders for the three generation stages.
//!
//! All builders are pure functions: no I/O, no randomness, no validation of
//! inputs. Given the same inputs the output is byte-identical, which makes
//! prompt changes diffable across versions and lets tests assert on exact
//! text. Invalid parameters simply produce a nonsensical prompt; validation
//! happens downstream on the model's *response*, never on the request.

pub mod chart_data;
pub mod figure;
pub mod question;

pub use chart_data::chart_data_prompt;
pub use figure::figure_prompt;
pub use question::question_prompt;

use crate::generator::SampledParams;

/// Maps a numeric factor in [0, 1] to a coarse descriptor for prompt text.
pub(crate) fn factor_label(factor: f64) -> &'static str {
    if factor < 0.35 {
        "low"
    } else if factor < 0.7 {
        "moderate"
    } else {
        "high"
    }
}

/// Renders the distractor strategy list as prompt bullet lines.
pub(crate) fn strategy_lines(params: &SampledParams) -> String {
    params
        .distractor_strategies
        .iter()
        .map(|s| format!("- {}", s.as_str()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factor_label_boundaries() {
        assert_eq!(factor_label(0.0), "low");
        assert_eq!(factor_label(0.34), "low");
        assert_eq!(factor_label(0.35), "moderate");
        assert_eq!(factor_label(0.69), "moderate");
        assert_eq!(factor_label(0.7), "high");
        assert_eq!(factor_label(1.0), "high");
    }
}
