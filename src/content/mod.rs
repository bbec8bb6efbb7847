//! Data contracts for generated content.
//!
//! The pipeline moves three artifact shapes between stages:
//!
//! - [`ChartData`] - structured chart payload produced by the text model,
//!   validated per [`DataType`] before it is trusted
//! - [`FigureRef`] - opaque reference to a rendered, uploaded figure
//!   (defined in [`crate::storage::figures`])
//! - [`GeneratedQuestionContent`] - question text produced by the text model
//!
//! Each stage's artifact is the exact input of the next stage.

pub mod chart;
pub mod question;

pub use chart::{ChartData, ChartDataError, DataType};
pub use question::{DifficultyFactors, GeneratedQuestionContent, QuestionDocument};
