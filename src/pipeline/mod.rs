//! Generation pipeline: configuration, stage executors, orchestrator, and
//! the batch/retry drivers.

pub mod config;
pub mod orchestrator;
pub mod runner;
pub mod stages;

pub use config::{ConfigError, PipelineConfig};
pub use orchestrator::{ErrorStage, Pipeline, PipelineResult, ResumeState};
pub use runner::{BatchReport, ItemOutcome, PipelineRunner, RetryReport};
pub use stages::StageError;
