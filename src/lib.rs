//! quizforge: chart-question generator with a dead-letter retry queue.
//!
//! This library generates chart-based reading questions through a three-stage
//! AI pipeline (structured chart data, rendered figure image, question
//! content) and records failed items in a SQLite dead-letter queue so retries
//! resume from the stage that failed.

// Core modules
pub mod cli;
pub mod content;
pub mod error;
pub mod generator;
pub mod llm;
pub mod pipeline;
pub mod prompts;
pub mod storage;

// Re-export commonly used error types
pub use error::{LlmError, StorageError};
pub use pipeline::StageError;
pub use storage::DlqError;
