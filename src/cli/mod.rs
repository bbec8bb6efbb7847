//! Command-line interface for quizforge.
//!
//! Provides commands for batch generation, DLQ retries, and queue
//! inspection.

mod commands;

pub use commands::{parse_cli, run, run_with_cli};
