//! Persistence collaborators.
//!
//! Three surfaces, in order of ownership:
//!
//! - [`dlq`] - the dead-letter queue store. Owned by this crate: it is the
//!   single writer of [`dlq::DlqRecord`] lifecycles and enforces the retry
//!   state machine.
//! - [`figures`] - external figure storage (upload-URL handshake), consumed
//!   through the [`figures::FigureStore`] trait.
//! - [`questions`] - external question persistence, consumed through the
//!   [`questions::QuestionSink`] trait.

pub mod dlq;
pub mod figures;
pub mod questions;

pub use dlq::{DlqError, DlqRecord, DlqStats, DlqStatus, DlqStore, NewDlqItem};
pub use figures::{FigureMeta, FigureRef, FigureStore, HttpFigureStore};
pub use questions::{HttpQuestionSink, QuestionSink};
