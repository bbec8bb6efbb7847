//! Generative model clients.
//!
//! Two provider traits sit at the seam between the pipeline and the outside
//! world: [`TextProvider`] for the structured-data and question stages, and
//! [`ImageProvider`] for figure rendering. The pipeline only ever sees the
//! traits; HTTP clients live here, stubs live in the tests.
//!
//! [`extract`] holds the brace-matching JSON extraction applied to every text
//! response, since the models are not trusted to emit pure JSON.

pub mod extract;
pub mod image;
pub mod text;

pub use extract::extract_json_object;
pub use image::{GeminiImageClient, ImagePart, ImageProvider, ImageResponse};
pub use text::{AnthropicClient, ContentBlock, MessageResponse, TextProvider};
