//! LLM review backends and the per-hunk review pipeline.
//!
//! [`service::ReviewService`] is the seam every backend implements;
//! [`backend::build_service`] picks one from configuration and
//! [`pipeline::ReviewPipeline`] drives it over a parsed diff.

pub mod backend;
pub mod gemini;
pub mod github;
pub mod openai;
pub mod pipeline;
pub mod prompt;
pub mod service;

pub use backend::build_service;
pub use service::{clean_response_text, interpret_response, parse_response, ReviewService};
