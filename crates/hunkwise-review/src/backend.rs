use hunkwise_core::{HunkwiseError, LlmConfig};

use crate::gemini::GeminiReviewer;
use crate::openai::OpenAiReviewer;
use crate::service::ReviewService;

/// Provider names accepted by [`build_service`].
pub const PROVIDERS: &[&str] = &["openai", "ollama", "openai-compatible", "gemini"];

/// Construct the review backend named by `config.provider`.
///
/// `ollama` defaults its base URL to `http://localhost:11434`.
///
/// # Errors
///
/// Returns [`HunkwiseError::Config`] for unknown providers or missing
/// credentials.
///
/// # Examples
///
/// ```
/// use hunkwise_core::LlmConfig;
/// use hunkwise_review::backend::build_service;
///
/// let config = LlmConfig { provider: "ollama".into(), ..LlmConfig::default() };
/// let service = build_service(&config).unwrap();
/// assert_eq!(service.name(), "openai");
///
/// let bad = LlmConfig { provider: "nope".into(), ..LlmConfig::default() };
/// assert!(build_service(&bad).is_err());
/// ```
pub fn build_service(config: &LlmConfig) -> Result<Box<dyn ReviewService>, HunkwiseError> {
    match config.provider.as_str() {
        "openai" | "openai-compatible" => Ok(Box::new(OpenAiReviewer::new(config)?)),
        "ollama" => {
            let mut config = config.clone();
            config
                .base_url
                .get_or_insert_with(|| "http://localhost:11434".into());
            Ok(Box::new(OpenAiReviewer::new(&config)?))
        }
        "gemini" => Ok(Box::new(GeminiReviewer::new(config)?)),
        other => Err(HunkwiseError::Config(format!(
            "unknown LLM provider '{other}', expected one of: {}",
            PROVIDERS.join(", ")
        ))),
    }
}
