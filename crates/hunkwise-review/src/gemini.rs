use std::time::Duration;

use async_trait::async_trait;
use hunkwise_core::{
    DiffHunk, HunkwiseError, LlmConfig, PullRequestDetails, ReviewComment, ReviewedFile,
};

use crate::prompt::{self, RESPONSE_FORMAT};
use crate::service::{interpret_response, ReviewService};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Reviewer backed by the Google Gemini `generateContent` API.
///
/// # Examples
///
/// ```
/// use hunkwise_core::LlmConfig;
/// use hunkwise_review::gemini::GeminiReviewer;
///
/// let config = LlmConfig {
///     provider: "gemini".into(),
///     model: "gemini-1.5-flash".into(),
///     api_key: Some("test-key".into()),
///     ..LlmConfig::default()
/// };
/// let reviewer = GeminiReviewer::new(&config).unwrap();
/// assert_eq!(reviewer.model(), "gemini-1.5-flash");
/// ```
pub struct GeminiReviewer {
    client: reqwest::Client,
    config: LlmConfig,
    api_key: String,
    instructions: String,
}

impl GeminiReviewer {
    /// Create a reviewer from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`HunkwiseError::Config`] when no API key is configured or
    /// set in `GEMINI_API_KEY`, and [`HunkwiseError::Backend`] if the HTTP
    /// client cannot be built.
    pub fn new(config: &LlmConfig) -> Result<Self, HunkwiseError> {
        let api_key = config.resolve_api_key().ok_or_else(|| {
            HunkwiseError::Config(
                "no API key for provider 'gemini'; set GEMINI_API_KEY or llm.api_key".into(),
            )
        })?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| HunkwiseError::Backend(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            config: config.clone(),
            api_key,
            instructions: instructions(),
        })
    }

    /// Return the model name from the configuration.
    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Send a single-turn `generateContent` request and return the text of
    /// the first candidate.
    ///
    /// # Errors
    ///
    /// Returns [`HunkwiseError::Backend`] on HTTP errors, blocked prompts or
    /// an unexpected response envelope.
    pub async fn generate(&self, prompt: &str) -> Result<String, HunkwiseError> {
        let base_url = self
            .config
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/');
        let url = format!(
            "{base_url}/v1beta/models/{}:generateContent",
            self.config.model
        );

        let mut generation_config = serde_json::json!({
            "temperature": self.config.temperature,
            "responseMimeType": "application/json",
        });
        if let Some(max_tokens) = self.config.max_output_tokens {
            generation_config["maxOutputTokens"] = max_tokens.into();
        }
        let body = serde_json::json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": generation_config,
        });

        tracing::debug!(%url, "sending generateContent request");
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| HunkwiseError::Backend(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(HunkwiseError::Backend(format!(
                "Gemini API error {status}: {body_text}"
            )));
        }

        let response_body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| HunkwiseError::Backend(format!("failed to parse response: {e}")))?;

        if let Some(reason) = response_body
            .get("promptFeedback")
            .and_then(|f| f.get("blockReason"))
            .and_then(|r| r.as_str())
        {
            return Err(HunkwiseError::Backend(format!("prompt blocked: {reason}")));
        }

        let parts = response_body
            .get("candidates")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("content"))
            .and_then(|c| c.get("parts"))
            .and_then(|p| p.as_array())
            .ok_or_else(|| {
                HunkwiseError::Backend(format!("unexpected response structure: {response_body}"))
            })?;

        Ok(parts
            .iter()
            .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
            .collect())
    }
}

fn instructions() -> String {
    format!(
        "You review one hunk of a pull request.\n\
         - Answer with JSON only, shaped as: {RESPONSE_FORMAT}\n\
         - Comment only where the code can be improved; otherwise return an empty \"reviews\" array.\n\
         - No compliments or summaries.\n\
         - \"lineNumber\" is the number printed before the diff line you comment on.\n\
         - Write comments in GitHub Markdown.\n\
         - The pull request description is context only; comment on the code.\n\
         - Never suggest adding code comments."
    )
}

#[async_trait]
impl ReviewService for GeminiReviewer {
    fn name(&self) -> &str {
        "gemini"
    }

    fn create_prompt(
        &self,
        file: &ReviewedFile,
        hunk: &DiffHunk,
        pr_details: &PullRequestDetails,
    ) -> String {
        prompt::build_hunk_prompt(&self.instructions, file, hunk, pr_details)
    }

    async fn get_ai_response(&self, prompt: &str) -> Result<Vec<ReviewComment>, HunkwiseError> {
        let raw = self.generate(prompt).await?;
        Ok(interpret_response(&raw))
    }
}
