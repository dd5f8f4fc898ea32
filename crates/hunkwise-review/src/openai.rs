use std::time::Duration;

use async_trait::async_trait;
use hunkwise_core::{
    DiffHunk, HunkwiseError, LlmConfig, PullRequestDetails, ReviewComment, ReviewedFile,
};
use serde::{Deserialize, Serialize};

use crate::prompt::{self, DEFAULT_INSTRUCTIONS};
use crate::service::{interpret_response, ReviewService};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

const SYSTEM_PROMPT: &str = "\
You are an experienced code reviewer commenting on a single diff hunk of a pull request. \
Reply with one JSON object and nothing else.";

/// A message in a chat conversation with the model.
///
/// # Examples
///
/// ```
/// use hunkwise_review::openai::{ChatMessage, Role};
///
/// let msg = ChatMessage {
///     role: Role::User,
///     content: "Review this hunk".into(),
/// };
/// assert!(matches!(msg.role, Role::User));
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    /// Role of the message sender.
    pub role: Role,
    /// Text content of the message.
    pub content: String,
}

/// Role in the chat conversation.
///
/// # Examples
///
/// ```
/// use hunkwise_review::openai::Role;
///
/// assert_eq!(serde_json::to_string(&Role::System).unwrap(), "\"system\"");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System-level instructions.
    System,
    /// User input.
    User,
}

/// Reviewer backed by an OpenAI-compatible chat completions endpoint.
///
/// Works with any provider that exposes `/v1/chat/completions`: OpenAI,
/// Ollama, vLLM, LiteLLM, etc.
///
/// # Examples
///
/// ```
/// use hunkwise_core::LlmConfig;
/// use hunkwise_review::openai::OpenAiReviewer;
///
/// let config = LlmConfig {
///     api_key: Some("test-key".into()),
///     ..LlmConfig::default()
/// };
/// let reviewer = OpenAiReviewer::new(&config).unwrap();
/// assert_eq!(reviewer.model(), "gpt-4o");
/// ```
pub struct OpenAiReviewer {
    client: reqwest::Client,
    config: LlmConfig,
    api_key: Option<String>,
}

impl OpenAiReviewer {
    /// Create a reviewer from configuration.
    ///
    /// The API key is taken from the config or the provider's environment
    /// variable; requests are sent without `Authorization` when neither is set.
    ///
    /// # Errors
    ///
    /// Returns [`HunkwiseError::Backend`] if the HTTP client cannot be built.
    pub fn new(config: &LlmConfig) -> Result<Self, HunkwiseError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| HunkwiseError::Backend(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_key: config.resolve_api_key(),
            config: config.clone(),
        })
    }

    /// Return the model name from the configuration.
    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Send a chat completion request and return the text response.
    ///
    /// # Errors
    ///
    /// Returns [`HunkwiseError::Backend`] on HTTP errors or an unexpected
    /// response envelope.
    pub async fn chat(&self, messages: Vec<ChatMessage>) -> Result<String, HunkwiseError> {
        let base_url = self
            .config
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/');
        let url = format!("{base_url}/v1/chat/completions");

        let mut body = serde_json::json!({
            "model": self.config.model,
            "messages": messages,
            "temperature": self.config.temperature,
            "response_format": { "type": "json_object" },
        });
        if let Some(max_tokens) = self.config.max_output_tokens {
            body["max_tokens"] = max_tokens.into();
        }

        let mut request = self.client.post(&url);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        tracing::debug!(%url, model = %self.config.model, "sending chat completion request");
        let response = request
            .json(&body)
            .send()
            .await
            .map_err(|e| HunkwiseError::Backend(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(HunkwiseError::Backend(format!(
                "chat completions API error {status}: {body_text}"
            )));
        }

        let response_body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| HunkwiseError::Backend(format!("failed to parse response: {e}")))?;

        let content = response_body
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .ok_or_else(|| {
                HunkwiseError::Backend(format!("unexpected response structure: {response_body}"))
            })?;

        Ok(content.to_string())
    }
}

#[async_trait]
impl ReviewService for OpenAiReviewer {
    fn name(&self) -> &str {
        "openai"
    }

    fn create_prompt(
        &self,
        file: &ReviewedFile,
        hunk: &DiffHunk,
        pr_details: &PullRequestDetails,
    ) -> String {
        prompt::build_hunk_prompt(DEFAULT_INSTRUCTIONS, file, hunk, pr_details)
    }

    async fn get_ai_response(&self, prompt: &str) -> Result<Vec<ReviewComment>, HunkwiseError> {
        let messages = vec![
            ChatMessage {
                role: Role::System,
                content: SYSTEM_PROMPT.into(),
            },
            ChatMessage {
                role: Role::User,
                content: prompt.into(),
            },
        ];
        let raw = self.chat(messages).await?;
        Ok(interpret_response(&raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> LlmConfig {
        LlmConfig {
            provider: "openai".into(),
            model: "gpt-4o-mini".into(),
            api_key: Some("sk-test".into()),
            base_url: Some(server.uri()),
            ..LlmConfig::default()
        }
    }

    fn completion(content: &str) -> serde_json::Value {
        serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": content } }]
        })
    }

    #[test]
    fn model_returns_config_model() {
        let config = LlmConfig {
            model: "gpt-4o-mini".into(),
            ..LlmConfig::default()
        };
        let reviewer = OpenAiReviewer::new(&config).unwrap();
        assert_eq!(reviewer.model(), "gpt-4o-mini");
        assert_eq!(reviewer.name(), "openai");
    }

    #[test]
    fn chat_message_serializes() {
        let msg = ChatMessage {
            role: Role::System,
            content: "hello".into(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "system");
        assert_eq!(json["content"], "hello");
    }

    #[tokio::test]
    async fn get_ai_response_parses_fenced_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({
                "model": "gpt-4o-mini",
                "response_format": { "type": "json_object" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(
                "```json\n{\"reviews\": [{\"lineNumber\": 13, \"reviewComment\": \"Use `?`.\"}]}\n```",
            )))
            .expect(1)
            .mount(&server)
            .await;

        let reviewer = OpenAiReviewer::new(&config_for(&server)).unwrap();
        let comments = reviewer.get_ai_response("prompt").await.unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].line_number.as_u32(), Some(13));
        assert_eq!(comments[0].review_comment, "Use `?`.");
    }

    #[tokio::test]
    async fn malformed_model_output_is_empty_not_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(completion("I could not review this.")),
            )
            .mount(&server)
            .await;

        let reviewer = OpenAiReviewer::new(&config_for(&server)).unwrap();
        let comments = reviewer.get_ai_response("prompt").await.unwrap();
        assert!(comments.is_empty());
    }

    #[tokio::test]
    async fn http_failure_is_backend_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let reviewer = OpenAiReviewer::new(&config_for(&server)).unwrap();
        let err = reviewer.get_ai_response("prompt").await.unwrap_err();
        assert!(matches!(err, HunkwiseError::Backend(_)));
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("rate limited"));
    }

    #[tokio::test]
    async fn unexpected_envelope_is_backend_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "choices": [] })),
            )
            .mount(&server)
            .await;

        let reviewer = OpenAiReviewer::new(&config_for(&server)).unwrap();
        let err = reviewer.get_ai_response("prompt").await.unwrap_err();
        assert!(err.to_string().contains("unexpected response structure"));
    }
}
