use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::HunkwiseError;

/// Top-level configuration loaded from `.hunkwise.toml`.
///
/// Resolution order: CLI flags > env vars (API keys only) > config file > defaults.
///
/// # Examples
///
/// ```
/// use hunkwise_core::HunkwiseConfig;
///
/// let config = HunkwiseConfig::default();
/// assert_eq!(config.llm.provider, "openai");
/// assert_eq!(config.review.max_changed_lines, 1000);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HunkwiseConfig {
    /// LLM backend settings.
    #[serde(default)]
    pub llm: LlmConfig,
    /// Review behavior settings.
    #[serde(default)]
    pub review: ReviewConfig,
}

impl HunkwiseConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`HunkwiseError::FileNotFound`] if the file does not exist,
    /// [`HunkwiseError::Io`] if it cannot be read, or
    /// [`HunkwiseError::Toml`] if the content is not valid TOML.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use hunkwise_core::HunkwiseConfig;
    /// use std::path::Path;
    ///
    /// let config = HunkwiseConfig::from_file(Path::new(".hunkwise.toml")).unwrap();
    /// ```
    pub fn from_file(path: &Path) -> Result<Self, HunkwiseError> {
        if !path.exists() {
            return Err(HunkwiseError::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`HunkwiseError::Toml`] if parsing fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use hunkwise_core::HunkwiseConfig;
    ///
    /// let toml = r#"
    /// [llm]
    /// provider = "gemini"
    /// "#;
    /// let config = HunkwiseConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.llm.provider, "gemini");
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, HunkwiseError> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }
}

/// LLM backend configuration.
///
/// # Examples
///
/// ```
/// use hunkwise_core::LlmConfig;
///
/// let config = LlmConfig::default();
/// assert_eq!(config.model, "gpt-4o");
/// assert_eq!(config.timeout_secs, 120);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Backend name: `"openai"`, `"ollama"`, `"openai-compatible"` or `"gemini"`.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,
    /// API key; falls back to the provider's environment variable.
    pub api_key: Option<String>,
    /// Custom base URL for API requests.
    pub base_url: Option<String>,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Upper bound on generated tokens, if the backend supports one.
    pub max_output_tokens: Option<u32>,
    /// HTTP request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_provider() -> String {
    "openai".into()
}

fn default_model() -> String {
    "gpt-4o".into()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key: None,
            base_url: None,
            temperature: default_temperature(),
            max_output_tokens: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl LlmConfig {
    /// Environment variable consulted when `api_key` is unset.
    ///
    /// Returns `None` for providers that run without a key.
    ///
    /// # Examples
    ///
    /// ```
    /// use hunkwise_core::LlmConfig;
    ///
    /// let config = LlmConfig { provider: "gemini".into(), ..LlmConfig::default() };
    /// assert_eq!(config.api_key_env_var(), Some("GEMINI_API_KEY"));
    /// ```
    pub fn api_key_env_var(&self) -> Option<&'static str> {
        match self.provider.as_str() {
            "gemini" => Some("GEMINI_API_KEY"),
            "ollama" | "openai-compatible" => None,
            _ => Some("OPENAI_API_KEY"),
        }
    }

    /// The configured key, or the value of [`Self::api_key_env_var`].
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(key) = self.api_key.as_ref().filter(|k| !k.is_empty()) {
            return Some(key.clone());
        }
        self.api_key_env_var()
            .and_then(|var| std::env::var(var).ok())
            .filter(|k| !k.is_empty())
    }
}

/// Review behavior configuration.
///
/// # Examples
///
/// ```
/// use hunkwise_core::ReviewConfig;
///
/// let config = ReviewConfig::default();
/// assert!(config.exclude.is_empty());
/// assert_eq!(config.max_comments, None);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewConfig {
    /// Glob patterns of files to leave out of the review.
    #[serde(default)]
    pub exclude: Vec<String>,
    /// File extensions (without dot) to leave out of the review.
    #[serde(default)]
    pub skip_extensions: Vec<String>,
    /// Files with more added plus removed lines are skipped (default: 1000).
    #[serde(default = "default_max_changed_lines")]
    pub max_changed_lines: usize,
    /// Cap on comments kept for a whole run; unlimited when unset.
    pub max_comments: Option<usize>,
}

fn default_max_changed_lines() -> usize {
    1000
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            exclude: Vec::new(),
            skip_extensions: Vec::new(),
            max_changed_lines: default_max_changed_lines(),
            max_comments: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let config = HunkwiseConfig::default();
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.llm.temperature, 0.2);
        assert_eq!(config.llm.timeout_secs, 120);
        assert!(config.llm.api_key.is_none());
        assert!(config.review.exclude.is_empty());
        assert_eq!(config.review.max_changed_lines, 1000);
        assert!(config.review.max_comments.is_none());
    }

    #[test]
    fn parse_full_toml() {
        let toml = r#"
[llm]
provider = "gemini"
model = "gemini-1.5-flash"
base_url = "http://localhost:9000"
temperature = 0.0
max_output_tokens = 2048
timeout_secs = 30

[review]
exclude = ["*.md", "docs/**"]
skip_extensions = ["snap"]
max_changed_lines = 400
max_comments = 20
"#;
        let config = HunkwiseConfig::from_toml(toml).unwrap();
        assert_eq!(config.llm.provider, "gemini");
        assert_eq!(config.llm.model, "gemini-1.5-flash");
        assert_eq!(config.llm.base_url.as_deref(), Some("http://localhost:9000"));
        assert_eq!(config.llm.max_output_tokens, Some(2048));
        assert_eq!(config.llm.timeout_secs, 30);
        assert_eq!(config.review.exclude, vec!["*.md", "docs/**"]);
        assert_eq!(config.review.skip_extensions, vec!["snap"]);
        assert_eq!(config.review.max_changed_lines, 400);
        assert_eq!(config.review.max_comments, Some(20));
    }

    #[test]
    fn empty_toml_gives_defaults() {
        let config = HunkwiseConfig::from_toml("").unwrap();
        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.review.max_changed_lines, 1000);
    }

    #[test]
    fn invalid_toml_returns_error() {
        let result = HunkwiseConfig::from_toml("{{invalid}}");
        assert!(matches!(result, Err(HunkwiseError::Toml(_))));
    }

    #[test]
    fn missing_file_is_reported() {
        let result = HunkwiseConfig::from_file(Path::new("/nonexistent/.hunkwise.toml"));
        assert!(matches!(result, Err(HunkwiseError::FileNotFound(_))));
    }

    #[test]
    fn configured_key_wins_over_env() {
        let config = LlmConfig {
            api_key: Some("from-config".into()),
            ..LlmConfig::default()
        };
        assert_eq!(config.resolve_api_key().as_deref(), Some("from-config"));
    }

    #[test]
    fn keyless_providers_have_no_env_var() {
        let config = LlmConfig {
            provider: "ollama".into(),
            ..LlmConfig::default()
        };
        assert_eq!(config.api_key_env_var(), None);
        assert_eq!(config.resolve_api_key(), None);
    }
}
