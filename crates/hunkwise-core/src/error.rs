use std::path::PathBuf;

/// Errors that can occur across hunkwise.
///
/// Library crates return this type directly; the binary renders it through
/// `miette` at the boundary. Malformed model output is never an error: the
/// response helpers degrade to an empty comment list instead, so
/// [`HunkwiseError::Backend`] only covers transport, auth, quota and
/// envelope failures.
///
/// # Examples
///
/// ```
/// use hunkwise_core::HunkwiseError;
///
/// let err = HunkwiseError::Backend("quota exceeded".into());
/// assert!(err.to_string().contains("quota exceeded"));
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum HunkwiseError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    #[diagnostic(code(hunkwise::io))]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    #[diagnostic(
        code(hunkwise::config),
        help("Run 'hunkwise init' to create a default .hunkwise.toml")
    )]
    Config(String),

    /// Malformed unified diff or other structured input.
    #[error("parse error: {0}")]
    #[diagnostic(code(hunkwise::parse))]
    Parse(String),

    /// Network, authentication or quota failure while calling an LLM backend.
    #[error("LLM backend error: {0}")]
    #[diagnostic(code(hunkwise::backend))]
    Backend(String),

    /// GitHub API failure.
    #[error("GitHub error: {0}")]
    #[diagnostic(code(hunkwise::github))]
    GitHub(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    #[diagnostic(code(hunkwise::serialization))]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    #[diagnostic(code(hunkwise::toml))]
    Toml(#[from] toml::de::Error),

    /// A required file was not found.
    #[error("file not found: {}", .0.display())]
    #[diagnostic(code(hunkwise::file_not_found))]
    FileNotFound(PathBuf),
}
