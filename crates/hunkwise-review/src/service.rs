//! The contract every LLM review backend implements, plus the response
//! helpers they share.
//!
//! A review call flows as: [`ReviewService::create_prompt`] → backend call
//! inside [`ReviewService::get_ai_response`] → [`clean_response_text`] →
//! [`parse_response`] → comments.

use async_trait::async_trait;
use hunkwise_core::{
    DiffHunk, HunkwiseError, LineNumber, PullRequestDetails, ReviewComment, ReviewedFile,
};
use serde_json::Value;

/// Opening fence some models wrap JSON output in.
const JSON_FENCE_OPEN: &str = "```json";
/// Closing fence.
const FENCE_CLOSE: &str = "```";

/// A pluggable LLM backend that reviews one diff hunk at a time.
///
/// Implementations hold whatever client state they need (HTTP client,
/// credentials). Both operations take `&self`, so a single instance can be
/// shared across tasks.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use hunkwise_core::{DiffHunk, HunkwiseError, PullRequestDetails, ReviewComment, ReviewedFile};
/// use hunkwise_review::service::{interpret_response, ReviewService};
///
/// struct Canned(&'static str);
///
/// #[async_trait]
/// impl ReviewService for Canned {
///     fn name(&self) -> &str {
///         "canned"
///     }
///
///     fn create_prompt(&self, file: &ReviewedFile, _hunk: &DiffHunk, _pr: &PullRequestDetails) -> String {
///         format!("review {}", file.path.display())
///     }
///
///     async fn get_ai_response(&self, _prompt: &str) -> Result<Vec<ReviewComment>, HunkwiseError> {
///         Ok(interpret_response(self.0))
///     }
/// }
/// ```
#[async_trait]
pub trait ReviewService: Send + Sync {
    /// Short backend name used in logs and stats.
    fn name(&self) -> &str;

    /// Build the prompt for one hunk.
    ///
    /// Must be deterministic and free of side effects.
    fn create_prompt(
        &self,
        file: &ReviewedFile,
        hunk: &DiffHunk,
        pr_details: &PullRequestDetails,
    ) -> String;

    /// Send `prompt` to the backend and return the comments it produced.
    ///
    /// Malformed model output yields an empty list, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`HunkwiseError::Backend`] on network, authentication, quota
    /// or response-envelope failures.
    async fn get_ai_response(&self, prompt: &str) -> Result<Vec<ReviewComment>, HunkwiseError>;
}

/// Strip surrounding whitespace and a ```` ```json ```` … ```` ``` ```` fence.
///
/// Only a fence opening exactly with ```` ```json ```` at the start and a
/// ```` ``` ```` at the end is removed, each at most once. The result is not
/// guaranteed to be valid JSON.
///
/// # Examples
///
/// ```
/// use hunkwise_review::service::clean_response_text;
///
/// assert_eq!(clean_response_text("  ```json\n{\"reviews\": []}\n```  "), "{\"reviews\": []}");
/// assert_eq!(clean_response_text("{}"), "{}");
/// assert_eq!(clean_response_text(" \n\t "), "");
/// ```
pub fn clean_response_text(text: &str) -> &str {
    let mut text = text.trim();
    if let Some(rest) = text.strip_prefix(JSON_FENCE_OPEN) {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix(FENCE_CLOSE) {
        text = rest;
    }
    text.trim()
}

/// Parse cleaned model output into review comments.
///
/// Expects `{"reviews": [{"lineNumber": .., "reviewComment": ".."}, ..]}`.
/// Entries that are not objects, or whose `lineNumber` is missing, zero,
/// empty or not a number/string, or whose `reviewComment` is missing, empty
/// or not a string, are dropped. Invalid JSON, a non-object top level, or a
/// missing or non-array `"reviews"` all yield an empty list. Order is
/// preserved and duplicates are kept.
///
/// # Examples
///
/// ```
/// use hunkwise_review::service::parse_response;
///
/// let comments = parse_response(r#"{"reviews": [{"lineNumber": "42", "reviewComment": "Rename this."}]}"#);
/// assert_eq!(comments.len(), 1);
/// assert_eq!(comments[0].line_number.as_u32(), Some(42));
///
/// assert!(parse_response("not json").is_empty());
/// assert!(parse_response("").is_empty());
/// ```
pub fn parse_response(text: &str) -> Vec<ReviewComment> {
    if text.is_empty() {
        return Vec::new();
    }

    let data: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "model response is not valid JSON, ignoring it");
            return Vec::new();
        }
    };

    let Some(reviews) = data.get("reviews").and_then(Value::as_array) else {
        tracing::debug!("model response has no \"reviews\" array");
        return Vec::new();
    };

    let comments: Vec<ReviewComment> = reviews.iter().filter_map(review_from_value).collect();
    if comments.len() < reviews.len() {
        tracing::debug!(
            dropped = reviews.len() - comments.len(),
            kept = comments.len(),
            "dropped incomplete review entries"
        );
    }
    comments
}

/// Clean and parse raw model output in one step.
///
/// # Examples
///
/// ```
/// use hunkwise_review::service::interpret_response;
///
/// let raw = "```json\n{\"reviews\": [{\"lineNumber\": 3, \"reviewComment\": \"ok\"}]}\n```";
/// assert_eq!(interpret_response(raw).len(), 1);
/// ```
pub fn interpret_response(raw: &str) -> Vec<ReviewComment> {
    parse_response(clean_response_text(raw))
}

fn review_from_value(value: &Value) -> Option<ReviewComment> {
    let entry = value.as_object()?;

    let line_number = match entry.get("lineNumber")? {
        Value::Number(n) => LineNumber::Number(n.clone()),
        Value::String(s) => LineNumber::Text(s.clone()),
        _ => return None,
    };
    if !line_number.is_truthy() {
        return None;
    }

    let review_comment = entry.get("reviewComment")?.as_str()?;
    if review_comment.is_empty() {
        return None;
    }

    Some(ReviewComment {
        line_number,
        review_comment: review_comment.to_string(),
    })
}
