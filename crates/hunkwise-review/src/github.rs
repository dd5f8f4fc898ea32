use std::fmt;
use std::path::Path;
use std::str::FromStr;

use hunkwise_core::{HunkwiseError, InlineComment, PullRequestDetails};
use serde::Deserialize;

const DEFAULT_API_BASE: &str = "https://api.github.com";

/// A pull request on GitHub.
///
/// # Examples
///
/// ```
/// use hunkwise_review::github::PullRequestRef;
///
/// let pr: PullRequestRef = "rust-lang/rust#12345".parse().unwrap();
/// assert_eq!(pr.owner, "rust-lang");
/// assert_eq!(pr.repo, "rust");
/// assert_eq!(pr.number, 12345);
/// assert_eq!(pr.to_string(), "rust-lang/rust#12345");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestRef {
    /// Repository owner.
    pub owner: String,
    /// Repository name.
    pub repo: String,
    /// Pull request number.
    pub number: u64,
}

impl FromStr for PullRequestRef {
    type Err = HunkwiseError;

    fn from_str(pr_ref: &str) -> Result<Self, Self::Err> {
        let invalid = || {
            HunkwiseError::Config(format!(
                "invalid PR reference '{pr_ref}', expected owner/repo#number"
            ))
        };
        let (owner_repo, number_str) = pr_ref.split_once('#').ok_or_else(invalid)?;
        let (owner, repo) = owner_repo.split_once('/').ok_or_else(invalid)?;
        if owner.is_empty() || repo.is_empty() || repo.contains('/') {
            return Err(invalid());
        }
        let number: u64 = number_str
            .parse()
            .map_err(|_| HunkwiseError::Config(format!("invalid PR number: {number_str}")))?;
        Ok(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            number,
        })
    }
}

impl fmt::Display for PullRequestRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.owner, self.repo, self.number)
    }
}

#[derive(Deserialize)]
struct EventPayload {
    number: Option<u64>,
    pull_request: Option<EventPullRequest>,
    repository: Option<EventRepository>,
}

#[derive(Deserialize)]
struct EventPullRequest {
    number: u64,
}

#[derive(Deserialize)]
struct EventRepository {
    full_name: String,
}

impl PullRequestRef {
    /// Read the pull request from a GitHub Actions event payload, as found
    /// at `$GITHUB_EVENT_PATH`.
    ///
    /// # Errors
    ///
    /// Returns [`HunkwiseError::FileNotFound`] if the file is missing, a
    /// serialization error for invalid JSON, and [`HunkwiseError::Config`]
    /// when the payload names no pull request.
    pub fn from_event_file(path: &Path) -> Result<Self, HunkwiseError> {
        if !path.exists() {
            return Err(HunkwiseError::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let payload: EventPayload = serde_json::from_str(&content)?;

        let number = payload
            .number
            .or(payload.pull_request.map(|pr| pr.number))
            .ok_or_else(|| {
                HunkwiseError::Config("event payload has no pull request number".into())
            })?;
        let full_name = payload
            .repository
            .map(|r| r.full_name)
            .ok_or_else(|| HunkwiseError::Config("event payload has no repository".into()))?;

        format!("{full_name}#{number}").parse()
    }
}

#[derive(Deserialize)]
struct PullSummary {
    title: Option<String>,
    body: Option<String>,
}

/// GitHub client for fetching pull requests and posting reviews.
pub struct GitHubClient {
    octocrab: octocrab::Octocrab,
    http: reqwest::Client,
    token: String,
    api_base: String,
}

impl GitHubClient {
    /// Create a client from an explicit token, `GITHUB_TOKEN` or `GH_TOKEN`.
    ///
    /// # Errors
    ///
    /// Returns [`HunkwiseError::Config`] if no token is available, or
    /// [`HunkwiseError::GitHub`] if the client cannot be built.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use hunkwise_review::github::GitHubClient;
    ///
    /// let client = GitHubClient::new(Some("ghp_xxxx")).unwrap();
    /// ```
    pub fn new(token: Option<&str>) -> Result<Self, HunkwiseError> {
        Self::with_api_base(token, DEFAULT_API_BASE)
    }

    /// Create a client against a different API root, such as GitHub
    /// Enterprise (`https://ghe.example.com/api/v3`).
    ///
    /// # Errors
    ///
    /// Same as [`GitHubClient::new`].
    pub fn with_api_base(token: Option<&str>, api_base: &str) -> Result<Self, HunkwiseError> {
        let token = match token {
            Some(t) => t.to_string(),
            None => std::env::var("GITHUB_TOKEN")
                .or_else(|_| std::env::var("GH_TOKEN"))
                .map_err(|_| {
                    HunkwiseError::Config(
                        "GITHUB_TOKEN not set. Set GITHUB_TOKEN or GH_TOKEN".into(),
                    )
                })?,
        };
        let api_base = api_base.trim_end_matches('/').to_string();

        let octocrab = octocrab::Octocrab::builder()
            .base_uri(api_base.as_str())
            .map_err(|e| HunkwiseError::GitHub(format!("invalid API base '{api_base}': {e}")))?
            .personal_token(token.clone())
            .build()
            .map_err(|e| HunkwiseError::GitHub(format!("failed to create GitHub client: {e}")))?;

        Ok(Self {
            octocrab,
            http: reqwest::Client::new(),
            token,
            api_base,
        })
    }

    /// Fetch the title and description of a pull request.
    ///
    /// # Errors
    ///
    /// Returns [`HunkwiseError::GitHub`] on network or API errors.
    pub async fn get_pr_details(
        &self,
        pr: &PullRequestRef,
    ) -> Result<PullRequestDetails, HunkwiseError> {
        let route = format!("/repos/{}/{}/pulls/{}", pr.owner, pr.repo, pr.number);
        let summary: PullSummary = self
            .octocrab
            .get(route, None::<&()>)
            .await
            .map_err(|e| HunkwiseError::GitHub(format!("failed to fetch {pr}: {e}")))?;

        Ok(PullRequestDetails {
            owner: pr.owner.clone(),
            repo: pr.repo.clone(),
            pull_number: pr.number,
            title: summary.title.unwrap_or_default(),
            description: summary.body,
        })
    }

    /// Fetch the unified diff for a pull request.
    ///
    /// # Errors
    ///
    /// Returns [`HunkwiseError::GitHub`] on network or API errors.
    pub async fn get_pr_diff(&self, pr: &PullRequestRef) -> Result<String, HunkwiseError> {
        let url = format!(
            "{}/repos/{}/{}/pulls/{}",
            self.api_base, pr.owner, pr.repo, pr.number
        );

        tracing::debug!(%url, "fetching pull request diff");
        let response = self
            .http
            .get(&url)
            .header("Accept", "application/vnd.github.v3.diff")
            .header("Authorization", format!("Bearer {}", self.token))
            .header("User-Agent", "hunkwise")
            .send()
            .await
            .map_err(|e| HunkwiseError::GitHub(format!("failed to fetch PR diff: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HunkwiseError::GitHub(format!(
                "GitHub API error {status}: {body}"
            )));
        }

        response
            .text()
            .await
            .map_err(|e| HunkwiseError::GitHub(format!("failed to read diff response: {e}")))
    }

    /// Post all comments as a single `COMMENT` review.
    ///
    /// # Errors
    ///
    /// Returns [`HunkwiseError::GitHub`] on API errors.
    pub async fn post_review(
        &self,
        pr: &PullRequestRef,
        comments: &[InlineComment],
        summary: &str,
    ) -> Result<(), HunkwiseError> {
        let route = format!("/repos/{}/{}/pulls/{}/reviews", pr.owner, pr.repo, pr.number);
        let body = review_payload(comments, summary);

        tracing::debug!(%pr, comments = comments.len(), "posting review");
        let _response: serde_json::Value = self
            .octocrab
            .post(route, Some(&body))
            .await
            .map_err(|e| HunkwiseError::GitHub(format!("failed to post review: {e}")))?;

        Ok(())
    }
}

fn review_payload(comments: &[InlineComment], summary: &str) -> serde_json::Value {
    let review_comments: Vec<serde_json::Value> = comments
        .iter()
        .map(|c| {
            serde_json::json!({
                "path": c.path.to_string_lossy(),
                "line": c.line,
                "side": c.side,
                "body": c.body,
            })
        })
        .collect();

    serde_json::json!({
        "event": "COMMENT",
        "body": summary,
        "comments": review_comments,
    })
}
