use std::fmt;
use std::path::PathBuf;

use hunkwise_core::{
    DiffHunk, HunkwiseError, InlineComment, PullRequestDetails, ReviewComment, ReviewConfig, Side,
};
use hunkwise_difflens::filter::DiffFilter;
use hunkwise_difflens::parser::FileDiff;
use serde::Serialize;

use crate::service::ReviewService;

/// Result of a completed code review.
///
/// # Examples
///
/// ```
/// use hunkwise_review::pipeline::{ReviewResult, ReviewStats};
///
/// let result = ReviewResult {
///     comments: vec![],
///     skipped: vec![],
///     stats: ReviewStats {
///         backend: "openai".into(),
///         ..ReviewStats::default()
///     },
/// };
/// assert!(result.comments.is_empty());
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResult {
    /// Anchored review comments in diff order.
    pub comments: Vec<InlineComment>,
    /// Files the filter left out.
    pub skipped: Vec<SkippedSummary>,
    /// Statistics about the review run.
    pub stats: ReviewStats,
}

/// A file that was not sent for review.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedSummary {
    /// Path of the skipped file.
    pub path: PathBuf,
    /// Human-readable skip reason.
    pub reason: String,
}

/// Statistics about a review run.
///
/// # Examples
///
/// ```
/// use hunkwise_review::pipeline::ReviewStats;
///
/// let stats = ReviewStats {
///     comments_generated: 5,
///     comments_unanchored: 1,
///     comments_truncated: 1,
///     ..ReviewStats::default()
/// };
/// assert_eq!(stats.comments_kept(), 3);
/// ```
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewStats {
    /// Backend that produced the comments.
    pub backend: String,
    /// Number of files sent for review.
    pub files_reviewed: usize,
    /// Number of files the filter skipped.
    pub files_skipped: usize,
    /// Number of hunks sent to the backend.
    pub hunks_reviewed: usize,
    /// Comments returned by the backend.
    pub comments_generated: usize,
    /// Comments whose line number did not fall inside their hunk.
    pub comments_unanchored: usize,
    /// Comments removed by the `max_comments` cap.
    pub comments_truncated: usize,
}

impl ReviewStats {
    /// Comments that survived anchoring and truncation.
    pub fn comments_kept(&self) -> usize {
        self.comments_generated - self.comments_unanchored - self.comments_truncated
    }
}

/// Drives a review: filters files, asks the backend about every hunk and
/// anchors the answers to diff positions.
pub struct ReviewPipeline {
    service: Box<dyn ReviewService>,
    filter: DiffFilter,
    max_comments: Option<usize>,
}

impl ReviewPipeline {
    /// Create a pipeline from a backend and review config.
    pub fn new(service: Box<dyn ReviewService>, config: &ReviewConfig) -> Self {
        Self {
            service,
            filter: DiffFilter::from_config(config),
            max_comments: config.max_comments,
        }
    }

    /// The backend this pipeline talks to.
    pub fn service(&self) -> &dyn ReviewService {
        self.service.as_ref()
    }

    /// Review every hunk of `diffs` in order.
    ///
    /// Hunks are reviewed one at a time.
    ///
    /// # Errors
    ///
    /// Returns the first backend error; no partial result is produced.
    pub async fn review(
        &self,
        diffs: Vec<FileDiff>,
        pr: &PullRequestDetails,
    ) -> Result<ReviewResult, HunkwiseError> {
        let filtered = self.filter.filter(diffs);

        let mut stats = ReviewStats {
            backend: self.service.name().to_string(),
            files_reviewed: filtered.kept.len(),
            files_skipped: filtered.skipped.len(),
            ..ReviewStats::default()
        };
        let mut comments = Vec::new();

        for diff in &filtered.kept {
            for hunk in &diff.hunks {
                stats.hunks_reviewed += 1;
                let prompt = self.service.create_prompt(&diff.file, hunk, pr);
                tracing::debug!(
                    path = %diff.file.path.display(),
                    hunk = %hunk.header(),
                    "requesting review"
                );
                let replies = self.service.get_ai_response(&prompt).await?;
                stats.comments_generated += replies.len();

                for reply in replies {
                    match anchor(diff, hunk, reply) {
                        Some(comment) => comments.push(comment),
                        None => stats.comments_unanchored += 1,
                    }
                }
            }
        }

        if let Some(max) = self.max_comments {
            if comments.len() > max {
                stats.comments_truncated = comments.len() - max;
                comments.truncate(max);
            }
        }

        Ok(ReviewResult {
            comments,
            skipped: filtered
                .skipped
                .into_iter()
                .map(|s| SkippedSummary {
                    path: s.path,
                    reason: s.reason.to_string(),
                })
                .collect(),
            stats,
        })
    }
}

fn anchor(diff: &FileDiff, hunk: &DiffHunk, reply: ReviewComment) -> Option<InlineComment> {
    let Some(line_no) = reply.line_number.as_u32() else {
        tracing::warn!(line = %reply.line_number, "comment line number is not a line");
        return None;
    };
    let Some((_, side)) = hunk.line_for(line_no) else {
        tracing::warn!(
            path = %diff.file.path.display(),
            line = line_no,
            hunk = %hunk.header(),
            "comment line is outside its hunk"
        );
        return None;
    };
    // Review comments always use the file's path in the PR diff; `side`
    // selects the old content.
    Some(InlineComment {
        path: diff.file.path.clone(),
        line: line_no,
        side,
        body: reply.review_comment,
    })
}

impl fmt::Display for ReviewResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Review Results")?;
        writeln!(f, "==============")?;
        writeln!(
            f,
            "Backend: {} | Files: {} (skipped: {}) | Hunks: {} | Comments: {} (unanchored: {})\n",
            self.stats.backend,
            self.stats.files_reviewed,
            self.stats.files_skipped,
            self.stats.hunks_reviewed,
            self.comments.len(),
            self.stats.comments_unanchored,
        )?;

        if self.comments.is_empty() {
            writeln!(f, "No issues found.")?;
        } else {
            for c in &self.comments {
                writeln!(f, "{}:{} ({})", c.path.display(), c.line, side_label(c.side))?;
                for line in c.body.lines() {
                    writeln!(f, "  {line}")?;
                }
                writeln!(f)?;
            }
        }

        Ok(())
    }
}

impl ReviewResult {
    /// Render the review result as markdown.
    ///
    /// # Examples
    ///
    /// ```
    /// use hunkwise_review::pipeline::{ReviewResult, ReviewStats};
    ///
    /// let result = ReviewResult {
    ///     comments: vec![],
    ///     skipped: vec![],
    ///     stats: ReviewStats::default(),
    /// };
    /// let md = result.to_markdown();
    /// assert!(md.contains("# Review Results"));
    /// ```
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str("# Review Results\n\n");
        out.push_str(&format!(
            "**Backend:** {} | **Files:** {} | **Hunks:** {} | **Comments:** {}\n\n",
            self.stats.backend,
            self.stats.files_reviewed,
            self.stats.hunks_reviewed,
            self.comments.len(),
        ));

        if self.comments.is_empty() {
            out.push_str("No issues found.\n");
        } else {
            for c in &self.comments {
                out.push_str(&format!(
                    "## `{}:{}` ({})\n\n",
                    c.path.display(),
                    c.line,
                    side_label(c.side),
                ));
                out.push_str(&format!("{}\n\n", c.body));
            }
        }

        if !self.skipped.is_empty() {
            out.push_str("<details><summary>Skipped files</summary>\n\n");
            for s in &self.skipped {
                out.push_str(&format!("- `{}`: {}\n", s.path.display(), s.reason));
            }
            out.push_str("\n</details>\n");
        }
        out
    }

    /// One-line summary used as the body of a posted GitHub review.
    pub fn summary(&self) -> String {
        format!(
            "hunkwise reviewed {} file(s) and {} hunk(s) with `{}` and left {} comment(s).",
            self.stats.files_reviewed,
            self.stats.hunks_reviewed,
            self.stats.backend,
            self.comments.len(),
        )
    }
}

fn side_label(side: Side) -> &'static str {
    match side {
        Side::Right => "new",
        Side::Left => "old",
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use super::*;
    use async_trait::async_trait;
    use hunkwise_core::{LineNumber, ReviewedFile};
    use hunkwise_difflens::parser::parse_unified_diff;

    const DIFF: &str = "\
diff --git a/src/lib.rs b/src/lib.rs
--- a/src/lib.rs
+++ b/src/lib.rs
@@ -1,3 +1,3 @@
 fn one() {}
-fn two() {}
+fn two() -> u8 { 2 }
 fn three() {}
@@ -20,2 +20,3 @@ impl Thing {
     fn a(&self) {}
+    fn b(&self) {}
     fn c(&self) {}
diff --git a/Cargo.lock b/Cargo.lock
--- a/Cargo.lock
+++ b/Cargo.lock
@@ -1 +1 @@
-old
+new
";

    /// Backend that replays canned replies, one per hunk.
    struct Scripted {
        replies: Mutex<VecDeque<Result<Vec<ReviewComment>, HunkwiseError>>>,
        prompts: Arc<Mutex<Vec<String>>>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<Vec<ReviewComment>, HunkwiseError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                prompts: Arc::default(),
            }
        }
    }

    #[async_trait]
    impl ReviewService for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        fn create_prompt(
            &self,
            file: &ReviewedFile,
            hunk: &DiffHunk,
            _pr: &PullRequestDetails,
        ) -> String {
            format!("{} {}", file.path.display(), hunk.header())
        }

        async fn get_ai_response(
            &self,
            prompt: &str,
        ) -> Result<Vec<ReviewComment>, HunkwiseError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    fn comment(line: impl Into<LineNumber>, text: &str) -> ReviewComment {
        ReviewComment {
            line_number: line.into(),
            review_comment: text.into(),
        }
    }

    fn pipeline(service: Scripted, config: &ReviewConfig) -> ReviewPipeline {
        ReviewPipeline::new(Box::new(service), config)
    }

    #[tokio::test]
    async fn reviews_every_hunk_and_anchors_comments() {
        let service = Scripted::new(vec![
            Ok(vec![comment(2u32, "Document the return value."), comment(99u32, "stray")]),
            Ok(vec![comment(21u32, "Missing docs.")]),
        ]);
        let pipeline = pipeline(service, &ReviewConfig::default());
        let diffs = parse_unified_diff(DIFF).unwrap();

        let result = pipeline
            .review(diffs, &PullRequestDetails::default())
            .await
            .unwrap();

        assert_eq!(result.stats.backend, "scripted");
        assert_eq!(result.stats.files_reviewed, 1);
        assert_eq!(result.stats.files_skipped, 1);
        assert_eq!(result.stats.hunks_reviewed, 2);
        assert_eq!(result.stats.comments_generated, 3);
        assert_eq!(result.stats.comments_unanchored, 1);
        assert_eq!(result.comments.len(), 2);
        assert_eq!(result.comments[0].line, 2);
        assert_eq!(result.comments[0].side, Side::Right);
        assert_eq!(result.comments[1].path, PathBuf::from("src/lib.rs"));
        assert_eq!(result.skipped[0].path, PathBuf::from("Cargo.lock"));
    }

    #[tokio::test]
    async fn prompts_come_from_the_service_in_diff_order() {
        let service = Scripted::new(vec![]);
        let prompts = Arc::clone(&service.prompts);
        pipeline(service, &ReviewConfig::default())
            .review(parse_unified_diff(DIFF).unwrap(), &PullRequestDetails::default())
            .await
            .unwrap();

        assert_eq!(
            *prompts.lock().unwrap(),
            vec![
                "src/lib.rs @@ -1,3 +1,3 @@".to_string(),
                "src/lib.rs @@ -20,2 +20,3 @@ impl Thing {".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn removed_line_anchors_left() {
        let service = Scripted::new(vec![Ok(vec![comment(2u32, "why")])]);
        let diff = "\
--- a/x.rs
+++ b/x.rs
@@ -1,2 +1,1 @@
 keep
-gone
";
        let result = pipeline(service, &ReviewConfig::default())
            .review(parse_unified_diff(diff).unwrap(), &PullRequestDetails::default())
            .await
            .unwrap();
        assert_eq!(result.comments.len(), 1);
        assert_eq!(result.comments[0].side, Side::Left);
    }

    #[tokio::test]
    async fn removed_line_in_renamed_file_uses_new_path() {
        let service = Scripted::new(vec![Ok(vec![comment(3u32, "removed line")])]);
        let diff = "\
diff --git a/old.rs b/new.rs
similarity index 60%
rename from old.rs
rename to new.rs
--- a/old.rs
+++ b/new.rs
@@ -1,3 +1,1 @@
 a
-b
-c
";
        let result = pipeline(service, &ReviewConfig::default())
            .review(parse_unified_diff(diff).unwrap(), &PullRequestDetails::default())
            .await
            .unwrap();
        assert_eq!(
            result.comments,
            vec![InlineComment {
                path: PathBuf::from("new.rs"),
                line: 3,
                side: Side::Left,
                body: "removed line".into(),
            }]
        );
    }

    #[tokio::test]
    async fn non_numeric_line_is_unanchored() {
        let service = Scripted::new(vec![Ok(vec![comment(LineNumber::Text("two".into()), "x")])]);
        let result = pipeline(service, &ReviewConfig::default())
            .review(parse_unified_diff(DIFF).unwrap(), &PullRequestDetails::default())
            .await
            .unwrap();
        assert!(result.comments.is_empty());
        assert_eq!(result.stats.comments_unanchored, 1);
    }

    #[tokio::test]
    async fn max_comments_truncates() {
        let service = Scripted::new(vec![Ok(vec![
            comment(1u32, "a"),
            comment(2u32, "b"),
            comment(3u32, "c"),
        ])]);
        let config = ReviewConfig {
            max_comments: Some(2),
            ..ReviewConfig::default()
        };
        let result = pipeline(service, &config)
            .review(parse_unified_diff(DIFF).unwrap(), &PullRequestDetails::default())
            .await
            .unwrap();
        assert_eq!(result.comments.len(), 2);
        assert_eq!(result.stats.comments_truncated, 1);
        assert_eq!(result.stats.comments_kept(), 2);
    }

    #[tokio::test]
    async fn backend_error_propagates() {
        let service = Scripted::new(vec![
            Ok(vec![]),
            Err(HunkwiseError::Backend("quota exceeded".into())),
        ]);
        let err = pipeline(service, &ReviewConfig::default())
            .review(parse_unified_diff(DIFF).unwrap(), &PullRequestDetails::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[test]
    fn display_and_markdown_output() {
        let result = ReviewResult {
            comments: vec![InlineComment {
                path: PathBuf::from("src/lib.rs"),
                line: 5,
                side: Side::Right,
                body: "Prefer `?` here.".into(),
            }],
            skipped: vec![SkippedSummary {
                path: PathBuf::from("yarn.lock"),
                reason: "lock file".into(),
            }],
            stats: ReviewStats {
                backend: "openai".into(),
                files_reviewed: 1,
                files_skipped: 1,
                hunks_reviewed: 1,
                comments_generated: 1,
                ..ReviewStats::default()
            },
        };
        let text = format!("{result}");
        assert!(text.contains("src/lib.rs:5 (new)"));
        assert!(text.contains("  Prefer `?` here."));

        let md = result.to_markdown();
        assert!(md.contains("## `src/lib.rs:5` (new)"));
        assert!(md.contains("- `yarn.lock`: lock file"));
        assert!(result.summary().contains("1 comment(s)"));
    }
}
