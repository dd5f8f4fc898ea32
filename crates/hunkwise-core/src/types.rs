use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kind of a single line inside a diff hunk.
///
/// # Examples
///
/// ```
/// use hunkwise_core::LineKind;
///
/// assert_eq!(LineKind::Added.prefix(), '+');
/// assert_eq!(LineKind::Context.prefix(), ' ');
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineKind {
    /// Line present only in the new version.
    Added,
    /// Line present only in the old version.
    Removed,
    /// Unchanged line shown for context.
    Context,
}

impl LineKind {
    /// The unified-diff marker character for this kind.
    pub fn prefix(self) -> char {
        match self {
            LineKind::Added => '+',
            LineKind::Removed => '-',
            LineKind::Context => ' ',
        }
    }
}

/// One line of a hunk with its old and new line numbers.
///
/// Added lines carry only a target number, removed lines only a source
/// number, context lines both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffLine {
    /// Whether the line was added, removed, or is context.
    pub kind: LineKind,
    /// Line text without the leading marker.
    pub content: String,
    /// Line number in the old version of the file.
    pub source_line_no: Option<u32>,
    /// Line number in the new version of the file.
    pub target_line_no: Option<u32>,
}

impl DiffLine {
    /// The number a reviewer would cite for this line: the new-side number,
    /// or the old-side number for removed lines.
    ///
    /// # Examples
    ///
    /// ```
    /// use hunkwise_core::{DiffLine, LineKind};
    ///
    /// let removed = DiffLine {
    ///     kind: LineKind::Removed,
    ///     content: "old".into(),
    ///     source_line_no: Some(7),
    ///     target_line_no: None,
    /// };
    /// assert_eq!(removed.display_line_no(), Some(7));
    /// ```
    pub fn display_line_no(&self) -> Option<u32> {
        self.target_line_no.or(self.source_line_no)
    }
}

impl fmt::Display for DiffLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind.prefix(), self.content)
    }
}

/// Which side of the diff an inline comment is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    /// The old version (removed lines).
    Left,
    /// The new version (added and context lines).
    Right,
}

/// A contiguous block of changed lines within a file.
///
/// # Examples
///
/// ```
/// use hunkwise_core::{DiffHunk, DiffLine, LineKind};
///
/// let hunk = DiffHunk {
///     source_start: 10,
///     source_length: 1,
///     target_start: 10,
///     target_length: 2,
///     section_header: String::new(),
///     lines: vec![
///         DiffLine {
///             kind: LineKind::Context,
///             content: "fn main() {".into(),
///             source_line_no: Some(10),
///             target_line_no: Some(10),
///         },
///         DiffLine {
///             kind: LineKind::Added,
///             content: "    run();".into(),
///             source_line_no: None,
///             target_line_no: Some(11),
///         },
///     ],
/// };
/// assert_eq!(hunk.header(), "@@ -10,1 +10,2 @@");
/// assert_eq!(hunk.changed_line_count(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffHunk {
    /// First line of the hunk in the old version.
    pub source_start: u32,
    /// Number of old-version lines covered.
    pub source_length: u32,
    /// First line of the hunk in the new version.
    pub target_start: u32,
    /// Number of new-version lines covered.
    pub target_length: u32,
    /// Trailing text after the closing `@@`, usually the enclosing function.
    pub section_header: String,
    /// Lines of the hunk in diff order.
    pub lines: Vec<DiffLine>,
}

impl DiffHunk {
    /// Render the `@@ -a,b +c,d @@` header line.
    pub fn header(&self) -> String {
        let mut header = format!(
            "@@ -{},{} +{},{} @@",
            self.source_start, self.source_length, self.target_start, self.target_length
        );
        if !self.section_header.is_empty() {
            header.push(' ');
            header.push_str(&self.section_header);
        }
        header
    }

    /// Render the hunk back to unified-diff text, header included.
    pub fn to_diff_text(&self) -> String {
        let mut text = self.header();
        text.push('\n');
        for line in &self.lines {
            text.push_str(&line.to_string());
            text.push('\n');
        }
        text
    }

    /// Number of added plus removed lines.
    pub fn changed_line_count(&self) -> usize {
        self.lines
            .iter()
            .filter(|l| l.kind != LineKind::Context)
            .count()
    }

    /// Resolve a file line number to the hunk line it refers to.
    ///
    /// New-side numbers win; a number only present on the old side resolves
    /// to [`Side::Left`].
    ///
    /// # Examples
    ///
    /// ```
    /// use hunkwise_core::{DiffHunk, DiffLine, LineKind, Side};
    ///
    /// let hunk = DiffHunk {
    ///     source_start: 3,
    ///     source_length: 1,
    ///     target_start: 3,
    ///     target_length: 1,
    ///     section_header: String::new(),
    ///     lines: vec![
    ///         DiffLine { kind: LineKind::Removed, content: "a".into(), source_line_no: Some(3), target_line_no: None },
    ///         DiffLine { kind: LineKind::Added, content: "b".into(), source_line_no: None, target_line_no: Some(3) },
    ///     ],
    /// };
    /// let (line, side) = hunk.line_for(3).unwrap();
    /// assert_eq!(line.content, "b");
    /// assert_eq!(side, Side::Right);
    /// assert!(hunk.line_for(9).is_none());
    /// ```
    pub fn line_for(&self, line_no: u32) -> Option<(&DiffLine, Side)> {
        if let Some(line) = self
            .lines
            .iter()
            .find(|l| l.target_line_no == Some(line_no))
        {
            return Some((line, Side::Right));
        }
        self.lines
            .iter()
            .find(|l| l.source_line_no == Some(line_no))
            .map(|line| (line, Side::Left))
    }
}

/// How a file changed in the patch.
///
/// # Examples
///
/// ```
/// use hunkwise_core::PatchType;
///
/// assert_eq!(PatchType::Renamed.to_string(), "renamed");
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchType {
    /// Newly created file.
    Added,
    /// Existing file edited in place.
    #[default]
    Modified,
    /// File deleted.
    Removed,
    /// File moved, possibly with edits.
    Renamed,
}

impl fmt::Display for PatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchType::Added => write!(f, "added"),
            PatchType::Modified => write!(f, "modified"),
            PatchType::Removed => write!(f, "removed"),
            PatchType::Renamed => write!(f, "renamed"),
        }
    }
}

/// The file a hunk belongs to.
///
/// # Examples
///
/// ```
/// use hunkwise_core::{PatchType, ReviewedFile};
/// use std::path::PathBuf;
///
/// let file = ReviewedFile {
///     path: PathBuf::from("src/lib.rs"),
///     source_path: PathBuf::from("src/lib.rs"),
///     patch_type: PatchType::Modified,
/// };
/// assert_eq!(file.path.to_string_lossy(), "src/lib.rs");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewedFile {
    /// Path in the new version (old path for deleted files).
    pub path: PathBuf,
    /// Path in the old version.
    pub source_path: PathBuf,
    /// How the file changed.
    pub patch_type: PatchType,
}

/// Pull request context handed to the model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestDetails {
    /// Repository owner (user or organisation).
    pub owner: String,
    /// Repository name.
    pub repo: String,
    /// Pull request number, `0` when reviewing a local diff.
    pub pull_number: u64,
    /// Pull request title.
    pub title: String,
    /// Pull request body, if any.
    pub description: Option<String>,
}

/// Line reference as returned by a model: a JSON number or a string.
///
/// # Examples
///
/// ```
/// use hunkwise_core::LineNumber;
///
/// let n: LineNumber = serde_json::from_str("\"42\"").unwrap();
/// assert_eq!(n.as_u32(), Some(42));
///
/// let n: LineNumber = serde_json::from_str("7").unwrap();
/// assert_eq!(n.as_u32(), Some(7));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LineNumber {
    /// A JSON number.
    Number(serde_json::Number),
    /// A JSON string, normally holding digits.
    Text(String),
}

impl LineNumber {
    /// Whether the value counts as present: non-zero numbers and non-empty
    /// strings.
    ///
    /// # Examples
    ///
    /// ```
    /// use hunkwise_core::LineNumber;
    ///
    /// assert!(LineNumber::from(3).is_truthy());
    /// assert!(!LineNumber::from(0).is_truthy());
    /// assert!(!LineNumber::Text(String::new()).is_truthy());
    /// ```
    pub fn is_truthy(&self) -> bool {
        match self {
            LineNumber::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
            LineNumber::Text(s) => !s.is_empty(),
        }
    }

    /// Interpret the value as a file line number.
    ///
    /// Accepts non-negative integers, integral floats and strings holding
    /// an integer. Anything else yields `None`.
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            LineNumber::Number(n) => {
                if let Some(u) = n.as_u64() {
                    return u32::try_from(u).ok();
                }
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= f64::from(u32::MAX))
                    .map(|f| f as u32)
            }
            LineNumber::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl From<u32> for LineNumber {
    fn from(n: u32) -> Self {
        LineNumber::Number(n.into())
    }
}

impl fmt::Display for LineNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineNumber::Number(n) => write!(f, "{n}"),
            LineNumber::Text(s) => write!(f, "{s}"),
        }
    }
}

/// A single comment returned by a review backend, anchored to a line of
/// the hunk it was produced for.
///
/// Serialises with the same keys the model is asked to produce.
///
/// # Examples
///
/// ```
/// use hunkwise_core::ReviewComment;
///
/// let comment = ReviewComment {
///     line_number: 42.into(),
///     review_comment: "Consider renaming this variable.".into(),
/// };
/// let json = serde_json::to_value(&comment).unwrap();
/// assert_eq!(json["lineNumber"], 42);
/// assert_eq!(json["reviewComment"], "Consider renaming this variable.");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewComment {
    /// Target line within the hunk.
    pub line_number: LineNumber,
    /// Comment body, usually GitHub Markdown.
    pub review_comment: String,
}

/// A review comment resolved to a concrete file position, ready to post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineComment {
    /// File the comment belongs to.
    pub path: PathBuf,
    /// Line number on `side`.
    pub line: u32,
    /// Diff side the line number refers to.
    pub side: Side,
    /// Comment body.
    pub body: String,
}

/// Output format for CLI subcommands.
///
/// Implements [`FromStr`] so it can be used directly with `clap` argument parsing.
///
/// # Examples
///
/// ```
/// use hunkwise_core::OutputFormat;
///
/// let fmt: OutputFormat = "json".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Json);
///
/// let fmt: OutputFormat = "md".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Markdown);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable summaries.
    #[default]
    Text,
    /// Machine-readable JSON with camelCase keys.
    Json,
    /// Markdown-formatted output.
    Markdown,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}
