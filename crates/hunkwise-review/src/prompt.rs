use std::fmt::Write;

use hunkwise_core::{DiffHunk, PullRequestDetails, ReviewedFile};

/// Response contract shared by every backend.
pub const RESPONSE_FORMAT: &str =
    r#"{"reviews": [{"lineNumber": <line_number>, "reviewComment": "<review comment>"}]}"#;

/// Default review instructions.
pub const DEFAULT_INSTRUCTIONS: &str = "\
Your task is to review pull requests. Instructions:
- Provide the response in the following JSON format: {\"reviews\": [{\"lineNumber\": <line_number>, \"reviewComment\": \"<review comment>\"}]}
- Do not give positive comments or compliments.
- Provide comments and suggestions ONLY if there is something to improve, otherwise \"reviews\" should be an empty array.
- Use the line numbers shown at the start of each diff line for \"lineNumber\".
- Write the comment in GitHub Markdown format.
- Use the given description only for the overall context and only comment the code.
- IMPORTANT: NEVER suggest adding comments to the code.";

const NO_DESCRIPTION: &str = "No description provided";

/// Build the prompt for one hunk.
///
/// Embeds `instructions`, the file path, the pull request title and
/// description, and the hunk as a fenced `diff` block. Each hunk line is
/// prefixed with the number a comment should cite: the new-side number, or
/// the old-side number for removed lines.
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use hunkwise_core::{DiffHunk, DiffLine, LineKind, PatchType, PullRequestDetails, ReviewedFile};
/// use hunkwise_review::prompt::{build_hunk_prompt, DEFAULT_INSTRUCTIONS};
///
/// let file = ReviewedFile {
///     path: PathBuf::from("src/db.rs"),
///     source_path: PathBuf::from("src/db.rs"),
///     patch_type: PatchType::Modified,
/// };
/// let hunk = DiffHunk {
///     source_start: 4,
///     source_length: 0,
///     target_start: 5,
///     target_length: 1,
///     section_header: String::new(),
///     lines: vec![DiffLine {
///         kind: LineKind::Added,
///         content: "conn.execute(&query)?;".into(),
///         source_line_no: None,
///         target_line_no: Some(5),
///     }],
/// };
/// let pr = PullRequestDetails { title: "Add query".into(), ..Default::default() };
///
/// let prompt = build_hunk_prompt(DEFAULT_INSTRUCTIONS, &file, &hunk, &pr);
/// assert!(prompt.contains("src/db.rs"));
/// assert!(prompt.contains("5 +conn.execute(&query)?;"));
/// assert!(prompt.contains("No description provided"));
/// ```
pub fn build_hunk_prompt(
    instructions: &str,
    file: &ReviewedFile,
    hunk: &DiffHunk,
    pr: &PullRequestDetails,
) -> String {
    let description = pr
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .unwrap_or(NO_DESCRIPTION);

    let mut prompt = String::new();
    let _ = writeln!(prompt, "{instructions}");
    prompt.push('\n');
    let _ = writeln!(
        prompt,
        "Review the following code diff in the file \"{}\" ({}) and take the pull request title and description into account when writing the response.",
        file.path.display(),
        file.patch_type,
    );
    prompt.push('\n');
    let _ = writeln!(prompt, "Pull request title: {}", pr.title);
    let _ = writeln!(prompt, "Pull request description:");
    prompt.push('\n');
    let _ = writeln!(prompt, "---");
    let _ = writeln!(prompt, "{description}");
    let _ = writeln!(prompt, "---");
    prompt.push('\n');
    let _ = writeln!(prompt, "Git diff to review:");
    prompt.push('\n');
    let _ = writeln!(prompt, "```diff");
    prompt.push_str(&annotate_hunk(hunk));
    let _ = writeln!(prompt, "```");
    prompt
}

/// Render a hunk with the citeable line number in front of every line.
///
/// # Examples
///
/// ```
/// use hunkwise_core::{DiffHunk, DiffLine, LineKind};
/// use hunkwise_review::prompt::annotate_hunk;
///
/// let hunk = DiffHunk {
///     source_start: 8,
///     source_length: 1,
///     target_start: 8,
///     target_length: 0,
///     section_header: String::new(),
///     lines: vec![DiffLine {
///         kind: LineKind::Removed,
///         content: "legacy();".into(),
///         source_line_no: Some(8),
///         target_line_no: None,
///     }],
/// };
/// assert_eq!(annotate_hunk(&hunk), "@@ -8,1 +8,0 @@\n8 -legacy();\n");
/// ```
pub fn annotate_hunk(hunk: &DiffHunk) -> String {
    let mut text = hunk.header();
    text.push('\n');
    for line in &hunk.lines {
        match line.display_line_no() {
            Some(n) => {
                let _ = writeln!(text, "{n} {line}");
            }
            None => {
                let _ = writeln!(text, "{line}");
            }
        }
    }
    text
}
