//! Pre-review file filtering.
//!
//! Drops lock files, vendored dependencies, oversized changes and files
//! matching the configured exclude globs before any prompt is built.

use std::fmt;
use std::path::{Path, PathBuf};

use hunkwise_core::ReviewConfig;

use crate::parser::FileDiff;

/// Files and patterns to skip before sending hunks to a backend.
///
/// # Examples
///
/// ```
/// use hunkwise_difflens::filter::DiffFilter;
///
/// let filter = DiffFilter::default_filter();
/// assert!(filter.should_skip("package-lock.json"));
/// assert!(!filter.should_skip("src/main.rs"));
/// ```
pub struct DiffFilter {
    exclude: Vec<glob::Pattern>,
    skip_extensions: Vec<String>,
    max_changed_lines: usize,
}

impl DiffFilter {
    /// Create a filter with the built-in rules only.
    pub fn default_filter() -> Self {
        Self::from_config(&ReviewConfig::default())
    }

    /// Create a filter from review configuration.
    ///
    /// Invalid glob patterns are logged and ignored.
    ///
    /// # Examples
    ///
    /// ```
    /// use hunkwise_core::ReviewConfig;
    /// use hunkwise_difflens::filter::DiffFilter;
    ///
    /// let config = ReviewConfig {
    ///     exclude: vec!["docs/**".into()],
    ///     ..ReviewConfig::default()
    /// };
    /// let filter = DiffFilter::from_config(&config);
    /// assert!(filter.should_skip("docs/guide/intro.md"));
    /// ```
    pub fn from_config(config: &ReviewConfig) -> Self {
        let exclude = config
            .exclude
            .iter()
            .flat_map(|raw| raw.split(','))
            .map(str::trim)
            .filter(|pat| !pat.is_empty())
            .filter_map(|pat| match glob::Pattern::new(pat) {
                Ok(p) => Some(p),
                Err(e) => {
                    tracing::warn!(pattern = pat, error = %e, "ignoring invalid exclude pattern");
                    None
                }
            })
            .collect();

        Self {
            exclude,
            skip_extensions: config.skip_extensions.clone(),
            max_changed_lines: config.max_changed_lines,
        }
    }

    /// Check if a single file path should be skipped, ignoring size.
    pub fn should_skip(&self, path: &str) -> bool {
        self.check_skip(Path::new(path), 0).is_some()
    }

    /// Split parsed diffs into reviewable and skipped files.
    ///
    /// # Examples
    ///
    /// ```
    /// use hunkwise_difflens::filter::DiffFilter;
    /// use hunkwise_difflens::parser::parse_unified_diff;
    ///
    /// let diff = "\
    /// diff --git a/src/main.rs b/src/main.rs
    /// --- a/src/main.rs
    /// +++ b/src/main.rs
    /// @@ -1,1 +1,2 @@
    ///  line
    /// +new
    /// ";
    /// let diffs = parse_unified_diff(diff).unwrap();
    /// let result = DiffFilter::default_filter().filter(diffs);
    /// assert_eq!(result.kept.len(), 1);
    /// assert!(result.skipped.is_empty());
    /// ```
    pub fn filter(&self, diffs: Vec<FileDiff>) -> FilterResult {
        let mut kept = Vec::new();
        let mut skipped = Vec::new();

        for diff in diffs {
            match self.check_skip(&diff.file.path, diff.changed_line_count()) {
                Some(reason) => {
                    tracing::debug!(path = %diff.file.path.display(), %reason, "skipping file");
                    skipped.push(SkippedFile {
                        path: diff.file.path.clone(),
                        reason,
                    });
                }
                None if diff.hunks.is_empty() => {
                    skipped.push(SkippedFile {
                        path: diff.file.path.clone(),
                        reason: SkipReason::NoHunks,
                    });
                }
                None => kept.push(diff),
            }
        }

        FilterResult { kept, skipped }
    }

    fn check_skip(&self, path: &Path, changed_lines: usize) -> Option<SkipReason> {
        let path_str = path.to_string_lossy();
        let file_name = path
            .file_name()
            .map(|f| f.to_string_lossy().to_string())
            .unwrap_or_default();

        if LOCK_FILES.contains(&file_name.as_str()) {
            return Some(SkipReason::LockFile);
        }

        if is_vendored(&path_str) {
            return Some(SkipReason::VendoredCode);
        }

        if let Some(pat) = self.exclude.iter().find(|p| p.matches(&path_str)) {
            return Some(SkipReason::Excluded(pat.to_string()));
        }

        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            if self.skip_extensions.iter().any(|s| s == ext) {
                return Some(SkipReason::Excluded(format!("*.{ext}")));
            }
        }

        if changed_lines > self.max_changed_lines {
            return Some(SkipReason::TooLarge(changed_lines));
        }

        None
    }
}

/// Result of filtering diffs.
#[derive(Debug)]
pub struct FilterResult {
    /// Diffs that passed the filter.
    pub kept: Vec<FileDiff>,
    /// Files that were skipped with reasons.
    pub skipped: Vec<SkippedFile>,
}

/// A file that was skipped during filtering.
#[derive(Debug, Clone)]
pub struct SkippedFile {
    /// Path of the skipped file.
    pub path: PathBuf,
    /// Why the file was skipped.
    pub reason: SkipReason,
}

/// Reason a file was skipped.
///
/// # Examples
///
/// ```
/// use hunkwise_difflens::filter::SkipReason;
///
/// assert_eq!(SkipReason::LockFile.to_string(), "lock file");
/// assert_eq!(SkipReason::TooLarge(1200).to_string(), "too large (1200 changed lines)");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Package manager lock file.
    LockFile,
    /// Third-party vendored code.
    VendoredCode,
    /// Matched a configured exclude pattern or extension.
    Excluded(String),
    /// More changed lines than the configured maximum.
    TooLarge(usize),
    /// Nothing to review (pure rename or mode change).
    NoHunks,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::LockFile => write!(f, "lock file"),
            SkipReason::VendoredCode => write!(f, "vendored code"),
            SkipReason::Excluded(pat) => write!(f, "excluded by {pat}"),
            SkipReason::TooLarge(n) => write!(f, "too large ({n} changed lines)"),
            SkipReason::NoHunks => write!(f, "no hunks"),
        }
    }
}

const LOCK_FILES: &[&str] = &[
    "package-lock.json",
    "yarn.lock",
    "Cargo.lock",
    "pnpm-lock.yaml",
    "poetry.lock",
    "Gemfile.lock",
    "composer.lock",
    "go.sum",
];

fn is_vendored(path: &str) -> bool {
    path.split('/')
        .any(|part| matches!(part, "vendor" | "third_party" | "node_modules"))
}
