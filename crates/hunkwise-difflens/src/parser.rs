use std::fmt;
use std::path::PathBuf;

use hunkwise_core::{DiffHunk, DiffLine, HunkwiseError, LineKind, PatchType, ReviewedFile};
use serde::Serialize;

/// A complete diff for a single file, containing one or more hunks.
///
/// # Examples
///
/// ```
/// use hunkwise_difflens::parser::parse_unified_diff;
///
/// let diff = "\
/// diff --git a/hello.rs b/hello.rs
/// --- a/hello.rs
/// +++ b/hello.rs
/// @@ -1,2 +1,3 @@
///  fn main() {
/// +    println!(\"hello\");
///  }
/// ";
/// let files = parse_unified_diff(diff).unwrap();
/// assert_eq!(files.len(), 1);
/// assert_eq!(files[0].hunks[0].lines[1].target_line_no, Some(2));
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDiff {
    /// File metadata handed to the review backend.
    pub file: ReviewedFile,
    /// Parsed hunks for this file.
    pub hunks: Vec<DiffHunk>,
}

impl FileDiff {
    /// Number of added plus removed lines across all hunks.
    pub fn changed_line_count(&self) -> usize {
        self.hunks.iter().map(DiffHunk::changed_line_count).sum()
    }
}

impl fmt::Display for FileDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}, {} hunks)",
            self.file.path.display(),
            self.file.patch_type,
            self.hunks.len()
        )
    }
}

struct PendingFile {
    old_path: PathBuf,
    new_path: PathBuf,
    is_new: bool,
    is_deleted: bool,
    is_rename: bool,
    is_binary: bool,
    hunks: Vec<DiffHunk>,
}

impl PendingFile {
    fn new() -> Self {
        Self {
            old_path: PathBuf::new(),
            new_path: PathBuf::new(),
            is_new: false,
            is_deleted: false,
            is_rename: false,
            is_binary: false,
            hunks: Vec::new(),
        }
    }

    fn finish(self) -> Option<FileDiff> {
        if self.is_binary {
            return None;
        }
        let patch_type = if self.is_new {
            PatchType::Added
        } else if self.is_deleted {
            PatchType::Removed
        } else if self.is_rename {
            PatchType::Renamed
        } else {
            PatchType::Modified
        };
        let path = if self.is_deleted {
            self.old_path.clone()
        } else {
            self.new_path.clone()
        };
        Some(FileDiff {
            file: ReviewedFile {
                path,
                source_path: self.old_path,
                patch_type,
            },
            hunks: self.hunks,
        })
    }
}

/// Line counters for the hunk being filled.
struct Cursor {
    source: u32,
    target: u32,
}

/// Parse a unified diff string (as produced by `git diff`) into structured [`FileDiff`] entries.
///
/// Every hunk line carries its old and/or new line number. Binary files
/// are skipped; patches without `diff --git` headers are accepted.
///
/// # Errors
///
/// Returns [`HunkwiseError::Parse`] if a hunk header is malformed.
///
/// # Examples
///
/// ```
/// use hunkwise_difflens::parser::parse_unified_diff;
///
/// let files = parse_unified_diff("").unwrap();
/// assert!(files.is_empty());
/// ```
pub fn parse_unified_diff(input: &str) -> Result<Vec<FileDiff>, HunkwiseError> {
    let mut files: Vec<FileDiff> = Vec::new();
    let mut current: Option<PendingFile> = None;
    let mut cursor: Option<Cursor> = None;

    for line in input.lines() {
        if line.starts_with("diff --git ") {
            if let Some(file) = current.take().and_then(PendingFile::finish) {
                files.push(file);
            }
            cursor = None;
            let mut pending = PendingFile::new();
            if let Some((old, new)) = parse_git_header(line) {
                pending.old_path = old;
                pending.new_path = new;
            }
            current = Some(pending);
            continue;
        }

        // A `---` outside a hunk starts a new file for patches that lack
        // `diff --git` lines.
        if line.starts_with("--- ") && cursor.is_none() {
            let starts_new = current.as_ref().map_or(true, |f| !f.hunks.is_empty());
            if starts_new {
                if let Some(file) = current.take().and_then(PendingFile::finish) {
                    files.push(file);
                }
                current = Some(PendingFile::new());
            }
        }

        let Some(file) = current.as_mut() else {
            continue;
        };

        if line.starts_with("@@ ") {
            let hunk = parse_hunk_header(line)?;
            cursor = Some(Cursor {
                source: hunk.source_start,
                target: hunk.target_start,
            });
            file.hunks.push(hunk);
            continue;
        }

        if let (Some(pos), Some(hunk)) = (cursor.as_mut(), file.hunks.last_mut()) {
            if line == "\\ No newline at end of file" {
                continue;
            }
            let parsed = if let Some(content) = line.strip_prefix('+') {
                let l = DiffLine {
                    kind: LineKind::Added,
                    content: content.to_string(),
                    source_line_no: None,
                    target_line_no: Some(pos.target),
                };
                pos.target += 1;
                Some(l)
            } else if let Some(content) = line.strip_prefix('-') {
                let l = DiffLine {
                    kind: LineKind::Removed,
                    content: content.to_string(),
                    source_line_no: Some(pos.source),
                    target_line_no: None,
                };
                pos.source += 1;
                Some(l)
            } else if let Some(content) = line.strip_prefix(' ') {
                let l = DiffLine {
                    kind: LineKind::Context,
                    content: content.to_string(),
                    source_line_no: Some(pos.source),
                    target_line_no: Some(pos.target),
                };
                pos.source += 1;
                pos.target += 1;
                Some(l)
            } else if line.is_empty() {
                // Some tools strip the trailing space of blank context lines
                let l = DiffLine {
                    kind: LineKind::Context,
                    content: String::new(),
                    source_line_no: Some(pos.source),
                    target_line_no: Some(pos.target),
                };
                pos.source += 1;
                pos.target += 1;
                Some(l)
            } else {
                None
            };

            match parsed {
                Some(l) => {
                    hunk.lines.push(l);
                    if hunk_is_complete(hunk, pos) {
                        cursor = None;
                    }
                    continue;
                }
                None => cursor = None,
            }
        }

        if line.starts_with("Binary files ") && line.ends_with(" differ") {
            file.is_binary = true;
        } else if line.starts_with("new file mode") {
            file.is_new = true;
        } else if line.starts_with("deleted file mode") {
            file.is_deleted = true;
        } else if let Some(path) = line.strip_prefix("rename from ") {
            file.is_rename = true;
            file.old_path = PathBuf::from(path);
        } else if let Some(path) = line.strip_prefix("rename to ") {
            file.is_rename = true;
            file.new_path = PathBuf::from(path);
        } else if let Some(path) = line.strip_prefix("--- ") {
            file.old_path = parse_path(path);
            if file.old_path.as_os_str() == "/dev/null" {
                file.is_new = true;
            }
        } else if let Some(path) = line.strip_prefix("+++ ") {
            file.new_path = parse_path(path);
            if file.new_path.as_os_str() == "/dev/null" {
                file.is_deleted = true;
            }
        }
    }

    if let Some(file) = current.take().and_then(PendingFile::finish) {
        files.push(file);
    }

    Ok(files)
}

fn hunk_is_complete(hunk: &DiffHunk, pos: &Cursor) -> bool {
    pos.source >= hunk.source_start + hunk.source_length
        && pos.target >= hunk.target_start + hunk.target_length
}

fn parse_git_header(line: &str) -> Option<(PathBuf, PathBuf)> {
    let rest = line.strip_prefix("diff --git ")?;
    let (old, new) = rest.split_once(" b/")?;
    Some((parse_path(old), PathBuf::from(new)))
}

fn parse_path(raw: &str) -> PathBuf {
    // Drop a trailing timestamp as emitted by `diff -u`
    let raw = raw.split('\t').next().unwrap_or(raw);
    let normalized = raw.trim_matches('"');

    if normalized == "/dev/null" {
        return PathBuf::from("/dev/null");
    }

    let stripped = normalized
        .strip_prefix("a/")
        .or_else(|| normalized.strip_prefix("b/"))
        .unwrap_or(normalized);

    PathBuf::from(stripped)
}

fn parse_hunk_header(line: &str) -> Result<DiffHunk, HunkwiseError> {
    let invalid = || HunkwiseError::Parse(format!("invalid hunk header: {line}"));

    let rest = line.strip_prefix("@@ ").ok_or_else(invalid)?;
    let end = rest.find(" @@").ok_or_else(invalid)?;
    let ranges = &rest[..end];
    let section_header = rest[end + 3..].trim().to_string();

    let Some((old, new)) = ranges.split_once(' ') else {
        return Err(invalid());
    };
    let old = old
        .strip_prefix('-')
        .ok_or_else(|| HunkwiseError::Parse(format!("invalid old range in hunk: {line}")))?;
    let new = new
        .strip_prefix('+')
        .ok_or_else(|| HunkwiseError::Parse(format!("invalid new range in hunk: {line}")))?;

    let (source_start, source_length) = parse_range(old, line)?;
    let (target_start, target_length) = parse_range(new, line)?;

    Ok(DiffHunk {
        source_start,
        source_length,
        target_start,
        target_length,
        section_header,
        lines: Vec::new(),
    })
}

fn parse_range(range: &str, context: &str) -> Result<(u32, u32), HunkwiseError> {
    let number = |s: &str| {
        s.parse::<u32>()
            .map_err(|_| HunkwiseError::Parse(format!("invalid range number in: {context}")))
    };
    match range.split_once(',') {
        Some((start, count)) => Ok((number(start)?, number(count)?)),
        None => Ok((number(range)?, 1)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_diff_returns_empty_vec() {
        let files = parse_unified_diff("").unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn single_hunk_tracks_line_numbers() {
        let diff = "\
diff --git a/src/main.rs b/src/main.rs
index abc1234..def5678 100644
--- a/src/main.rs
+++ b/src/main.rs
@@ -10,5 +10,5 @@ fn main() {
     let x = 1;
-    let y = 2;
+    let y = 3;
+    let z = 4;
     run(x, y);
-    done();
 }
";
        let files = parse_unified_diff(diff).unwrap();
        assert_eq!(files.len(), 1);
        let file = &files[0];
        assert_eq!(file.file.path, PathBuf::from("src/main.rs"));
        assert_eq!(file.file.patch_type, PatchType::Modified);

        let hunk = &file.hunks[0];
        assert_eq!(hunk.section_header, "fn main() {");
        assert_eq!(hunk.lines.len(), 7);

        let numbers: Vec<(Option<u32>, Option<u32>)> = hunk
            .lines
            .iter()
            .map(|l| (l.source_line_no, l.target_line_no))
            .collect();
        assert_eq!(
            numbers,
            vec![
                (Some(10), Some(10)),
                (Some(11), None),
                (None, Some(11)),
                (None, Some(12)),
                (Some(12), Some(13)),
                (Some(13), None),
                (Some(14), Some(14)),
            ]
        );
        assert_eq!(hunk.lines[2].content, "    let y = 3;");
    }

    #[test]
    fn single_file_multiple_hunks() {
        let diff = "\
diff --git a/lib.rs b/lib.rs
--- a/lib.rs
+++ b/lib.rs
@@ -1,2 +1,3 @@
 fn foo() {
+    bar();
 }
@@ -10,2 +11,3 @@
 fn baz() {
+    qux();
 }
";
        let files = parse_unified_diff(diff).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].hunks.len(), 2);
        assert_eq!(files[0].hunks[1].source_start, 10);
        assert_eq!(files[0].hunks[1].lines[1].target_line_no, Some(12));
    }

    #[test]
    fn multiple_files() {
        let diff = "\
diff --git a/a.rs b/a.rs
--- a/a.rs
+++ b/a.rs
@@ -1 +1,2 @@
 line1
+line2
diff --git a/b.rs b/b.rs
--- a/b.rs
+++ b/b.rs
@@ -1 +1,2 @@
 line1
+line2
";
        let files = parse_unified_diff(diff).unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].file.path, PathBuf::from("a.rs"));
        assert_eq!(files[1].file.path, PathBuf::from("b.rs"));
    }

    #[test]
    fn new_file() {
        let diff = "\
diff --git a/new.rs b/new.rs
new file mode 100644
--- /dev/null
+++ b/new.rs
@@ -0,0 +1,3 @@
+fn hello() {
+    println!(\"new\");
+}
";
        let files = parse_unified_diff(diff).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].file.patch_type, PatchType::Added);
        assert_eq!(files[0].file.source_path, PathBuf::from("/dev/null"));
        assert_eq!(files[0].file.path, PathBuf::from("new.rs"));
        assert_eq!(files[0].hunks[0].lines[2].target_line_no, Some(3));
    }

    #[test]
    fn deleted_file_uses_old_path() {
        let diff = "\
diff --git a/old.rs b/old.rs
deleted file mode 100644
--- a/old.rs
+++ /dev/null
@@ -1,2 +0,0 @@
-fn goodbye() {
-}
";
        let files = parse_unified_diff(diff).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].file.patch_type, PatchType::Removed);
        assert_eq!(files[0].file.path, PathBuf::from("old.rs"));
        assert_eq!(files[0].hunks[0].lines[1].source_line_no, Some(2));
    }

    #[test]
    fn renamed_file_without_hunks() {
        let diff = "\
diff --git a/old_name.rs b/new_name.rs
similarity index 100%
rename from old_name.rs
rename to new_name.rs
";
        let files = parse_unified_diff(diff).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].file.patch_type, PatchType::Renamed);
        assert_eq!(files[0].file.source_path, PathBuf::from("old_name.rs"));
        assert_eq!(files[0].file.path, PathBuf::from("new_name.rs"));
        assert!(files[0].hunks.is_empty());
    }

    #[test]
    fn binary_files_skipped() {
        let diff = "\
diff --git a/image.png b/image.png
Binary files a/image.png and b/image.png differ
diff --git a/code.rs b/code.rs
--- a/code.rs
+++ b/code.rs
@@ -1 +1,2 @@
 line1
+line2
";
        let files = parse_unified_diff(diff).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].file.path, PathBuf::from("code.rs"));
    }

    #[test]
    fn no_newline_marker_is_ignored() {
        let diff = "\
diff --git a/f.rs b/f.rs
--- a/f.rs
+++ b/f.rs
@@ -1 +1 @@
-old
\\ No newline at end of file
+new
\\ No newline at end of file
";
        let files = parse_unified_diff(diff).unwrap();
        let hunk = &files[0].hunks[0];
        assert_eq!(hunk.lines.len(), 2);
        assert_eq!(hunk.lines[0].kind, LineKind::Removed);
        assert_eq!(hunk.lines[1].kind, LineKind::Added);
    }

    #[test]
    fn removed_line_looking_like_header_stays_in_hunk() {
        let diff = "\
--- a/notes.txt
+++ b/notes.txt
@@ -1,2 +1,1 @@
--- heading
 body
";
        let files = parse_unified_diff(diff).unwrap();
        assert_eq!(files.len(), 1);
        let hunk = &files[0].hunks[0];
        assert_eq!(hunk.lines[0].kind, LineKind::Removed);
        assert_eq!(hunk.lines[0].content, "-- heading");
        assert_eq!(files[0].file.path, PathBuf::from("notes.txt"));
    }

    #[test]
    fn malformed_hunk_header_is_error() {
        let diff = "\
--- a/x.rs
+++ b/x.rs
@@ -a,b +c,d @@
";
        assert!(matches!(
            parse_unified_diff(diff),
            Err(HunkwiseError::Parse(_))
        ));
    }

    #[test]
    fn parse_path_handles_quoted_and_timestamped_paths() {
        assert_eq!(
            parse_path("\"a/src/my file.rs\""),
            PathBuf::from("src/my file.rs")
        );
        assert_eq!(
            parse_path("b/src/lib.rs\t2024-01-01 00:00:00"),
            PathBuf::from("src/lib.rs")
        );
    }

    #[test]
    fn real_world_fixture() {
        let diff = include_str!("../tests/fixtures/simple.diff");
        let files = parse_unified_diff(diff).unwrap();
        assert_eq!(files.len(), 2);
        for file in &files {
            assert!(!file.hunks.is_empty());
            for hunk in &file.hunks {
                let targets = hunk
                    .lines
                    .iter()
                    .filter(|l| l.target_line_no.is_some())
                    .count() as u32;
                assert_eq!(targets, hunk.target_length);
            }
        }
    }
}
