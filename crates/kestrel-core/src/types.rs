use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::Result;

/// How a file was changed in a diff.
///
/// # Examples
///
/// ```
/// use kestrel_core::FileStatus;
///
/// let status = FileStatus::Added;
/// assert_eq!(format!("{status}"), "added");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    /// File created by this change.
    Added,
    /// Existing file edited in place.
    Modified,
    /// File removed by this change.
    Deleted,
    /// File moved to a new path.
    Renamed,
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileStatus::Added => write!(f, "added"),
            FileStatus::Modified => write!(f, "modified"),
            FileStatus::Deleted => write!(f, "deleted"),
            FileStatus::Renamed => write!(f, "renamed"),
        }
    }
}

/// Classification of a single diff line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineKind {
    /// Unchanged line included for context.
    Context,
    /// Line added by this change.
    Addition,
    /// Line removed by this change.
    Deletion,
}

/// A single line within a hunk, with the diff prefix character stripped.
///
/// # Examples
///
/// ```
/// use kestrel_core::{Line, LineKind};
///
/// let line = Line {
///     kind: LineKind::Addition,
///     content: "let x = 1;".into(),
/// };
/// assert_eq!(line.kind, LineKind::Addition);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Line {
    /// Whether the line is context, an addition, or a deletion.
    pub kind: LineKind,
    /// Line content without the leading `+`/`-`/space.
    pub content: String,
}

/// A contiguous block of changed lines within a file diff.
///
/// Start and count fields default to 1 when the `@@` header is malformed;
/// parsing never fails on a bad header.
///
/// # Examples
///
/// ```
/// use kestrel_core::Hunk;
///
/// let hunk = Hunk::new("@@ -1,3 +1,4 @@".into());
/// assert_eq!(hunk.old_start, 1);
/// assert!(hunk.lines.is_empty());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hunk {
    /// Raw `@@` header text as it appeared in the input.
    pub header: String,
    /// Starting line in the old version.
    pub old_start: u32,
    /// Number of lines in the old version.
    pub old_lines: u32,
    /// Starting line in the new version.
    pub new_start: u32,
    /// Number of lines in the new version.
    pub new_lines: u32,
    /// Classified lines in input order.
    pub lines: Vec<Line>,
}

impl Hunk {
    /// Create a hunk with defaulted ranges (start 1, count 1).
    pub fn new(header: String) -> Self {
        Self {
            header,
            old_start: 1,
            old_lines: 1,
            new_start: 1,
            new_lines: 1,
            lines: Vec::new(),
        }
    }
}

/// A complete diff for a single file, containing zero or more hunks.
///
/// # Examples
///
/// ```
/// use kestrel_core::{FileDiff, FileStatus};
/// use std::path::PathBuf;
///
/// let file = FileDiff::new(PathBuf::from("src/main.rs"));
/// assert_eq!(file.status, FileStatus::Modified);
/// assert_eq!(file.additions, 0);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDiff {
    /// Path in the new version (or the old version for deleted files).
    pub path: PathBuf,
    /// Path in the old version, for renames.
    pub old_path: Option<PathBuf>,
    /// How the file was changed.
    pub status: FileStatus,
    /// Whether the file is binary (no hunks will be present).
    pub is_binary: bool,
    /// Detected language tag; `"unknown"` when the extension is unrecognized.
    pub language: String,
    /// Parsed hunks in input order.
    pub hunks: Vec<Hunk>,
    /// Count of added lines across all hunks.
    pub additions: usize,
    /// Count of deleted lines across all hunks.
    pub deletions: usize,
}

impl FileDiff {
    /// Create an empty file diff with status [`FileStatus::Modified`].
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            old_path: None,
            status: FileStatus::Modified,
            is_binary: false,
            language: String::new(),
            hunks: Vec::new(),
            additions: 0,
            deletions: 0,
        }
    }
}

impl fmt::Display for FileDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} (+{} -{})",
            self.status,
            self.path.display(),
            self.additions,
            self.deletions
        )
    }
}

/// Structured representation of a unified-format text diff.
///
/// Aggregate totals are computed once when parsing completes; the value is
/// immutable after construction and owned by the caller.
///
/// # Examples
///
/// ```
/// use kestrel_core::Diff;
///
/// let diff = Diff::from_files(vec![]);
/// assert!(diff.files.is_empty());
/// assert_eq!(diff.additions, 0);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diff {
    /// File diffs in input order.
    pub files: Vec<FileDiff>,
    /// Total added lines across all files.
    pub additions: usize,
    /// Total deleted lines across all files.
    pub deletions: usize,
}

impl Diff {
    /// Build a diff from parsed files, summing aggregate totals.
    pub fn from_files(files: Vec<FileDiff>) -> Self {
        let additions = files.iter().map(|f| f.additions).sum();
        let deletions = files.iter().map(|f| f.deletions).sum();
        Self {
            files,
            additions,
            deletions,
        }
    }
}

/// Outcome of reviewing one file, produced by a [`FileReviewer`] backend.
///
/// # Examples
///
/// ```
/// use kestrel_core::FileReviewResult;
/// use std::path::PathBuf;
///
/// let result = FileReviewResult {
///     path: PathBuf::from("src/lib.rs"),
///     summary: "2 additions, 1 deletion".into(),
///     comments: vec![],
/// };
/// assert!(result.comments.is_empty());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReviewResult {
    /// File the review applies to.
    pub path: PathBuf,
    /// One-line summary of the review.
    pub summary: String,
    /// Individual review comments, if any.
    pub comments: Vec<String>,
}

/// Capability that produces review feedback for a single file.
///
/// This is the boundary to the AI-backed analysis: the worker pool only sees
/// it as an opaque task body. Cancellation is cooperative, so implementations
/// must poll `cancel` at safe points (e.g. between network calls); the pool
/// cannot preempt a running review.
#[async_trait::async_trait]
pub trait FileReviewer: Send + Sync {
    /// Review `content` (the post-change text of `path`) and return feedback.
    ///
    /// # Errors
    ///
    /// Returns [`crate::KestrelError::Review`] when the backend fails or the
    /// review was cancelled.
    async fn review_file(
        &self,
        cancel: &CancellationToken,
        path: &Path,
        content: &str,
    ) -> Result<FileReviewResult>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diff_totals_sum_per_file_counts() {
        let mut a = FileDiff::new(PathBuf::from("a.rs"));
        a.additions = 2;
        a.deletions = 1;
        let mut b = FileDiff::new(PathBuf::from("b.rs"));
        b.additions = 3;

        let diff = Diff::from_files(vec![a, b]);
        assert_eq!(diff.additions, 5);
        assert_eq!(diff.deletions, 1);
    }

    #[test]
    fn file_status_serializes_lowercase() {
        let json = serde_json::to_string(&FileStatus::Renamed).unwrap();
        assert_eq!(json, "\"renamed\"");
    }

    #[test]
    fn file_diff_display_shows_counts() {
        let mut file = FileDiff::new(PathBuf::from("src/main.rs"));
        file.additions = 4;
        file.deletions = 2;
        assert_eq!(format!("{file}"), "modified src/main.rs (+4 -2)");
    }

    #[test]
    fn hunk_defaults_to_one_based_ranges() {
        let hunk = Hunk::new("@@ garbled @@".into());
        assert_eq!(
            (hunk.old_start, hunk.old_lines, hunk.new_start, hunk.new_lines),
            (1, 1, 1, 1)
        );
    }
}
