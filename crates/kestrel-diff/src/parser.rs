use std::path::PathBuf;

use kestrel_core::{Diff, FileDiff, FileStatus, Hunk, Line, LineKind};

use crate::language::detect_language;

/// Parse unified-diff text (as produced by `git diff`) into a [`Diff`] tree.
///
/// The parser is deliberately permissive and has no failure mode:
/// unparseable fragments are skipped, malformed `@@` headers degrade to
/// defaulted ranges, and empty or whitespace-only input yields a diff with
/// zero files. A single forward pass over `input.lines()` keeps memory
/// bounded for multi-megabyte diffs.
///
/// # Examples
///
/// ```
/// use kestrel_diff::parse;
///
/// let diff = parse("diff --git a/hello.rs b/hello.rs\n\
///                   --- a/hello.rs\n\
///                   +++ b/hello.rs\n\
///                   @@ -1,3 +1,4 @@\n\
///                    fn main() {\n\
///                   +    println!(\"hello\");\n\
///                    }\n");
/// assert_eq!(diff.files.len(), 1);
/// assert_eq!(diff.files[0].additions, 1);
/// ```
pub fn parse(input: &str) -> Diff {
    let mut files: Vec<FileDiff> = Vec::new();
    let mut current: Option<FileDiff> = None;
    let mut current_hunk: Option<Hunk> = None;

    for line in input.lines() {
        if let Some(rest) = line.strip_prefix("diff --git ") {
            flush_hunk(&mut current, &mut current_hunk);
            flush_file(&mut files, &mut current);
            current = Some(open_file(rest));
            continue;
        }

        let Some(file) = current.as_mut() else {
            continue;
        };

        if line.starts_with("Binary files ") {
            file.is_binary = true;
            continue;
        }

        if line.starts_with("new file") {
            file.status = FileStatus::Added;
            continue;
        }

        if line.starts_with("deleted file") {
            file.status = FileStatus::Deleted;
            continue;
        }

        if let Some(old) = line.strip_prefix("rename from ") {
            file.status = FileStatus::Renamed;
            file.old_path = Some(PathBuf::from(old));
            continue;
        }

        if line.starts_with("rename to ") {
            file.status = FileStatus::Renamed;
            continue;
        }

        if line.starts_with("@@") {
            flush_hunk(&mut current, &mut current_hunk);
            current_hunk = Some(open_hunk(line));
            continue;
        }

        // Body lines are classified by their first character, but only while
        // a hunk is open; header noise (---/+++/index) lands here with no
        // hunk open and is discarded.
        let (Some(file), Some(hunk)) = (current.as_mut(), current_hunk.as_mut()) else {
            continue;
        };

        if let Some(content) = line.strip_prefix('+') {
            file.additions += 1;
            hunk.lines.push(Line {
                kind: LineKind::Addition,
                content: content.to_string(),
            });
        } else if let Some(content) = line.strip_prefix('-') {
            file.deletions += 1;
            hunk.lines.push(Line {
                kind: LineKind::Deletion,
                content: content.to_string(),
            });
        } else if let Some(content) = line.strip_prefix(' ') {
            hunk.lines.push(Line {
                kind: LineKind::Context,
                content: content.to_string(),
            });
        }
        // '\' (no-newline marker) and anything else: discarded.
    }

    flush_hunk(&mut current, &mut current_hunk);
    flush_file(&mut files, &mut current);

    Diff::from_files(files)
}

fn open_file(header_rest: &str) -> FileDiff {
    // "a/<old> b/<new>" — locate the literal " b/" separator instead of
    // splitting on whitespace so paths containing spaces survive.
    let path = match header_rest.find(" b/") {
        Some(idx) => PathBuf::from(&header_rest[idx + 3..]),
        None => PathBuf::from(header_rest.trim()),
    };
    let mut file = FileDiff::new(path);
    file.language = detect_language(&file.path).to_string();
    file
}

fn open_hunk(line: &str) -> Hunk {
    let mut hunk = Hunk::new(line.to_string());

    // "@@ -oldStart[,oldCount] +newStart[,newCount] @@ ..." — anything that
    // fails to parse leaves the defaulted 1s in place.
    let Some(inner) = line
        .strip_prefix("@@ ")
        .and_then(|s| s.find(" @@").map(|end| &s[..end]))
    else {
        return hunk;
    };

    for part in inner.split(' ') {
        if let Some(range) = part.strip_prefix('-') {
            let (start, count) = parse_range(range);
            hunk.old_start = start;
            hunk.old_lines = count;
        } else if let Some(range) = part.strip_prefix('+') {
            let (start, count) = parse_range(range);
            hunk.new_start = start;
            hunk.new_lines = count;
        }
    }

    hunk
}

fn parse_range(range: &str) -> (u32, u32) {
    match range.split_once(',') {
        Some((start, count)) => (
            start.parse().unwrap_or(1),
            count.parse().unwrap_or(1),
        ),
        None => (range.parse().unwrap_or(1), 1),
    }
}

fn flush_hunk(current: &mut Option<FileDiff>, hunk: &mut Option<Hunk>) {
    if let Some(h) = hunk.take() {
        if let Some(file) = current.as_mut() {
            file.hunks.push(h);
        }
    }
}

fn flush_file(files: &mut Vec<FileDiff>, current: &mut Option<FileDiff>) {
    if let Some(file) = current.take() {
        files.push(file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_zero_files() {
        let diff = parse("");
        assert!(diff.files.is_empty());
        assert_eq!(diff.additions, 0);
        assert_eq!(diff.deletions, 0);
    }

    #[test]
    fn whitespace_only_input_yields_zero_files() {
        assert!(parse("\n\n   \n").files.is_empty());
    }

    #[test]
    fn single_file_single_hunk() {
        let diff = parse(
            "\
diff --git a/src/main.rs b/src/main.rs
index abc1234..def5678 100644
--- a/src/main.rs
+++ b/src/main.rs
@@ -1,3 +1,4 @@
 fn main() {
+    println!(\"hello\");
     let x = 1;
 }
",
        );
        assert_eq!(diff.files.len(), 1);
        let file = &diff.files[0];
        assert_eq!(file.path, PathBuf::from("src/main.rs"));
        assert_eq!(file.language, "rust");
        assert_eq!(file.status, FileStatus::Modified);
        assert_eq!(file.hunks.len(), 1);
        let hunk = &file.hunks[0];
        assert_eq!(hunk.old_start, 1);
        assert_eq!(hunk.old_lines, 3);
        assert_eq!(hunk.new_start, 1);
        assert_eq!(hunk.new_lines, 4);
        assert_eq!(hunk.lines.len(), 4);
        assert_eq!(hunk.lines[1].kind, LineKind::Addition);
        assert_eq!(hunk.lines[1].content, "    println!(\"hello\");");
    }

    #[test]
    fn addition_and_deletion_counts() {
        let diff = parse(
            "\
diff --git a/a.rs b/a.rs
--- a/a.rs
+++ b/a.rs
@@ -1,3 +1,4 @@
 ctx
+one
+two
-gone
",
        );
        assert_eq!(diff.files[0].additions, 2);
        assert_eq!(diff.files[0].deletions, 1);
        assert_eq!(diff.additions, 2);
        assert_eq!(diff.deletions, 1);
    }

    #[test]
    fn files_preserve_input_order() {
        let diff = parse(
            "\
diff --git a/a.rs b/a.rs
@@ -1 +1,2 @@
 line1
+line2
diff --git a/b.py b/b.py
@@ -1 +1,2 @@
 line1
+line2
diff --git a/c.go b/c.go
@@ -1 +1,2 @@
 line1
+line2
",
        );
        let paths: Vec<_> = diff.files.iter().map(|f| f.path.clone()).collect();
        assert_eq!(
            paths,
            vec![PathBuf::from("a.rs"), PathBuf::from("b.py"), PathBuf::from("c.go")]
        );
        assert_eq!(diff.files[1].language, "python");
    }

    #[test]
    fn new_file_mode_sets_added() {
        let diff = parse(
            "\
diff --git a/new.rs b/new.rs
new file mode 100644
--- /dev/null
+++ b/new.rs
@@ -0,0 +1,3 @@
+fn hello() {
+    println!(\"new\");
+}
",
        );
        assert_eq!(diff.files[0].status, FileStatus::Added);
        assert_eq!(diff.files[0].additions, 3);
    }

    #[test]
    fn deleted_file_mode_sets_deleted() {
        let diff = parse(
            "\
diff --git a/old.rs b/old.rs
deleted file mode 100644
--- a/old.rs
+++ /dev/null
@@ -1,3 +0,0 @@
-fn goodbye() {
-    println!(\"old\");
-}
",
        );
        assert_eq!(diff.files[0].status, FileStatus::Deleted);
        assert_eq!(diff.files[0].deletions, 3);
    }

    #[test]
    fn rename_records_old_path() {
        let diff = parse(
            "\
diff --git a/old_name.rs b/new_name.rs
similarity index 100%
rename from old_name.rs
rename to new_name.rs
",
        );
        let file = &diff.files[0];
        assert_eq!(file.status, FileStatus::Renamed);
        assert_eq!(file.path, PathBuf::from("new_name.rs"));
        assert_eq!(file.old_path, Some(PathBuf::from("old_name.rs")));
        assert!(file.hunks.is_empty());
    }

    #[test]
    fn binary_files_kept_with_flag() {
        let diff = parse(
            "\
diff --git a/image.png b/image.png
Binary files a/image.png and b/image.png differ
diff --git a/code.rs b/code.rs
--- a/code.rs
+++ b/code.rs
@@ -1 +1,2 @@
 line1
+line2
",
        );
        assert_eq!(diff.files.len(), 2);
        assert!(diff.files[0].is_binary);
        assert!(diff.files[0].hunks.is_empty());
        assert!(!diff.files[1].is_binary);
    }

    #[test]
    fn paths_with_spaces_survive() {
        let diff = parse(
            "\
diff --git a/src/my file.rs b/src/my file.rs
--- a/src/my file.rs
+++ b/src/my file.rs
@@ -1 +1,2 @@
 old
+new
",
        );
        assert_eq!(diff.files[0].path, PathBuf::from("src/my file.rs"));
    }

    #[test]
    fn malformed_hunk_header_degrades_to_defaults() {
        let diff = parse(
            "\
diff --git a/f.rs b/f.rs
@@ -x,y +z @@
+still counted
",
        );
        let hunk = &diff.files[0].hunks[0];
        assert_eq!(hunk.old_start, 1);
        assert_eq!(hunk.old_lines, 1);
        assert_eq!(hunk.new_start, 1);
        assert_eq!(hunk.new_lines, 1);
        assert_eq!(diff.files[0].additions, 1);
    }

    #[test]
    fn missing_count_defaults_to_one() {
        let diff = parse(
            "\
diff --git a/f.rs b/f.rs
@@ -5 +7,2 @@
 ctx
+new
",
        );
        let hunk = &diff.files[0].hunks[0];
        assert_eq!(hunk.old_start, 5);
        assert_eq!(hunk.old_lines, 1);
        assert_eq!(hunk.new_start, 7);
        assert_eq!(hunk.new_lines, 2);
    }

    #[test]
    fn no_newline_marker_discarded() {
        let diff = parse(
            "\
diff --git a/f.rs b/f.rs
@@ -1 +1 @@
-old
\\ No newline at end of file
+new
\\ No newline at end of file
",
        );
        let lines = &diff.files[0].hunks[0].lines;
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| !l.content.contains("No newline")));
    }

    #[test]
    fn lines_before_any_hunk_are_discarded() {
        let diff = parse(
            "\
diff --git a/f.rs b/f.rs
index 1234567..89abcde 100644
--- a/f.rs
+++ b/f.rs
@@ -1 +1,2 @@
 kept
+kept too
",
        );
        // the ---/+++ header lines must not be classified as deletions/additions
        assert_eq!(diff.files[0].deletions, 0);
        assert_eq!(diff.files[0].additions, 1);
        assert_eq!(diff.files[0].hunks[0].lines.len(), 2);
    }

    #[test]
    fn hunk_header_text_is_retained() {
        let diff = parse(
            "\
diff --git a/f.rs b/f.rs
@@ -1,3 +1,4 @@ fn main()
 ctx
",
        );
        assert_eq!(diff.files[0].hunks[0].header, "@@ -1,3 +1,4 @@ fn main()");
        assert_eq!(diff.files[0].hunks[0].old_lines, 3);
    }

    #[test]
    fn multiple_hunks_per_file() {
        let diff = parse(
            "\
diff --git a/lib.rs b/lib.rs
@@ -1,3 +1,4 @@
 fn foo() {
+    bar();
 }
@@ -10,3 +11,4 @@
 fn baz() {
+    qux();
 }
",
        );
        assert_eq!(diff.files[0].hunks.len(), 2);
        assert_eq!(diff.files[0].hunks[1].old_start, 10);
    }

    #[test]
    fn prefix_characters_are_stripped() {
        let diff = parse(
            "\
diff --git a/f.rs b/f.rs
@@ -1,2 +1,2 @@
 context line
-deleted line
+added line
",
        );
        let lines = &diff.files[0].hunks[0].lines;
        assert_eq!(lines[0].content, "context line");
        assert_eq!(lines[1].content, "deleted line");
        assert_eq!(lines[2].content, "added line");
    }
}
