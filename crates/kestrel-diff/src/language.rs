use std::path::Path;

/// Detect a language tag from a path's file extension.
///
/// The lookup is case-insensitive on the extension of the final path
/// component. Unknown extensions map to `"unknown"` rather than an empty
/// string so downstream consumers never special-case missing tags.
///
/// # Examples
///
/// ```
/// use kestrel_diff::detect_language;
/// use std::path::Path;
///
/// assert_eq!(detect_language(Path::new("src/main.rs")), "rust");
/// assert_eq!(detect_language(Path::new("lib/App.TSX")), "typescript");
/// assert_eq!(detect_language(Path::new("data.bin")), "unknown");
/// ```
pub fn detect_language(path: &Path) -> &'static str {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return "unknown";
    };

    match ext.to_ascii_lowercase().as_str() {
        "rs" => "rust",
        "py" | "pyi" => "python",
        "js" | "mjs" | "cjs" => "javascript",
        "ts" | "tsx" | "mts" => "typescript",
        "jsx" => "javascript",
        "go" => "go",
        "java" => "java",
        "c" | "h" => "c",
        "cc" | "cpp" | "cxx" | "hpp" | "hxx" => "cpp",
        "cs" => "csharp",
        "rb" => "ruby",
        "php" => "php",
        "kt" | "kts" => "kotlin",
        "swift" => "swift",
        "scala" => "scala",
        "sh" | "bash" => "shell",
        "sql" => "sql",
        "html" | "htm" => "html",
        "css" | "scss" | "sass" => "css",
        "md" | "markdown" => "markdown",
        "yaml" | "yml" => "yaml",
        "toml" => "toml",
        "json" => "json",
        "xml" => "xml",
        "proto" => "protobuf",
        "tf" => "terraform",
        "dockerfile" => "docker",
        _ => "unknown",
    }
}
