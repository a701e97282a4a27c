//! Unified-diff parsing and language detection.
//!
//! Turns raw `git diff` text into the structured [`kestrel_core::Diff`] model
//! used by the review pipeline. Parsing is deliberately permissive: malformed
//! fragments are skipped or defaulted, never fatal — partial information is
//! strictly better than none for a review pipeline.

pub mod language;
pub mod parser;

pub use language::detect_language;
pub use parser::parse;
