//! Core types, configuration, and error handling for the Kestrel toolkit.
//!
//! This crate provides the shared foundation used by all other Kestrel crates:
//! - [`KestrelError`] — unified error type using `thiserror`
//! - [`KestrelConfig`] — configuration loaded from `.kestrel.toml`
//! - Shared types: [`Diff`], [`FileDiff`], [`Hunk`], [`Line`], [`FileStatus`],
//!   [`LineKind`], [`FileReviewResult`]
//! - The [`FileReviewer`] boundary trait implemented by review backends

mod config;
mod error;
mod types;

pub use config::{KestrelConfig, LimiterConfig, MetricsConfig, PoolConfig, ServerConfig};
pub use error::KestrelError;
pub use types::{
    Diff, FileDiff, FileReviewResult, FileReviewer, FileStatus, Hunk, Line, LineKind,
};

/// A convenience `Result` type for Kestrel operations.
pub type Result<T> = std::result::Result<T, KestrelError>;
