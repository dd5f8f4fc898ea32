//! Core types, configuration, and error handling for hunkwise.
//!
//! This crate provides the shared foundation used by the other hunkwise crates:
//! - [`HunkwiseError`]: unified error type using `thiserror`
//! - [`HunkwiseConfig`]: configuration loaded from `.hunkwise.toml`
//! - Review inputs: [`ReviewedFile`], [`DiffHunk`], [`PullRequestDetails`]
//! - Review outputs: [`ReviewComment`], [`InlineComment`]

mod config;
mod error;
mod types;

pub use config::{HunkwiseConfig, LlmConfig, ReviewConfig};
pub use error::HunkwiseError;
pub use types::{
    DiffHunk, DiffLine, InlineComment, LineKind, LineNumber, OutputFormat, PatchType,
    PullRequestDetails, ReviewComment, ReviewedFile, Side,
};

/// A convenience `Result` type for hunkwise operations.
pub type Result<T> = std::result::Result<T, HunkwiseError>;
