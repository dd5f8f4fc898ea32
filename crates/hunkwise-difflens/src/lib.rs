//! Diff parsing and pre-review file filtering.
//!
//! Turns `git diff` output into [`hunkwise_core::ReviewedFile`] and
//! [`hunkwise_core::DiffHunk`] values with per-line old/new numbers, and
//! drops files that should never reach a review backend.

pub mod filter;
pub mod parser;
