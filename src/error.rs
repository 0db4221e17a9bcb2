//! Error taxonomy shared by every stage of the catalog pipeline.
//!
//! Extraction and embedding failures are surfaced unmodified to whoever called
//! `build` or `search`; nothing in the core retries.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, CatalogError>;

#[derive(Debug, Error)]
pub enum CatalogError {
    /// The source file is not a delimited table with a header row.
    #[error("failed to parse table {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    /// The named embedding model could not be resolved or loaded.
    #[error("failed to load embedding model '{model}': {reason}")]
    ModelLoad { model: String, reason: String },

    /// The embedding model rejected its input or produced unusable output.
    #[error("embedding failed: {0}")]
    Encoding(String),

    /// Chunk file, vector matrix and index disagree about what they hold.
    #[error("persisted artifacts are out of sync: {0}")]
    Alignment(String),

    /// `search` was called before any build completed.
    #[error("no index has been built in {}", .0.display())]
    NotIndexed(PathBuf),

    /// The persisted index or vector matrix is unreadable or inconsistent.
    #[error("index is corrupt: {0}")]
    IndexCorrupt(String),

    #[error("index was built with model '{built}' but '{configured}' is configured; rebuild the index")]
    ModelMismatch { built: String, configured: String },

    /// A chunk would not survive the delimiter-based chunk file format.
    #[error("chunk {0} contains the chunk delimiter line")]
    InvalidChunk(usize),

    #[error("top_k must be a positive integer")]
    InvalidTopK,

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CatalogError {
    pub(crate) fn parse(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Parse {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn corrupt(reason: impl ToString) -> Self {
        Self::IndexCorrupt(reason.to_string())
    }
}
