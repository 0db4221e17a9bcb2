//! # Awful Catalog (library root)
//!
//! Retrieval core for question answering over tabular dataset metadata. CSV
//! files are summarized into text profiles, the profiles are embedded with a
//! sentence-embedding model, and the nearest profiles to a question are handed
//! to whatever produces the answer.
//!
//! ```text
//! CSV ─► table ─► metadata ─► chunk_store ─► embeddings ─► vector_store
//!                                                              ▲
//! question ─► embeddings ─────────────── retrieval::search ────┘
//! ```
//!
//! ## Modules
//! - [`table`]: CSV reading and per-column type inference.
//! - [`metadata`]: [`DatasetProfile`] extraction and its text layout.
//! - [`chunk_store`]: chunk records and the delimiter-separated chunk file.
//! - [`embeddings`]: the [`Embedder`] trait and the candle BERT implementation.
//! - [`vector_store`]: exact squared-L2 [`FlatIndex`] and the raw vector matrix.
//! - [`retrieval`]: [`Retriever`], which builds, persists and searches an index.
//! - [`config`], [`commands`], [`pretty`]: configuration, CLI and terminal output
//!   for the `awc` binary.
//!
//! ## Example
//! ```no_run
//! use awful_catalog::{CatalogConfig, Retriever, SentenceEmbeddingsModel};
//! use std::path::Path;
//!
//! # fn main() -> awful_catalog::Result<()> {
//! let config = CatalogConfig::default();
//! let model = SentenceEmbeddingsModel::from_config(&config)?;
//! let retriever = Retriever::from_config(model, &config)?;
//! retriever.build_from_dir(Path::new("data"))?;
//! for text in retriever.search("which dataset has the most rows?", 3)? {
//!     println!("{text}");
//! }
//! # Ok(()) }
//! ```

use directories::ProjectDirs;
use std::path::PathBuf;

pub mod chunk_store;
pub mod commands;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod metadata;
pub mod pretty;
pub mod retrieval;
pub mod table;
pub mod vector_store;

#[cfg(test)]
mod testing;

pub use chunk_store::Chunk;
pub use config::CatalogConfig;
pub use embeddings::{Embedder, SentenceEmbeddingsModel};
pub use error::{CatalogError, Result};
pub use metadata::{DatasetProfile, extract_metadata};
pub use retrieval::{AnswerGenerator, Retriever, SearchHit};
pub use vector_store::FlatIndex;

/// Return the per-platform configuration directory used by `awc`.
///
/// This uses [`directories::ProjectDirs`] with the application triple
/// `("com", "awful-sec", "catalog")`, so you get the right place on each OS
/// (e.g., `~/.config/catalog` on Linux).
///
/// The directory is **not** created by this function.
///
/// # Errors
/// [`CatalogError::Config`] if no home directory can be determined.
///
/// # Examples
/// ```rust
/// let cfg = awful_catalog::config_dir().expect("has a config dir");
/// println!("config at {}", cfg.display());
/// ```
pub fn config_dir() -> Result<PathBuf> {
    let proj_dirs = ProjectDirs::from("com", "awful-sec", "catalog")
        .ok_or_else(|| CatalogError::Config("unable to determine config directory".into()))?;
    Ok(proj_dirs.config_dir().to_path_buf())
}
