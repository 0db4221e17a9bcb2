//! This module provides functionality for loading and handling the application's configuration.
//!
//! It defines the `CatalogConfig` struct, which holds the configuration parameters,
//! and a `load_config` function to load the configuration from a YAML file.
//!
//! # Examples
//!
//! Loading the configuration from a file:
//!
//! ```no_run
//! use awful_catalog::config::{CatalogConfig, load_config};
//!
//! let config: CatalogConfig = load_config("/path/to/config.yaml").unwrap();
//! println!("{:?}", config);
//! ```

use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

use tracing::*;

use crate::error::{CatalogError, Result};

pub const DEFAULT_EMBEDDING_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// Represents the application's configuration.
///
/// Every field has a default, so a config file only needs the values it changes.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(default)]
pub struct CatalogConfig {
    /// Hugging Face repo id of the sentence embedding model. Indexes remember it;
    /// changing it requires rebuilding the index.
    pub embedding_model: String,

    /// Revision (branch, tag or commit) of the embedding model.
    pub model_revision: String,

    /// Local directory holding `config.json`, `tokenizer.json` and
    /// `model.safetensors`. When set the Hub is never contacted.
    pub model_dir: Option<PathBuf>,

    /// Directory holding the persisted index. Defaults to `<config_dir>/index`.
    pub index_dir: Option<PathBuf>,

    /// Number of chunks returned by a search when none is given.
    pub top_k: usize,

    /// Texts per embedding forward pass.
    pub batch_size: usize,

    /// Progress bar while embedding.
    pub show_progress: bool,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            model_revision: "main".to_string(),
            model_dir: None,
            index_dir: None,
            top_k: 3,
            batch_size: 32,
            show_progress: true,
        }
    }
}

impl CatalogConfig {
    /// Directory the index lives in: `index_dir` if set, else `<config_dir>/index`.
    pub fn resolved_index_dir(&self) -> Result<PathBuf> {
        match &self.index_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(crate::config_dir()?.join("index")),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.embedding_model.trim().is_empty() {
            return Err(CatalogError::Config("embedding_model cannot be empty".into()));
        }
        if self.top_k == 0 {
            return Err(CatalogError::Config("top_k must be >= 1".into()));
        }
        if self.batch_size == 0 {
            return Err(CatalogError::Config("batch_size must be >= 1".into()));
        }
        Ok(())
    }
}

/// Loads the application's configuration from a YAML file.
///
/// # Errors
///
/// [`CatalogError::Config`] if the file cannot be read, is not valid YAML for
/// [`CatalogConfig`], or holds out-of-range values.
///
/// # Examples
///
/// ```no_run
/// use awful_catalog::config::load_config;
///
/// match load_config("/path/to/config.yaml") {
///     Ok(config) => println!("{:?}", config),
///     Err(err) => eprintln!("Error loading config: {}", err),
/// }
/// ```
pub fn load_config(file: impl Into<PathBuf>) -> Result<CatalogConfig> {
    let file = file.into();
    debug!("Loading config from {}", file.display());
    let content = fs::read_to_string(&file)
        .map_err(|e| CatalogError::Config(format!("failed to read {}: {e}", file.display())))?;
    let config: CatalogConfig = serde_yaml::from_str(&content)
        .map_err(|e| CatalogError::Config(format!("failed to parse {}: {e}", file.display())))?;
    config.validate()?;
    Ok(config)
}

/// Write `config` as YAML to `file`.
pub fn save_config(config: &CatalogConfig, file: impl Into<PathBuf>) -> Result<()> {
    let file = file.into();
    let yaml = serde_yaml::to_string(config).map_err(|e| CatalogError::Config(e.to_string()))?;
    info!("Writing config file: {}", file.display());
    fs::write(file, yaml)?;
    Ok(())
}
