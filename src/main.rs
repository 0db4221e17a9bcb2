//! Main module for the Awful Catalog CLI application (awc).
//!
//! Parses the command line, loads the configuration, and hands each command to
//! the library.
//!
//! # Examples
//!
//! ```sh
//! awc init
//! awc profile data/ -o profiles.txt
//! awc index data/
//! awc search "which dataset has the most rows?" -k 2
//! ```

use awful_catalog::{
    CatalogConfig, CatalogError, Chunk, Retriever, SentenceEmbeddingsModel,
    chunk_store::write_chunks,
    commands::{Cli, Commands},
    config::{load_config, save_config},
    config_dir,
    metadata::{expand_sources, extract_metadata},
    pretty,
    retrieval::is_indexed,
};
use clap::Parser;
use once_cell::sync::OnceCell;
use std::{error::Error, fs, path::Path};
use tracing::{debug, info, warn};

static TRACING: OnceCell<()> = OnceCell::new();

fn main() -> Result<(), Box<dyn Error>> {
    TRACING.get_or_init(|| {
        tracing_subscriber::fmt().with_writer(std::io::stderr).init();
    });
    run()
}

/// Load the configuration and execute the requested command.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded, a table cannot be
/// profiled, the embedding model cannot be loaded, or the index is missing or
/// unreadable.
fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let config_path = match cli.config {
        Some(path) => path,
        None => config_dir()?.join("config.yaml"),
    };

    match cli.command {
        Commands::Init => {
            debug!("Initializing configuration");
            init(&config_path)?;
        }
        Commands::Profile { paths, output } => {
            let sources = expand_sources(&paths)?;
            let mut chunks = Vec::with_capacity(sources.len());
            for (id, path) in sources.iter().enumerate() {
                let profile = extract_metadata(path)?;
                pretty::print_profile(&profile)?;
                chunks.push(Chunk::from_profile(id, &profile));
            }
            if let Some(output) = output {
                write_chunks(&output, &chunks)?;
                info!("Wrote {} profiles to {}", chunks.len(), output.display());
            }
        }
        Commands::Index { paths } => {
            let config = config_or_default(&config_path)?;
            let sources = expand_sources(&paths)?;
            if sources.is_empty() {
                return Err("no CSV files found in the given paths".into());
            }
            let model = SentenceEmbeddingsModel::from_config(&config)?;
            let retriever = Retriever::from_config(model, &config)?;
            info!("Building index in {}", retriever.index_dir().display());
            let manifest = retriever.build_from_tables(&sources)?;
            pretty::print_manifest(&manifest)?;
        }
        Commands::Search {
            query,
            top_k,
            context,
        } => {
            let config = config_or_default(&config_path)?;
            let index_dir = config.resolved_index_dir()?;
            if !is_indexed(&index_dir) {
                return Err(CatalogError::NotIndexed(index_dir).into());
            }
            let model = SentenceEmbeddingsModel::from_config(&config)?;
            let retriever = Retriever::from_config(model, &config)?;
            let k = top_k.unwrap_or_else(|| retriever.default_top_k());
            debug!("Searching for {:?} (k = {})", query, k);
            if context {
                println!("{}", retriever.context(&query, k)?);
            } else {
                pretty::print_hits(&retriever.search_chunks(&query, k)?)?;
            }
        }
    }

    Ok(())
}

/// Load `path`, or fall back to the defaults when it does not exist yet.
fn config_or_default(path: &Path) -> Result<CatalogConfig, Box<dyn Error>> {
    if path.is_file() {
        let config = load_config(path)?;
        debug!("Config loaded: {:?}", config);
        Ok(config)
    } else {
        warn!(
            "No config at {}, using defaults (run `awc init` to create one)",
            path.display()
        );
        Ok(CatalogConfig::default())
    }
}

/// Create the config directory and write a default config file.
///
/// An existing config file is left as it is.
///
/// # Errors
///
/// Returns an error if the directories or the file cannot be created.
fn init(config_path: &Path) -> Result<(), Box<dyn Error>> {
    if let Some(parent) = config_path.parent() {
        info!("Creating config directory: {}", parent.display());
        fs::create_dir_all(parent)?;
    }

    if config_path.exists() {
        warn!("Config file {} already exists, leaving it untouched", config_path.display());
    } else {
        save_config(&CatalogConfig::default(), config_path)?;
    }

    let config = load_config(config_path)?;
    let index_dir = config.resolved_index_dir()?;
    info!("Creating index directory: {}", index_dir.display());
    fs::create_dir_all(index_dir)?;
    Ok(())
}
