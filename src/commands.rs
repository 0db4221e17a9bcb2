//! This module defines the command-line interface for the application using `clap`.
//!
//! It provides a `Cli` struct that represents the parsed command-line arguments,
//! and a `Commands` enum that represents the available subcommands and their
//! options.
//!
//! # Examples
//!
//! Parsing command-line arguments:
//!
//! ```no_run
//! use clap::Parser;
//! use awful_catalog::commands::{Cli, Commands};
//!
//! let cli = Cli::parse();
//! match cli.command {
//!     Commands::Search { query, .. } => println!("searching for {query}"),
//!     _ => {}
//! }
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Represents the parsed command-line arguments.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, propagate_version = true, color = clap::ColorChoice::Always)]
pub struct Cli {
    /// Config file to use instead of the one in the platform config directory.
    #[arg(short = 'c', long = "config", env = "AWC_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// The parsed subcommand and its options.
    #[command(subcommand)]
    pub command: Commands,
}

/// Represents the available subcommands and their options.
#[derive(Subcommand, Debug)]
#[command(about, long_about = None, color = clap::ColorChoice::Always)]
pub enum Commands {
    /// Write a default config file to the platform config directory.
    Init,

    /// Print the metadata profile of each table without indexing anything.
    #[clap(name = "profile", alias = "p")]
    Profile {
        /// CSV files, or directories whose `*.csv` files are used.
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Also write the profiles to this file in chunk file format.
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,
    },

    /// Profile the tables and rebuild the index from them.
    #[clap(name = "index", alias = "ix")]
    Index {
        /// CSV files, or directories whose `*.csv` files are used.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Find the dataset profiles most relevant to a question.
    #[clap(name = "search", alias = "s")]
    Search {
        /// Natural-language question or keywords.
        query: String,

        /// Number of profiles to return; defaults to `top_k` from the config.
        #[arg(short = 'k', long = "top-k")]
        top_k: Option<usize>,

        /// Print the raw context block that would go to an answer model.
        #[arg(long)]
        context: bool,
    },
}
