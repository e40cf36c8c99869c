//! Command-line definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Quotebook - a local quote collection with server sync.
#[derive(Parser, Debug)]
#[command(name = "quotebook")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML config file (defaults to the user config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the quote database path from config
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show a random quote from the selected category
    Show {
        /// Select this category first ("all" clears the filter)
        #[arg(long)]
        category: Option<String>,
    },

    /// List quotes in the selected category
    List,

    /// Add a new quote
    Add {
        text: String,
        category: String,
        /// Upload the collection to the server afterwards
        #[arg(long)]
        push: bool,
    },

    /// List known categories
    Categories,

    /// Select the category filter ("all" clears it)
    Filter { category: String },

    /// Write all quotes to a JSON file
    Export { path: PathBuf },

    /// Load quotes from a JSON file
    Import {
        path: PathBuf,
        /// Keep existing quotes and append the imported ones
        #[arg(long)]
        append: bool,
        /// Upload the collection to the server afterwards
        #[arg(long)]
        push: bool,
    },

    /// Sync with the server once
    Sync,

    /// Sync periodically until interrupted
    Watch,
}
