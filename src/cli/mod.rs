pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "courier")]
#[command(about = "Watch RSS/Atom feeds and mail new entries", long_about = None)]
pub struct Cli {
    /// Config file (default: ~/.config/courier/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Database file (default: ~/.local/share/courier/courier.db)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Number of parallel workers for fetching feeds
    #[arg(short, long, global = true)]
    pub workers: Option<usize>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check all feeds once and notify about new entries
    Check {
        /// Report new entries without sending mail or saving the checkpoint
        #[arg(long)]
        dry_run: bool,
    },
    /// Run scheduled checks and serve the HTTP trigger endpoints
    Serve,
    /// Add a feed
    Add {
        /// URL of the feed to add
        url: String,
    },
    /// Remove a feed
    Remove {
        /// URL of the feed to remove
        url: String,
    },
    /// Import feeds from an OPML file
    Import {
        /// Path to the OPML file
        path: PathBuf,
    },
    /// List feeds
    List,
    /// Show the stored checkpoint
    State {
        /// Replace the checkpoint with an empty one
        #[arg(long)]
        reset: bool,
    },
}
