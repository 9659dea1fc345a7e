//! CLI argument parsing for the artifact index tool.
//!
//! CLI flags override every other configuration source.

use clap::{Parser, Subcommand};

/// Artifact index tool
///
/// Publishes the artifact index as a full snapshot plus incremental chunks
/// and keeps replicas up to date from a published directory.
#[derive(Parser, Debug)]
#[command(name = "artifact-index")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/artifact-index/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Override live index path
    #[arg(long, global = true)]
    pub index_path: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one publish cycle into the target directory
    Pack {
        /// Override target directory
        #[arg(short, long)]
        target_dir: Option<String>,

        /// Override published file prefix
        #[arg(long)]
        prefix: Option<String>,

        /// Override retention window
        #[arg(long)]
        max_chunks: Option<usize>,

        /// Skip incremental chunk creation
        #[arg(long)]
        no_incremental: bool,

        /// Skip the full snapshot (chunk and properties only)
        #[arg(long)]
        no_snapshot: bool,

        /// Write .sha1/.md5 sidecars
        #[arg(long)]
        checksums: bool,

        /// Read prior state from the target directory properties
        #[arg(long)]
        use_target_properties: bool,
    },

    /// Update the live index from a published directory
    Update {
        /// Directory holding published files
        source: String,

        /// Override published file prefix
        #[arg(long)]
        prefix: Option<String>,
    },

    /// Show which chunks would bring a local copy up to date
    Plan {
        /// Local properties file (may not exist)
        local: String,

        /// Remote properties file
        remote: String,

        /// Override published file prefix
        #[arg(long)]
        prefix: Option<String>,
    },

    /// Decode a published snapshot or chunk
    Unpack {
        /// Path to a `.gz` file
        file: String,

        /// Print a summary instead of records
        #[arg(short, long)]
        summary: bool,

        /// Stop after this many records
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Add or replace an artifact in the live index
    Add {
        group_id: String,
        artifact_id: String,
        version: String,

        #[arg(long)]
        classifier: Option<String>,

        #[arg(long, default_value = "jar")]
        extension: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        description: Option<String>,

        /// Last-modified epoch millis (default: now)
        #[arg(long)]
        last_modified: Option<i64>,
    },

    /// Keyword search over the live index
    Search {
        query: String,

        /// Maximum results
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,
    },
}
