//! Artifact index tool
//!
//! Publishes an artifact index as a full snapshot plus incremental chunks and
//! keeps replicas up to date.
//!
//! # Usage
//!
//! ```bash
//! artifact-index pack [--target-dir DIR] [--max-chunks N] [--checksums]
//! artifact-index update <SOURCE_DIR>
//! artifact-index plan <LOCAL_PROPERTIES> <REMOTE_PROPERTIES>
//! artifact-index unpack <FILE> [--summary]
//! artifact-index add <GROUP> <ARTIFACT> <VERSION>
//! artifact-index search <QUERY>
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/artifact-index/config.toml)
//! 3. Environment variables (ARTIFACT_INDEX_*)
//! 4. CLI flags

use std::path::Path;

use anyhow::Result;
use clap::Parser;

use index_cli::{
    init_logging, load_settings, run_add, run_pack, run_plan, run_search, run_unpack, run_update,
    Cli, Commands, GlobalOverrides, NewArtifact, PackOverrides,
};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let global = GlobalOverrides {
        config: cli.config,
        log_level: cli.log_level,
        index_path: cli.index_path,
    };
    let settings = load_settings(&global)?;
    init_logging(&settings.log_level)?;

    match cli.command {
        Commands::Pack {
            target_dir,
            prefix,
            max_chunks,
            no_incremental,
            no_snapshot,
            checksums,
            use_target_properties,
        } => {
            let overrides = PackOverrides {
                target_dir,
                prefix,
                max_chunks,
                no_incremental,
                no_snapshot,
                checksums,
                use_target_properties,
            };
            run_pack(settings, &overrides)?;
        }
        Commands::Update { source, prefix } => {
            run_update(settings, &source, prefix.as_deref())?;
        }
        Commands::Plan {
            local,
            remote,
            prefix,
        } => {
            let prefix = prefix.unwrap_or_else(|| settings.file_prefix.clone());
            run_plan(Path::new(&local), Path::new(&remote), &prefix)?;
        }
        Commands::Unpack {
            file,
            summary,
            limit,
        } => {
            run_unpack(Path::new(&file), summary, limit)?;
        }
        Commands::Add {
            group_id,
            artifact_id,
            version,
            classifier,
            extension,
            name,
            description,
            last_modified,
        } => {
            let artifact = NewArtifact {
                group_id,
                artifact_id,
                version,
                classifier,
                extension,
                name,
                description,
                last_modified,
            };
            run_add(settings, &artifact)?;
        }
        Commands::Search { query, limit } => {
            run_search(settings, &query, limit)?;
        }
    }

    Ok(())
}
