//! Artifact index tool library exports.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `commands`: Command implementations (pack, update, plan, unpack, add, search)

pub mod cli;
pub mod commands;

pub use cli::{Cli, Commands};
pub use commands::{
    artifact_record, init_logging, load_settings, pack_request, run_add, run_pack, run_plan,
    run_search, run_unpack, run_update, GlobalOverrides, NewArtifact, PackOverrides,
};
