//! # index-search
//!
//! Live artifact index built on Tantivy.
//!
//! This crate is the engine side of the packing protocol: it stores artifact
//! records, exposes a committed state through [`IndexSnapshot`] (the
//! `SnapshotAccessor` the packer reads), and accepts replicated records
//! through [`TantivySink`].
//!
//! ## Features
//! - Embedded Tantivy index with MmapDirectory for persistence
//! - Whole records kept as stored JSON so sparse fields survive unchanged
//! - Upsert by `uinfo`, explicit uncommitted-changes flag on the writer
//! - Index state sidecar (index id + freshness timestamp)
//! - Explicit registry of open indexes keyed by id
//! - Keyword search over names, descriptions and class names

pub mod document;
pub mod error;
pub mod index;
pub mod indexer;
pub mod registry;
pub mod schema;
pub mod searcher;
pub mod sink;
pub mod snapshot;
pub mod state;

pub use document::{record_from_doc, record_to_doc};
pub use error::SearchError;
pub use index::{open_or_create_index, SearchIndex, SearchIndexConfig};
pub use indexer::ArtifactIndexer;
pub use registry::IndexRegistry;
pub use schema::{build_artifact_schema, ArtifactSchema};
pub use searcher::{ArtifactSearcher, SearchHit};
pub use sink::TantivySink;
pub use snapshot::IndexSnapshot;
pub use state::{read_index_state, write_index_state, IndexState, INDEX_STATE_FILE_NAME};
