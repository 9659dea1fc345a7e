//! Tantivy index management.
//!
//! Handles index creation, opening, and lifecycle.

use std::path::{Path, PathBuf};

use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy};
use tracing::{debug, info};

use crate::error::SearchError;
use crate::indexer::ArtifactIndexer;
use crate::schema::{build_artifact_schema, ArtifactSchema};
use crate::snapshot::IndexSnapshot;
use crate::state::{read_index_state, write_index_state, IndexState};

/// Default memory budget for IndexWriter (50MB)
const DEFAULT_WRITER_MEMORY_MB: usize = 50;

/// Search index configuration
#[derive(Debug, Clone)]
pub struct SearchIndexConfig {
    /// Path to index directory
    pub index_path: PathBuf,
    /// Identity recorded in the state sidecar when the index is created
    pub index_id: String,
    /// Memory budget for writer in MB
    pub writer_memory_mb: usize,
}

impl Default for SearchIndexConfig {
    fn default() -> Self {
        Self {
            index_path: PathBuf::from("./index"),
            index_id: "local".to_string(),
            writer_memory_mb: DEFAULT_WRITER_MEMORY_MB,
        }
    }
}

impl SearchIndexConfig {
    pub fn new(index_path: impl Into<PathBuf>) -> Self {
        Self {
            index_path: index_path.into(),
            ..Default::default()
        }
    }

    pub fn with_index_id(mut self, index_id: impl Into<String>) -> Self {
        self.index_id = index_id.into();
        self
    }

    pub fn with_memory_mb(mut self, mb: usize) -> Self {
        self.writer_memory_mb = mb;
        self
    }
}

/// Wrapper for Tantivy index with schema and state access.
pub struct SearchIndex {
    index: Index,
    schema: ArtifactSchema,
    config: SearchIndexConfig,
    index_id: String,
}

impl SearchIndex {
    /// Open existing index or create new one.
    ///
    /// The index id stored in the state sidecar wins over the configured one.
    pub fn open_or_create(config: SearchIndexConfig) -> Result<Self, SearchError> {
        let index = open_or_create_index(&config.index_path)?;
        let schema = ArtifactSchema::from_schema(index.schema())?;

        let index_id = match read_index_state(&config.index_path)? {
            Some(state) => state.index_id,
            None => {
                write_index_state(&config.index_path, &IndexState::new(&config.index_id))?;
                config.index_id.clone()
            }
        };

        info!(path = ?config.index_path, index_id = %index_id, "Opened artifact index");

        Ok(Self {
            index,
            schema,
            config,
            index_id,
        })
    }

    /// Get the artifact schema
    pub fn schema(&self) -> &ArtifactSchema {
        &self.schema
    }

    /// Get the underlying Tantivy index
    pub fn index(&self) -> &Index {
        &self.index
    }

    pub fn index_id(&self) -> &str {
        &self.index_id
    }

    /// Create an IndexWriter with configured memory budget
    pub fn writer(&self) -> Result<IndexWriter, SearchError> {
        let memory_budget = self.config.writer_memory_mb * 1024 * 1024;
        let writer = self.index.writer(memory_budget)?;
        debug!(
            memory_mb = self.config.writer_memory_mb,
            "Created index writer"
        );
        Ok(writer)
    }

    /// Create an IndexReader with OnCommit reload policy
    pub fn reader(&self) -> Result<IndexReader, SearchError> {
        let reader = self
            .index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()?;
        debug!("Created index reader");
        Ok(reader)
    }

    /// Writer-side handle for adding and committing records.
    pub fn indexer(&self) -> Result<ArtifactIndexer, SearchError> {
        ArtifactIndexer::new(self)
    }

    /// Read-only view of the last committed state.
    pub fn snapshot(&self) -> Result<IndexSnapshot, SearchError> {
        let state = self.state()?;
        let searcher = self.reader()?.searcher();
        Ok(IndexSnapshot::new(
            searcher,
            self.schema.clone(),
            state.index_id,
            state.timestamp,
        ))
    }

    /// Current state sidecar.
    pub fn state(&self) -> Result<IndexState, SearchError> {
        Ok(read_index_state(&self.config.index_path)?
            .unwrap_or_else(|| IndexState::new(&self.index_id)))
    }

    /// Get the index path
    pub fn path(&self) -> &Path {
        &self.config.index_path
    }

    /// Check if index exists at the configured path
    pub fn exists(&self) -> bool {
        self.config.index_path.join("meta.json").exists()
    }
}

/// Open an existing index or create a new one.
///
/// Uses MmapDirectory for persistence.
pub fn open_or_create_index(path: &Path) -> Result<Index, SearchError> {
    if path.join("meta.json").exists() {
        debug!(path = ?path, "Opening existing index");
        let index = Index::open_in_dir(path)?;
        Ok(index)
    } else {
        info!(path = ?path, "Creating new index");
        std::fs::create_dir_all(path)?;
        let schema = build_artifact_schema();
        let index = Index::create_in_dir(path, schema.schema().clone())?;
        Ok(index)
    }
}
