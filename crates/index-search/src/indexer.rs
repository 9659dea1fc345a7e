//! Artifact indexer for adding records to the Tantivy index.
//!
//! The indexer wraps IndexWriter with shared access via Arc<Mutex>.
//! Records are not visible until commit() is called; whether anything is
//! pending is published through [`ArtifactIndexer::has_uncommitted_changes`].

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tantivy::{IndexWriter, Term};
use tracing::{debug, info, warn};

use index_types::Record;

use crate::document::record_to_doc;
use crate::error::SearchError;
use crate::index::SearchIndex;
use crate::schema::ArtifactSchema;
use crate::state::{write_index_state, IndexState};

/// Manages record indexing operations.
pub struct ArtifactIndexer {
    writer: Arc<Mutex<IndexWriter>>,
    schema: ArtifactSchema,
    index_dir: PathBuf,
    index_id: String,
    dirty: AtomicBool,
}

impl ArtifactIndexer {
    /// Create a new indexer from a SearchIndex.
    pub fn new(index: &SearchIndex) -> Result<Self, SearchError> {
        let writer = index.writer()?;

        Ok(Self {
            writer: Arc::new(Mutex::new(writer)),
            schema: index.schema().clone(),
            index_dir: index.path().to_path_buf(),
            index_id: index.index_id().to_string(),
            dirty: AtomicBool::new(false),
        })
    }

    /// Index an artifact record.
    ///
    /// If a record with the same uinfo exists, it will be replaced.
    pub fn index_record(&self, record: &Record) -> Result<(), SearchError> {
        let doc = record_to_doc(&self.schema, record)?;
        let uinfo = record.uinfo().unwrap_or_default();

        let writer = self
            .writer
            .lock()
            .map_err(|e| SearchError::IndexLocked(e.to_string()))?;

        writer.delete_term(Term::from_field_text(self.schema.uinfo, uinfo));
        writer.add_document(doc)?;
        self.dirty.store(true, Ordering::SeqCst);

        debug!(uinfo, "Indexed artifact record");
        Ok(())
    }

    /// Index multiple records in batch.
    pub fn index_records(&self, records: &[Record]) -> Result<usize, SearchError> {
        let writer = self
            .writer
            .lock()
            .map_err(|e| SearchError::IndexLocked(e.to_string()))?;

        let mut count = 0;
        for record in records {
            let doc = record_to_doc(&self.schema, record)?;
            let uinfo = record.uinfo().unwrap_or_default();
            writer.delete_term(Term::from_field_text(self.schema.uinfo, uinfo));
            writer.add_document(doc)?;
            count += 1;
        }
        if count > 0 {
            self.dirty.store(true, Ordering::SeqCst);
        }

        debug!(count, "Indexed artifact records batch");
        Ok(count)
    }

    /// Delete an artifact by uinfo.
    pub fn delete_artifact(&self, uinfo: &str) -> Result<(), SearchError> {
        let writer = self
            .writer
            .lock()
            .map_err(|e| SearchError::IndexLocked(e.to_string()))?;

        writer.delete_term(Term::from_field_text(self.schema.uinfo, uinfo));
        self.dirty.store(true, Ordering::SeqCst);

        debug!(uinfo, "Deleted artifact record");
        Ok(())
    }

    /// Delete every document.
    pub fn delete_all(&self) -> Result<(), SearchError> {
        let writer = self
            .writer
            .lock()
            .map_err(|e| SearchError::IndexLocked(e.to_string()))?;

        writer.delete_all_documents()?;
        self.dirty.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Commit pending changes and stamp the index as updated now.
    pub fn commit(&self) -> Result<u64, SearchError> {
        self.commit_with_timestamp(Some(Utc::now()))
    }

    /// Commit pending changes and record the given freshness timestamp.
    ///
    /// Replicas use this to carry the publisher's timestamp over.
    pub fn commit_with_timestamp(
        &self,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<u64, SearchError> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|e| SearchError::IndexLocked(e.to_string()))?;

        let opstamp = writer.commit()?;
        self.dirty.store(false, Ordering::SeqCst);

        let state = IndexState {
            index_id: self.index_id.clone(),
            timestamp,
        };
        write_index_state(&self.index_dir, &state)?;

        info!(opstamp, "Committed index changes");
        Ok(opstamp)
    }

    /// Rollback uncommitted changes.
    pub fn rollback(&self) -> Result<u64, SearchError> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|e| SearchError::IndexLocked(e.to_string()))?;

        let opstamp = writer.rollback()?;
        self.dirty.store(false, Ordering::SeqCst);
        warn!(opstamp, "Rolled back index changes");
        Ok(opstamp)
    }

    /// Whether adds or deletes are waiting for a commit.
    pub fn has_uncommitted_changes(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::SearchIndexConfig;
    use index_types::fields;
    use tempfile::TempDir;

    fn sample_record(name: &str, ts: i64) -> Record {
        Record::artifact(format!("org.example|{}|1.0|NA|jar", name), ts)
            .with(fields::GROUP_ID, "org.example")
            .with(fields::ARTIFACT_ID, name)
    }

    fn num_docs(index: &SearchIndex) -> u64 {
        let reader = index.reader().unwrap();
        let searcher = reader.searcher();
        searcher
            .segment_readers()
            .iter()
            .map(|r| r.num_docs() as u64)
            .sum()
    }

    #[test]
    fn test_index_record() {
        let temp_dir = TempDir::new().unwrap();
        let index = SearchIndex::open_or_create(SearchIndexConfig::new(temp_dir.path())).unwrap();
        let indexer = ArtifactIndexer::new(&index).unwrap();

        assert!(!indexer.has_uncommitted_changes());
        indexer.index_record(&sample_record("a", 1)).unwrap();
        assert!(indexer.has_uncommitted_changes());
        indexer.commit().unwrap();
        assert!(!indexer.has_uncommitted_changes());

        assert_eq!(num_docs(&index), 1);
        assert!(index.state().unwrap().timestamp.is_some());
    }

    #[test]
    fn test_update_existing_record() {
        let temp_dir = TempDir::new().unwrap();
        let index = SearchIndex::open_or_create(SearchIndexConfig::new(temp_dir.path())).unwrap();
        let indexer = ArtifactIndexer::new(&index).unwrap();

        indexer.index_record(&sample_record("a", 1)).unwrap();
        indexer.commit().unwrap();
        indexer.index_record(&sample_record("a", 2)).unwrap();
        indexer.commit().unwrap();

        assert_eq!(num_docs(&index), 1);
    }

    #[test]
    fn test_batch_and_delete() {
        let temp_dir = TempDir::new().unwrap();
        let index = SearchIndex::open_or_create(SearchIndexConfig::new(temp_dir.path())).unwrap();
        let indexer = ArtifactIndexer::new(&index).unwrap();

        let records: Vec<Record> = (0..5).map(|i| sample_record(&format!("r{}", i), i)).collect();
        assert_eq!(indexer.index_records(&records).unwrap(), 5);
        indexer.commit().unwrap();
        assert_eq!(num_docs(&index), 5);

        indexer.delete_artifact("org.example|r0|1.0|NA|jar").unwrap();
        indexer.commit().unwrap();
        assert_eq!(num_docs(&index), 4);

        indexer.delete_all().unwrap();
        indexer.commit().unwrap();
        assert_eq!(num_docs(&index), 0);
    }

    #[test]
    fn test_rollback() {
        let temp_dir = TempDir::new().unwrap();
        let index = SearchIndex::open_or_create(SearchIndexConfig::new(temp_dir.path())).unwrap();
        let indexer = ArtifactIndexer::new(&index).unwrap();

        indexer.index_record(&sample_record("a", 1)).unwrap();
        indexer.rollback().unwrap();
        assert!(!indexer.has_uncommitted_changes());
        indexer.commit().unwrap();

        assert_eq!(num_docs(&index), 0);
    }

    #[test]
    fn test_commit_with_explicit_timestamp() {
        let temp_dir = TempDir::new().unwrap();
        let index = SearchIndex::open_or_create(SearchIndexConfig::new(temp_dir.path())).unwrap();
        let indexer = ArtifactIndexer::new(&index).unwrap();

        indexer.commit_with_timestamp(None).unwrap();
        assert!(index.state().unwrap().timestamp.is_none());
    }

    #[test]
    fn test_rejects_invalid_record() {
        let temp_dir = TempDir::new().unwrap();
        let index = SearchIndex::open_or_create(SearchIndexConfig::new(temp_dir.path())).unwrap();
        let indexer = ArtifactIndexer::new(&index).unwrap();

        let result = indexer.index_record(&Record::new().with("x", "y"));
        assert!(matches!(result, Err(SearchError::InvalidRecord(_))));
        assert!(!indexer.has_uncommitted_changes());
    }
}
