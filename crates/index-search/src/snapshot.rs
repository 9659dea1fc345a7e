//! Committed, read-only view of the artifact index.
//!
//! Enumeration order is segment by segment, doc id ascending within a
//! segment. The searcher is pinned at creation, so every scan of one
//! snapshot sees the same records in the same order.

use chrono::{DateTime, Utc};
use tantivy::{DocAddress, Searcher, TantivyDocument};
use tracing::debug;

use index_types::{IndexError, RecordId, RecordScan, SnapshotAccessor};

use crate::document::record_from_doc;
use crate::error::SearchError;
use crate::schema::ArtifactSchema;

/// Snapshot accessor over a pinned Tantivy searcher.
pub struct IndexSnapshot {
    searcher: Searcher,
    schema: ArtifactSchema,
    index_id: String,
    timestamp: Option<DateTime<Utc>>,
}

impl IndexSnapshot {
    pub fn new(
        searcher: Searcher,
        schema: ArtifactSchema,
        index_id: String,
        timestamp: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            searcher,
            schema,
            index_id,
            timestamp,
        }
    }

    /// Number of live documents.
    pub fn num_docs(&self) -> u64 {
        self.searcher.num_docs()
    }

    fn alive_addresses(&self) -> Vec<DocAddress> {
        let mut addresses = Vec::new();
        for (segment_ord, segment_reader) in self.searcher.segment_readers().iter().enumerate() {
            for doc_id in segment_reader.doc_ids_alive() {
                addresses.push(DocAddress::new(segment_ord as u32, doc_id));
            }
        }
        debug!(count = addresses.len(), "Enumerated live documents");
        addresses
    }
}

fn record_id(address: DocAddress) -> RecordId {
    RecordId(((address.segment_ord as u64) << 32) | address.doc_id as u64)
}

impl SnapshotAccessor for IndexSnapshot {
    fn index_id(&self) -> &str {
        &self.index_id
    }

    fn scan(&self) -> Result<RecordScan<'_>, IndexError> {
        let addresses = self.alive_addresses();
        Ok(Box::new(addresses.into_iter().map(move |address| {
            let doc: TantivyDocument = self
                .searcher
                .doc(address)
                .map_err(|e| IndexError::from(SearchError::from(e)))?;
            let record = record_from_doc(&self.schema, &doc)?;
            Ok((record_id(address), record))
        })))
    }

    fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{SearchIndex, SearchIndexConfig};
    use index_types::{fields, Record};
    use tempfile::TempDir;

    fn sample_record(group: &str, name: &str, ts: i64) -> Record {
        Record::artifact(format!("{}|{}|1.0|NA|jar", group, name), ts)
            .with(fields::GROUP_ID, group)
            .with(fields::ARTIFACT_ID, name)
    }

    #[test]
    fn test_scan_returns_committed_records() {
        let temp_dir = TempDir::new().unwrap();
        let index = SearchIndex::open_or_create(
            SearchIndexConfig::new(temp_dir.path()).with_index_id("central"),
        )
        .unwrap();
        let indexer = index.indexer().unwrap();
        indexer.index_record(&sample_record("org.a", "one", 10)).unwrap();
        indexer.index_record(&sample_record("com.b", "two", 20)).unwrap();
        indexer.commit().unwrap();
        // not yet committed, must not show up
        indexer.index_record(&sample_record("net.c", "three", 30)).unwrap();

        let snapshot = index.snapshot().unwrap();
        assert_eq!(snapshot.index_id(), "central");
        assert!(snapshot.timestamp().is_some());

        let records: Vec<Record> = snapshot
            .scan()
            .unwrap()
            .map(|item| item.unwrap().1)
            .collect();
        assert_eq!(records.len(), 2);
        let mut stamps: Vec<i64> = records.iter().map(|r| r.last_modified().unwrap()).collect();
        stamps.sort();
        assert_eq!(stamps, vec![10, 20]);
    }

    #[test]
    fn test_scan_order_is_stable() {
        let temp_dir = TempDir::new().unwrap();
        let index = SearchIndex::open_or_create(SearchIndexConfig::new(temp_dir.path())).unwrap();
        let indexer = index.indexer().unwrap();
        for i in 0..10 {
            indexer
                .index_record(&sample_record("org.a", &format!("r{}", i), i))
                .unwrap();
        }
        indexer.commit().unwrap();

        let snapshot = index.snapshot().unwrap();
        let first: Vec<RecordId> = snapshot.scan().unwrap().map(|i| i.unwrap().0).collect();
        let second: Vec<RecordId> = snapshot.scan().unwrap().map(|i| i.unwrap().0).collect();
        assert_eq!(first.len(), 10);
        assert_eq!(first, second);
    }

    #[test]
    fn test_groups_from_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let index = SearchIndex::open_or_create(SearchIndexConfig::new(temp_dir.path())).unwrap();
        let indexer = index.indexer().unwrap();
        indexer.index_record(&sample_record("org.apache", "x", 1)).unwrap();
        indexer.index_record(&sample_record("org.slf4j", "y", 1)).unwrap();
        indexer.commit().unwrap();

        let snapshot = index.snapshot().unwrap();
        let all: Vec<String> = snapshot.all_groups().unwrap().into_iter().collect();
        assert_eq!(all, vec!["org.apache", "org.slf4j"]);
        let roots: Vec<String> = snapshot.root_groups().unwrap().into_iter().collect();
        assert_eq!(roots, vec!["org"]);
    }

    #[test]
    fn test_empty_index() {
        let temp_dir = TempDir::new().unwrap();
        let index = SearchIndex::open_or_create(SearchIndexConfig::new(temp_dir.path())).unwrap();
        let snapshot = index.snapshot().unwrap();
        assert_eq!(snapshot.num_docs(), 0);
        assert_eq!(snapshot.scan().unwrap().count(), 0);
        assert!(snapshot.timestamp().is_none());
    }
}
