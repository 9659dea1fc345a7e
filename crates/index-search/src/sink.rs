//! Replica target backed by the artifact index.

use chrono::{DateTime, Utc};

use index_types::{IndexError, Record, RecordSink};

use crate::indexer::ArtifactIndexer;

/// Applies replicated records to a live index through an [`ArtifactIndexer`].
///
/// The freshness timestamp set by the replica is written on commit.
pub struct TantivySink {
    indexer: ArtifactIndexer,
    timestamp: Option<DateTime<Utc>>,
}

impl TantivySink {
    pub fn new(indexer: ArtifactIndexer) -> Self {
        Self {
            indexer,
            timestamp: None,
        }
    }

    pub fn indexer(&self) -> &ArtifactIndexer {
        &self.indexer
    }

    pub fn into_indexer(self) -> ArtifactIndexer {
        self.indexer
    }
}

impl RecordSink for TantivySink {
    fn clear(&mut self) -> Result<(), IndexError> {
        Ok(self.indexer.delete_all()?)
    }

    fn upsert(&mut self, record: Record) -> Result<(), IndexError> {
        Ok(self.indexer.index_record(&record)?)
    }

    fn set_timestamp(&mut self, timestamp: Option<DateTime<Utc>>) -> Result<(), IndexError> {
        self.timestamp = timestamp;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), IndexError> {
        self.indexer.commit_with_timestamp(self.timestamp)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{SearchIndex, SearchIndexConfig};
    use chrono::TimeZone;
    use index_types::SnapshotAccessor;
    use tempfile::TempDir;

    #[test]
    fn test_apply_and_commit() {
        let temp_dir = TempDir::new().unwrap();
        let index = SearchIndex::open_or_create(SearchIndexConfig::new(temp_dir.path())).unwrap();
        let mut sink = TantivySink::new(index.indexer().unwrap());

        let ts = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        sink.upsert(Record::artifact("g|a|1|NA|jar", 1)).unwrap();
        sink.upsert(Record::artifact("g|b|1|NA|jar", 2)).unwrap();
        sink.set_timestamp(Some(ts)).unwrap();
        sink.commit().unwrap();

        let snapshot = index.snapshot().unwrap();
        assert_eq!(snapshot.num_docs(), 2);
        assert_eq!(snapshot.timestamp(), Some(ts));
    }

    #[test]
    fn test_clear() {
        let temp_dir = TempDir::new().unwrap();
        let index = SearchIndex::open_or_create(SearchIndexConfig::new(temp_dir.path())).unwrap();
        let mut sink = TantivySink::new(index.indexer().unwrap());

        sink.upsert(Record::artifact("g|a|1|NA|jar", 1)).unwrap();
        sink.commit().unwrap();
        sink.clear().unwrap();
        sink.upsert(Record::artifact("g|b|1|NA|jar", 2)).unwrap();
        sink.commit().unwrap();

        let snapshot = index.snapshot().unwrap();
        let uinfos: Vec<String> = snapshot
            .scan()
            .unwrap()
            .map(|i| i.unwrap().1.uinfo().unwrap().to_string())
            .collect();
        assert_eq!(uinfos, vec!["g|b|1|NA|jar"]);
    }
}
