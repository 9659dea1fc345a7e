//! End-to-end test infrastructure for the artifact index.
//!
//! Provides a shared TestHarness that owns a live Tantivy index, a publish
//! directory and a replica location, plus helpers for building records and
//! reading published files back.

use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};

use index_packer::{decode_file, pack, DirectoryFetcher, IndexUpdater, PackRequest, PackResult};
use index_search::{SearchIndex, SearchIndexConfig};
use index_types::{fields, Record, RecordKind};

/// File prefix used by every scenario.
pub const PREFIX: &str = "artifact-index";

/// Base of the last-modified stamps handed out by [`artifacts`].
pub const BASE_TS: i64 = 1_706_540_400_000;

/// Shared test harness for E2E tests.
pub struct TestHarness {
    /// Keeps temp dir alive for the lifetime of the harness
    pub _temp_dir: tempfile::TempDir,
    /// Publisher's live index
    pub index: SearchIndex,
    pub index_path: PathBuf,
    /// Directory consumers fetch from
    pub publish_dir: PathBuf,
    /// Consumer side index location
    pub replica_path: PathBuf,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let index_path = temp_dir.path().join("index");
        let publish_dir = temp_dir.path().join("publish");
        let replica_path = temp_dir.path().join("replica");

        let index = SearchIndex::open_or_create(
            SearchIndexConfig::new(&index_path).with_index_id("central"),
        )
        .expect("Failed to open publisher index");

        Self {
            _temp_dir: temp_dir,
            index,
            index_path,
            publish_dir,
            replica_path,
        }
    }

    /// Default publish request for this harness.
    pub fn request(&self) -> PackRequest {
        PackRequest::new(&self.index_path, &self.publish_dir).with_file_prefix(PREFIX)
    }

    /// Index records and commit with an explicit index timestamp.
    pub fn add_artifacts(&self, records: &[Record], committed_at: i64) {
        let indexer = self.index.indexer().expect("Failed to open indexer");
        indexer
            .index_records(records)
            .expect("Failed to index records");
        indexer
            .commit_with_timestamp(Some(ts(committed_at)))
            .expect("Failed to commit");
    }

    /// Run a publish cycle over the current committed state.
    pub fn publish(&self) -> PackResult {
        self.publish_with(&self.request())
    }

    pub fn publish_with(&self, request: &PackRequest) -> PackResult {
        let snapshot = self.index.snapshot().expect("Failed to open snapshot");
        pack(request, &snapshot).expect("Publish failed")
    }

    /// Open (or create) the replica index.
    pub fn open_replica(&self) -> SearchIndex {
        SearchIndex::open_or_create(SearchIndexConfig::new(&self.replica_path))
            .expect("Failed to open replica index")
    }

    /// Updater reading from the publish directory.
    pub fn updater(&self) -> IndexUpdater<DirectoryFetcher> {
        IndexUpdater::new(DirectoryFetcher::new(&self.publish_dir), PREFIX)
    }

    /// Properties file the replica keeps its progress in.
    pub fn replica_properties(&self) -> PathBuf {
        self.replica_path.join(format!("{}.properties", PREFIX))
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.publish_dir.join(format!("{}.gz", PREFIX))
    }

    pub fn chunk_path(&self, sequence: u64) -> PathBuf {
        self.publish_dir.join(format!("{}.{}.gz", PREFIX, sequence))
    }

    /// Sequence numbers of chunk files present in the publish directory.
    pub fn chunk_files_on_disk(&self) -> Vec<u64> {
        let mut sequences: Vec<u64> = std::fs::read_dir(&self.publish_dir)
            .expect("Failed to list publish dir")
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                let name = e.file_name().to_string_lossy().into_owned();
                index_packer::incremental::parse_chunk_sequence(PREFIX, &name)
            })
            .collect();
        sequences.sort_unstable();
        sequences
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

pub fn ts(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis).unwrap()
}

/// One artifact record with the usual coordinate fields.
pub fn artifact(group: &str, name: &str, version: &str, last_modified: i64) -> Record {
    Record::artifact(
        format!("{}|{}|{}|NA|jar", group, name, version),
        last_modified,
    )
    .with(fields::GROUP_ID, group)
    .with(fields::ARTIFACT_ID, name)
    .with(fields::VERSION, version)
    .with(fields::NAME, format!("{} {}", name, version))
}

/// `count` artifacts in `group`, last-modified one second apart from `first_ts`.
pub fn artifacts(group: &str, prefix: &str, count: usize, first_ts: i64) -> Vec<Record> {
    (0..count)
        .map(|i| {
            artifact(
                group,
                &format!("{}-{}", prefix, i),
                "1.0",
                first_ts + i as i64 * 1_000,
            )
        })
        .collect()
}

/// Decode every record of a published file.
pub fn read_records(path: &Path) -> Vec<Record> {
    decode_file(path)
        .expect("Failed to open published file")
        .collect::<Result<Vec<_>, _>>()
        .expect("Failed to decode published file")
}

/// Number of records of the given kind.
pub fn count_kind(records: &[Record], kind: RecordKind) -> usize {
    records.iter().filter(|r| r.kind() == kind).count()
}

/// Sorted uinfos of the artifact records.
pub fn artifact_uinfos(records: &[Record]) -> Vec<String> {
    let mut uinfos: Vec<String> = records
        .iter()
        .filter(|r| r.kind() == RecordKind::Artifact)
        .filter_map(|r| r.uinfo().map(str::to_string))
        .collect();
    uinfos.sort();
    uinfos
}
