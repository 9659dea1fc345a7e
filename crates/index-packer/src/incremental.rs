//! Chunk selection and chain bookkeeping.
//!
//! Each publish cycle asks the selector what changed since the last full
//! publish. The answer is either [`Selection::Regenerate`] (the stored
//! metadata cannot be trusted, a new chain starts) or [`Selection::Delta`]
//! with the changed record ids in the accessor's enumeration order.
//!
//! A non-empty delta advances `counter` and rotates the `chunk-<N>` window
//! before returning, so the caller writes the chunk under the sequence number
//! already recorded in the properties.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info, warn};

use index_types::{IndexError, RecordId, RecordKind, SnapshotAccessor};

use crate::checksum::{sidecar_path, MD5_EXTENSION, SHA1_EXTENSION};
use crate::properties::IndexProperties;

/// Outcome of one selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Metadata invalid; chain was reset and only a full snapshot is useful
    Regenerate,
    /// Changed records in accessor order (possibly empty)
    Delta(Vec<RecordId>),
}

impl Selection {
    pub fn is_regenerate(&self) -> bool {
        matches!(self, Selection::Regenerate)
    }
}

/// `<prefix>.<sequence>.gz`
pub fn chunk_file_name(prefix: &str, sequence: u64) -> String {
    format!("{}.{}.gz", prefix, sequence)
}

/// Sequence number embedded in a chunk file name, if `name` is one.
pub fn parse_chunk_sequence(prefix: &str, name: &str) -> Option<u64> {
    let middle = name.strip_prefix(prefix)?.strip_prefix('.')?.strip_suffix(".gz")?;
    if middle.is_empty() || !middle.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    middle.parse().ok()
}

/// Computes deltas and maintains the chunk window for one file prefix.
#[derive(Debug, Clone)]
pub struct IncrementalSelector {
    file_prefix: String,
    max_chunks: usize,
}

impl IncrementalSelector {
    /// `max_chunks` of 0 is treated as 1.
    pub fn new(file_prefix: impl Into<String>, max_chunks: usize) -> Self {
        Self {
            file_prefix: file_prefix.into(),
            max_chunks: max_chunks.max(1),
        }
    }

    pub fn max_chunks(&self) -> usize {
        self.max_chunks
    }

    pub fn file_prefix(&self) -> &str {
        &self.file_prefix
    }

    /// Validate the stored metadata, compute the delta and, if it is not
    /// empty, commit the next chunk slot into `props`.
    pub fn select(
        &self,
        props: &mut IndexProperties,
        accessor: &dyn SnapshotAccessor,
    ) -> Result<Selection, IndexError> {
        let Some(since) = props.timestamp else {
            info!("No valid publish timestamp, starting a new chain");
            reset_chain(props);
            return Ok(Selection::Regenerate);
        };
        let since_ms = since.timestamp_millis();

        let mut delta = Vec::new();
        for item in accessor.scan()? {
            let (id, record) = item?;
            if record.kind() != RecordKind::Artifact {
                continue;
            }
            match record.last_modified() {
                Ok(modified) if modified > since_ms => delta.push(id),
                Ok(_) => {}
                Err(e) => debug!(error = %e, "Skipping record without last-modified"),
            }
        }

        if delta.is_empty() {
            debug!(since = %since, "No records changed since last publish");
        } else {
            let sequence = self.commit_chunk(props);
            info!(changed = delta.len(), sequence, "Selected incremental chunk");
        }
        Ok(Selection::Delta(delta))
    }

    /// Rotate the chunk window and advance `counter`. Returns the new sequence.
    pub fn commit_chunk(&self, props: &mut IndexProperties) -> u64 {
        if props.chain_id.as_deref().map_or(true, |c| c.trim().is_empty()) {
            props.chain_id = Some(next_chain_id(None));
        }

        let sequence = props.counter.unwrap_or(0) + 1;

        let mut retained: Vec<u64> = props.chunks.values().copied().collect();
        retained.sort_unstable_by(|a, b| b.cmp(a));
        retained.dedup();
        retained.truncate(self.max_chunks - 1);

        props.chunks.clear();
        props.chunks.insert(0, sequence);
        for (slot, value) in retained.into_iter().enumerate() {
            props.chunks.insert(slot + 1, value);
        }
        props.counter = Some(sequence);
        sequence
    }

    /// Delete chunk files (and their sidecars) no longer advertised in `props`.
    ///
    /// Best effort: failures are logged and skipped.
    pub fn collect_garbage(&self, target_dir: &Path, props: &IndexProperties) -> Vec<PathBuf> {
        let entries = match fs::read_dir(target_dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = ?target_dir, error = %e, "Cannot list target directory for cleanup");
                return Vec::new();
            }
        };

        let mut removed = Vec::new();
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let Some(sequence) = parse_chunk_sequence(&self.file_prefix, name) else {
                continue;
            };
            if props.advertises_chunk(sequence) {
                continue;
            }

            let path = entry.path();
            match fs::remove_file(&path) {
                Ok(()) => {
                    debug!(path = ?path, sequence, "Removed stale chunk");
                    for ext in [SHA1_EXTENSION, MD5_EXTENSION] {
                        let sidecar = sidecar_path(&path, ext);
                        if sidecar.exists() {
                            if let Err(e) = fs::remove_file(&sidecar) {
                                warn!(path = ?sidecar, error = %e, "Failed to remove checksum file");
                            }
                        }
                    }
                    removed.push(path);
                }
                Err(e) => warn!(path = ?path, error = %e, "Failed to remove stale chunk"),
            }
        }

        if !removed.is_empty() {
            info!(count = removed.len(), "Collected stale chunks");
        }
        removed.sort();
        removed
    }
}

/// Start a new chain: fresh `chain-id`, `counter = 0`, no chunks.
pub fn reset_chain(props: &mut IndexProperties) {
    let chain_id = next_chain_id(props.chain_id.as_deref());
    debug!(chain_id = %chain_id, "Assigned new chain id");
    props.chain_id = Some(chain_id);
    props.counter = Some(0);
    props.chunks.clear();
}

/// Current epoch millis, bumped past `previous` so a reset always changes the id.
fn next_chain_id(previous: Option<&str>) -> String {
    let now = Utc::now().timestamp_millis().max(0) as u64;
    let previous = previous.and_then(|p| p.trim().parse::<u64>().ok());
    match previous {
        Some(prev) if prev >= now => prev.checked_add(1).unwrap_or(now).to_string(),
        _ => now.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use index_types::{MemorySnapshot, Record};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn artifact(name: &str, ts: i64) -> Record {
        Record::artifact(format!("org.example|{}|1.0|NA|jar", name), ts)
    }

    fn valid_props(since_ms: i64) -> IndexProperties {
        let mut props = IndexProperties::new();
        props.chain_id = Some("100".to_string());
        props.counter = Some(0);
        props.timestamp = Some(Utc.timestamp_millis_opt(since_ms).unwrap());
        props
    }

    #[test]
    fn test_chunk_file_names() {
        assert_eq!(chunk_file_name("idx", 7), "idx.7.gz");
        assert_eq!(parse_chunk_sequence("idx", "idx.7.gz"), Some(7));
        assert_eq!(parse_chunk_sequence("idx", "idx.gz"), None);
        assert_eq!(parse_chunk_sequence("idx", "idx.x.gz"), None);
        assert_eq!(parse_chunk_sequence("idx", "idx.7.gz.sha1"), None);
        assert_eq!(parse_chunk_sequence("idx", "other.7.gz"), None);
        assert_eq!(parse_chunk_sequence("idx", "idx.-1.gz"), None);
    }

    #[test]
    fn test_empty_props_regenerate() {
        let selector = IncrementalSelector::new("idx", 30);
        let mut props = IndexProperties::new();
        let snapshot = MemorySnapshot::new("test");

        let selection = selector.select(&mut props, &snapshot).unwrap();
        assert_eq!(selection, Selection::Regenerate);
        assert!(props.chain_id.is_some());
        assert_eq!(props.counter, Some(0));
    }

    #[test]
    fn test_unparseable_timestamp_regenerates_and_resets_chain() {
        let selector = IncrementalSelector::new("idx", 30);
        let mut props = IndexProperties::parse(
            "chain-id=100\ncounter=5\nchunk-0=5\ntimestamp=garbage\n",
        )
        .unwrap();
        let snapshot = MemorySnapshot::new("test");

        assert!(selector.select(&mut props, &snapshot).unwrap().is_regenerate());
        assert_ne!(props.chain_id.as_deref(), Some("100"));
        assert_eq!(props.counter, Some(0));
        assert!(props.chunks.is_empty());
    }

    #[test]
    fn test_reset_always_changes_chain_id() {
        let mut props = IndexProperties::new();
        props.chain_id = Some(u64::MAX.saturating_sub(1).to_string());
        reset_chain(&mut props);
        assert_eq!(props.chain_id, Some(u64::MAX.to_string()));
    }

    #[test]
    fn test_delta_is_exactly_newer_records_in_order() {
        let selector = IncrementalSelector::new("idx", 30);
        let mut snapshot = MemorySnapshot::new("test");
        for (i, ts) in [50, 200, 100, 300, 150, 99].iter().enumerate() {
            snapshot.push(artifact(&format!("r{}", i), *ts));
        }
        snapshot.push(Record::new().with("junk", "x"));

        let mut props = valid_props(100);
        let selection = selector.select(&mut props, &snapshot).unwrap();
        // strictly after 100, accessor order kept
        assert_eq!(
            selection,
            Selection::Delta(vec![RecordId(1), RecordId(3), RecordId(4)])
        );
        assert_eq!(props.counter, Some(1));
        assert_eq!(props.chunks.get(&0), Some(&1));
    }

    #[test]
    fn test_empty_delta_leaves_counter() {
        let selector = IncrementalSelector::new("idx", 30);
        let mut snapshot = MemorySnapshot::new("test");
        snapshot.push(artifact("old", 10));

        let mut props = valid_props(100);
        let before = props.clone();
        let selection = selector.select(&mut props, &snapshot).unwrap();
        assert_eq!(selection, Selection::Delta(Vec::new()));
        assert_eq!(props, before);
    }

    #[test]
    fn test_rotation_keeps_newest() {
        let selector = IncrementalSelector::new("idx", 3);
        let mut props = valid_props(0);
        for _ in 0..5 {
            selector.commit_chunk(&mut props);
        }
        assert_eq!(props.counter, Some(5));
        let slots: Vec<(usize, u64)> = props.chunks.iter().map(|(k, v)| (*k, *v)).collect();
        assert_eq!(slots, vec![(0, 5), (1, 4), (2, 3)]);
    }

    #[test]
    fn test_zero_max_chunks_keeps_one() {
        let selector = IncrementalSelector::new("idx", 0);
        assert_eq!(selector.max_chunks(), 1);
        let mut props = valid_props(0);
        selector.commit_chunk(&mut props);
        selector.commit_chunk(&mut props);
        assert_eq!(props.chunks.len(), 1);
        assert_eq!(props.chunks.get(&0), Some(&2));
    }

    #[test]
    fn test_commit_without_chain_assigns_one() {
        let selector = IncrementalSelector::new("idx", 30);
        let mut props = IndexProperties::new();
        props.timestamp = Some(Utc::now());
        assert_eq!(selector.commit_chunk(&mut props), 1);
        assert!(props.chain_id.is_some());
    }

    #[test]
    fn test_collect_garbage() {
        let dir = TempDir::new().unwrap();
        for name in [
            "idx.1.gz",
            "idx.1.gz.sha1",
            "idx.1.gz.md5",
            "idx.2.gz",
            "idx.3.gz",
            "idx.gz",
            "idx.properties",
            "other.1.gz",
        ] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }

        let mut props = valid_props(0);
        props.chunks.insert(0, 3);
        props.chunks.insert(1, 2);

        let selector = IncrementalSelector::new("idx", 30);
        let removed = selector.collect_garbage(dir.path(), &props);
        assert_eq!(removed, vec![dir.path().join("idx.1.gz")]);

        let mut left: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        left.sort();
        assert_eq!(
            left,
            vec!["idx.2.gz", "idx.3.gz", "idx.gz", "idx.properties", "other.1.gz"]
        );
    }

    #[test]
    fn test_collect_garbage_missing_dir() {
        let dir = TempDir::new().unwrap();
        let selector = IncrementalSelector::new("idx", 30);
        let removed = selector.collect_garbage(&dir.path().join("gone"), &IndexProperties::new());
        assert!(removed.is_empty());
    }
}
