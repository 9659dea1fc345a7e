//! One publish cycle: chunk, full snapshot, properties, cleanup.
//!
//! Everything written lands in the target directory, apart from the
//! authoritative properties copy kept beside the live index.

use std::collections::{BTreeSet, HashSet};
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use index_types::{Record, RecordId, RecordKind, Settings, SnapshotAccessor};

use crate::checksum::write_checksum_files;
use crate::codec::{finish_gz_file, gz_file_writer, Header, RecordWriter};
use crate::error::PackError;
use crate::incremental::{chunk_file_name, reset_chain, IncrementalSelector, Selection};
use crate::properties::IndexProperties;

/// `<prefix>.gz`
pub fn snapshot_file_name(prefix: &str) -> String {
    format!("{}.gz", prefix)
}

/// `<prefix>.properties`, the copy consumers fetch.
pub fn properties_file_name(prefix: &str) -> String {
    format!("{}.properties", prefix)
}

/// `<prefix>-packer.properties`, the copy kept beside the live index.
pub fn packer_properties_file_name(prefix: &str) -> String {
    format!("{}-packer.properties", prefix)
}

/// Options for one publish cycle.
#[derive(Debug, Clone)]
pub struct PackRequest {
    /// Live index directory (home of the authoritative properties copy)
    pub index_dir: PathBuf,
    /// Directory consumers fetch from
    pub target_dir: PathBuf,
    pub file_prefix: String,
    pub create_incremental_chunks: bool,
    pub create_checksum_files: bool,
    /// Read prior state from the target copy instead of the index-side copy
    pub use_target_properties: bool,
    pub write_full_snapshot: bool,
    pub max_chunks: usize,
}

impl PackRequest {
    pub fn new(index_dir: impl Into<PathBuf>, target_dir: impl Into<PathBuf>) -> Self {
        Self {
            index_dir: index_dir.into(),
            target_dir: target_dir.into(),
            file_prefix: index_types::config::DEFAULT_FILE_PREFIX.to_string(),
            create_incremental_chunks: true,
            create_checksum_files: false,
            use_target_properties: false,
            write_full_snapshot: true,
            max_chunks: index_types::config::DEFAULT_MAX_CHUNKS,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            index_dir: settings.expanded_index_path(),
            target_dir: settings.expanded_target_dir(),
            file_prefix: settings.file_prefix.clone(),
            create_incremental_chunks: settings.create_incremental_chunks,
            create_checksum_files: settings.create_checksum_files,
            use_target_properties: settings.use_target_properties,
            write_full_snapshot: true,
            max_chunks: settings.max_chunks,
        }
    }

    pub fn with_file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.file_prefix = prefix.into();
        self
    }

    pub fn with_incremental_chunks(mut self, enabled: bool) -> Self {
        self.create_incremental_chunks = enabled;
        self
    }

    pub fn with_checksum_files(mut self, enabled: bool) -> Self {
        self.create_checksum_files = enabled;
        self
    }

    pub fn with_target_properties(mut self, enabled: bool) -> Self {
        self.use_target_properties = enabled;
        self
    }

    pub fn with_full_snapshot(mut self, enabled: bool) -> Self {
        self.write_full_snapshot = enabled;
        self
    }

    pub fn with_max_chunks(mut self, max_chunks: usize) -> Self {
        self.max_chunks = max_chunks;
        self
    }

    pub fn target_properties_path(&self) -> PathBuf {
        self.target_dir.join(properties_file_name(&self.file_prefix))
    }

    pub fn index_properties_path(&self) -> PathBuf {
        self.index_dir
            .join(packer_properties_file_name(&self.file_prefix))
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.target_dir.join(snapshot_file_name(&self.file_prefix))
    }
}

/// What a publish cycle produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackResult {
    /// Chunk written this cycle, if any
    pub chunk: Option<PathBuf>,
    /// Artifact records in the chunk
    pub chunk_records: usize,
    pub snapshot: Option<PathBuf>,
    /// Artifact records in the full snapshot
    pub snapshot_records: usize,
    pub chain_id: Option<String>,
    pub counter: Option<u64>,
    /// Stored metadata was invalid and a new chain started
    pub regenerated: bool,
    /// Stale chunk files deleted by cleanup
    pub removed_chunks: Vec<PathBuf>,
}

/// Run one publish cycle.
///
/// Only a bad target directory or a failed write of published bytes is an
/// error. Unreadable prior metadata degrades to a regenerated chain.
pub fn pack(
    request: &PackRequest,
    accessor: &dyn SnapshotAccessor,
) -> Result<PackResult, PackError> {
    validate_target_dir(&request.target_dir)?;

    let props_path = if request.use_target_properties {
        request.target_properties_path()
    } else {
        request.index_properties_path()
    };
    let mut props = match IndexProperties::load(&props_path) {
        Ok(Some(props)) => props,
        Ok(None) => IndexProperties::new(),
        Err(e) => {
            warn!(path = ?props_path, error = %e, "Unreadable publish properties, regenerating");
            IndexProperties::new()
        }
    };

    let state_timestamp = accessor.timestamp();
    let header = Header::new(state_timestamp);
    let all_groups = accessor.all_groups()?;
    let root_groups = accessor.root_groups()?;

    let mut result = PackResult::default();
    let selector = IncrementalSelector::new(&request.file_prefix, request.max_chunks);

    if request.create_incremental_chunks {
        match selector.select(&mut props, accessor) {
            Ok(Selection::Regenerate) => result.regenerated = true,
            Ok(Selection::Delta(ids)) if !ids.is_empty() => {
                let sequence = props.counter.unwrap_or_default();
                let path = request
                    .target_dir
                    .join(chunk_file_name(&request.file_prefix, sequence));
                let ids: HashSet<RecordId> = ids.into_iter().collect();
                let count = write_index_file(
                    &path,
                    &header,
                    None,
                    accessor,
                    |id| ids.contains(&id),
                    &all_groups,
                    &root_groups,
                )?;
                info!(path = ?path, records = count, sequence, "Wrote incremental chunk");
                if request.create_checksum_files {
                    write_checksum_files(&path)?;
                }
                result.chunk = Some(path);
                result.chunk_records = count;
            }
            Ok(Selection::Delta(_)) => {}
            Err(e) => {
                warn!(error = %e, "Selecting changed records failed, regenerating");
                reset_chain(&mut props);
                result.regenerated = true;
            }
        }
    }

    if request.write_full_snapshot {
        let path = request.snapshot_path();
        let count = write_index_file(
            &path,
            &header,
            Some(accessor.index_id()),
            accessor,
            |_| true,
            &all_groups,
            &root_groups,
        )?;
        info!(path = ?path, records = count, "Wrote full snapshot");
        if request.create_checksum_files {
            write_checksum_files(&path)?;
        }
        result.snapshot = Some(path);
        result.snapshot_records = count;

        // deltas are taken against the state the snapshot holds; epoch marks
        // an index that was never updated
        props.timestamp = Some(state_timestamp.unwrap_or_else(DateTime::<Utc>::default));
    }

    props.index_id = Some(accessor.index_id().to_string());

    props.save(&request.index_properties_path())?;
    let target_props = request.target_properties_path();
    props.save(&target_props)?;
    if request.create_checksum_files {
        write_checksum_files(&target_props)?;
    }

    result.removed_chunks = selector.collect_garbage(&request.target_dir, &props);
    result.chain_id = props.chain_id.clone();
    result.counter = props.counter;

    info!(
        chain_id = ?result.chain_id,
        counter = ?result.counter,
        regenerated = result.regenerated,
        "Publish cycle complete"
    );
    Ok(result)
}

fn validate_target_dir(dir: &Path) -> Result<(), PackError> {
    if dir.exists() {
        if !dir.is_dir() {
            return Err(PackError::InvalidArgument(format!(
                "target {} exists and is not a directory",
                dir.display()
            )));
        }
        // permission bits alone do not tell whether this process may write
        NamedTempFile::new_in(dir).map_err(|e| {
            PackError::InvalidArgument(format!(
                "target directory {} is not writable: {}",
                dir.display(),
                e
            ))
        })?;
    } else {
        fs::create_dir_all(dir).map_err(|e| {
            PackError::InvalidArgument(format!(
                "cannot create target directory {}: {}",
                dir.display(),
                e
            ))
        })?;
        debug!(dir = ?dir, "Created target directory");
    }
    Ok(())
}

/// Write descriptor (if given), the selected artifact records in scan order,
/// then both aggregates. Returns the number of artifact records.
fn write_index_file(
    path: &Path,
    header: &Header,
    descriptor_id: Option<&str>,
    accessor: &dyn SnapshotAccessor,
    include: impl Fn(RecordId) -> bool,
    all_groups: &BTreeSet<String>,
    root_groups: &BTreeSet<String>,
) -> Result<usize, PackError> {
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    let write = || -> Result<usize, PackError> {
        let mut writer = RecordWriter::new(gz_file_writer(File::create(&tmp)?), header)?;
        if let Some(id) = descriptor_id {
            writer.write_record(&Record::descriptor(id))?;
        }

        let mut artifacts = 0;
        for item in accessor.scan()? {
            let (id, record) = item?;
            if record.kind() != RecordKind::Artifact || !include(id) {
                continue;
            }
            writer.write_record(&record)?;
            artifacts += 1;
        }

        writer.write_record(&Record::all_groups(all_groups))?;
        writer.write_record(&Record::root_groups(root_groups))?;
        finish_gz_file(writer.finish()?)?;
        Ok(artifacts)
    };

    match write() {
        Ok(count) => {
            fs::rename(&tmp, path)?;
            Ok(count)
        }
        Err(e) => {
            let _ = fs::remove_file(&tmp);
            Err(e)
        }
    }
}
