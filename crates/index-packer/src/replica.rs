//! Consumer side: bring a local index copy up to date from a publisher.
//!
//! Transport is abstracted behind [`ResourceFetcher`]. The update first tries
//! the incremental plan; any chunk that cannot be fetched or decoded drops the
//! whole update to a full fetch of `<prefix>.gz`.
//!
//! A publisher may skip the full snapshot for some cycles, so the snapshot can
//! be older than the advertised chunks. A full fetch therefore replays the
//! advertised chunks on top of it and records only the state it really holds.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use index_types::{Record, RecordKind, RecordSink};

use crate::codec::decode_gz;
use crate::error::PackError;
use crate::incremental::chunk_file_name;
use crate::packer::{properties_file_name, snapshot_file_name};
use crate::planner::plan_sequences;
use crate::properties::IndexProperties;

/// Fetches published files by name.
pub trait ResourceFetcher {
    fn retrieve(&self, name: &str) -> io::Result<Box<dyn Read + '_>>;
}

/// Reads published files from a local directory.
#[derive(Debug, Clone)]
pub struct DirectoryFetcher {
    root: PathBuf,
}

impl DirectoryFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ResourceFetcher for DirectoryFetcher {
    fn retrieve(&self, name: &str) -> io::Result<Box<dyn Read + '_>> {
        let file = File::open(self.root.join(name))?;
        Ok(Box::new(BufReader::new(file)))
    }
}

/// How an update brought the local copy forward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    UpToDate,
    Incremental { chunks: usize, records: usize },
    Full { records: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateResult {
    pub outcome: UpdateOutcome,
    pub chain_id: Option<String>,
    pub counter: Option<u64>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Applies published snapshots and chunks to a [`RecordSink`].
pub struct IndexUpdater<F: ResourceFetcher> {
    fetcher: F,
    file_prefix: String,
}

impl<F: ResourceFetcher> IndexUpdater<F> {
    pub fn new(fetcher: F, file_prefix: impl Into<String>) -> Self {
        Self {
            fetcher,
            file_prefix: file_prefix.into(),
        }
    }

    /// Fetch and parse the publisher's properties.
    pub fn remote_properties(&self) -> Result<IndexProperties, PackError> {
        let mut text = String::new();
        self.fetcher
            .retrieve(&properties_file_name(&self.file_prefix))?
            .read_to_string(&mut text)?;
        Ok(IndexProperties::parse(&text)?)
    }

    /// Run one update against `sink`, persisting progress at
    /// `local_properties_path`.
    pub fn update(
        &self,
        sink: &mut dyn RecordSink,
        local_properties_path: &Path,
    ) -> Result<UpdateResult, PackError> {
        let remote = self.remote_properties()?;
        let local = match IndexProperties::load(local_properties_path) {
            Ok(local) => local,
            Err(e) => {
                warn!(path = ?local_properties_path, error = %e, "Unreadable local properties, ignoring");
                None
            }
        };

        if let Some(local) = &local {
            if is_up_to_date(local, &remote) {
                info!("Local index is up to date");
                return Ok(result(UpdateOutcome::UpToDate, local));
            }
        }

        if let Some(sequences) = plan_sequences(local.as_ref(), &remote) {
            let mut progress = local.clone().unwrap_or_default();
            match self.apply_chunks(sink, &sequences, &mut progress, local_properties_path) {
                Ok(records) => {
                    sink.set_timestamp(remote.timestamp)?;
                    sink.commit()?;
                    remote.save(local_properties_path)?;
                    info!(chunks = sequences.len(), records, "Applied incremental update");
                    return Ok(result(
                        UpdateOutcome::Incremental {
                            chunks: sequences.len(),
                            records,
                        },
                        &remote,
                    ));
                }
                Err(e) => {
                    warn!(error = %e, "Incremental update failed, falling back to full fetch");
                }
            }
        } else {
            debug!("No incremental plan, full fetch");
        }

        let (records, local) = self.apply_full(sink, &remote)?;
        local.save(local_properties_path)?;
        info!(records, counter = ?local.counter, "Applied full index");
        Ok(result(UpdateOutcome::Full { records }, &local))
    }

    /// Fetch and fully decode one chunk.
    fn fetch_chunk(&self, sequence: u64) -> Result<Vec<Record>, PackError> {
        let name = chunk_file_name(&self.file_prefix, sequence);
        let records = decode_gz(self.fetcher.retrieve(&name)?)?
            .collect::<Result<Vec<Record>, _>>()?;
        Ok(records)
    }

    fn apply_chunks(
        &self,
        sink: &mut dyn RecordSink,
        sequences: &[u64],
        progress: &mut IndexProperties,
        local_properties_path: &Path,
    ) -> Result<usize, PackError> {
        // intermediate commits keep the freshness the local copy already had
        sink.set_timestamp(progress.timestamp)?;

        let mut applied = 0;
        for &sequence in sequences {
            // decode the whole chunk before touching the sink
            let records = self.fetch_chunk(sequence)?;

            for record in records {
                if record.kind() == RecordKind::Artifact {
                    sink.upsert(record)?;
                    applied += 1;
                }
            }
            sink.commit()?;

            progress.counter = Some(sequence);
            progress.save(local_properties_path)?;
            debug!(sequence, "Applied chunk");
        }
        Ok(applied)
    }

    /// Replace the sink contents with the full snapshot, then replay the
    /// advertised chunks past it. Returns the applied count and the local
    /// properties describing what the sink now holds.
    fn apply_full(
        &self,
        sink: &mut dyn RecordSink,
        remote: &IndexProperties,
    ) -> Result<(usize, IndexProperties), PackError> {
        let reader = decode_gz(self.fetcher.retrieve(&snapshot_file_name(&self.file_prefix))?)?;
        let snapshot_timestamp = reader.header().timestamp;
        // a never-updated index is published with the epoch
        let since = snapshot_timestamp.unwrap_or_default();
        sink.clear()?;

        let mut applied = 0;
        for record in reader {
            let record = record?;
            match record.kind() {
                RecordKind::Artifact => {
                    sink.upsert(record)?;
                    applied += 1;
                }
                RecordKind::Unknown => debug!("Skipping record without markers"),
                _ => {}
            }
        }

        let caught_up = match self.catch_up(sink, remote, since) {
            Ok(records) => {
                applied += records;
                true
            }
            Err(e) => {
                warn!(error = %e, "Replaying chunks past the snapshot failed");
                false
            }
        };
        sink.set_timestamp(snapshot_timestamp)?;
        sink.commit()?;

        let mut local = remote.clone();
        local.timestamp = Some(since);
        if !caught_up || remote.timestamp != Some(since) {
            // position in the chain unknown, the next update fetches in full
            local.counter = None;
        }
        Ok((applied, local))
    }

    /// Apply artifact records from every advertised chunk that changed after
    /// `since`, oldest chunk first.
    fn catch_up(
        &self,
        sink: &mut dyn RecordSink,
        remote: &IndexProperties,
        since: DateTime<Utc>,
    ) -> Result<usize, PackError> {
        let mut sequences: Vec<u64> = remote.chunk_sequences().collect();
        sequences.sort_unstable();
        let since_ms = since.timestamp_millis();

        let mut applied = 0;
        for sequence in sequences {
            for record in self.fetch_chunk(sequence)? {
                let newer = record.last_modified().map_or(false, |lm| lm > since_ms);
                if record.kind() == RecordKind::Artifact && newer {
                    sink.upsert(record)?;
                    applied += 1;
                }
            }
        }
        if applied > 0 {
            debug!(records = applied, "Replayed chunk records past the snapshot");
        }
        Ok(applied)
    }
}

fn is_up_to_date(local: &IndexProperties, remote: &IndexProperties) -> bool {
    let same_chain = matches!(
        (&local.chain_id, &remote.chain_id),
        (Some(l), Some(r)) if l == r
    );
    // a publish without a snapshot advances the counter but not the timestamp
    let counter_current = match (local.counter, remote.counter) {
        (Some(l), Some(r)) => l >= r,
        (_, None) => true,
        (None, Some(_)) => false,
    };
    match (local.timestamp, remote.timestamp) {
        (Some(l), Some(r)) => same_chain && counter_current && l >= r,
        _ => false,
    }
}

fn result(outcome: UpdateOutcome, props: &IndexProperties) -> UpdateResult {
    UpdateResult {
        outcome,
        chain_id: props.chain_id.clone(),
        counter: props.counter,
        timestamp: props.timestamp,
    }
}
