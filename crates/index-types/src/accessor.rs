//! Read and write contracts over an index state.
//!
//! [`SnapshotAccessor`] is the read-only view the packer consumes.
//! [`RecordSink`] is the narrow surface a consumer applies decoded records to.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::error::IndexError;
use crate::record::{fields, root_group, Record, RecordId, RecordKind};

/// Forward-only pass over the live records of a snapshot.
pub type RecordScan<'a> = Box<dyn Iterator<Item = Result<(RecordId, Record), IndexError>> + 'a>;

/// Read-only view over the live records of one index state.
///
/// Enumeration order is fixed by the implementation and must be the same for
/// every call to [`SnapshotAccessor::scan`] on the same accessor.
pub trait SnapshotAccessor {
    /// Identity of the index this snapshot belongs to.
    fn index_id(&self) -> &str;

    /// Start a fresh pass over all live records.
    fn scan(&self) -> Result<RecordScan<'_>, IndexError>;

    /// Overall freshness of the index state; `None` if it was never updated.
    fn timestamp(&self) -> Option<DateTime<Utc>>;

    /// Every group id known to the index.
    fn all_groups(&self) -> Result<BTreeSet<String>, IndexError> {
        let mut groups = BTreeSet::new();
        for item in self.scan()? {
            let (_, record) = item?;
            if record.kind() != RecordKind::Artifact {
                continue;
            }
            let group = match record.get_str(fields::GROUP_ID) {
                Some(group) => group,
                None => match record.uinfo().and_then(|u| u.split('|').next()) {
                    Some(group) => group,
                    None => continue,
                },
            };
            if !group.is_empty() {
                groups.insert(group.to_string());
            }
        }
        Ok(groups)
    }

    /// Top-level segments of every known group id.
    fn root_groups(&self) -> Result<BTreeSet<String>, IndexError> {
        Ok(self
            .all_groups()?
            .iter()
            .map(|g| root_group(g).to_string())
            .collect())
    }
}

/// Target a consumer applies decoded artifact records to.
pub trait RecordSink {
    /// Drop every record (before applying a full snapshot).
    fn clear(&mut self) -> Result<(), IndexError>;

    /// Insert or replace an artifact record keyed by its `uinfo`.
    fn upsert(&mut self, record: Record) -> Result<(), IndexError>;

    /// Record the freshness of the applied state.
    fn set_timestamp(&mut self, timestamp: Option<DateTime<Utc>>) -> Result<(), IndexError>;

    /// Make applied changes durable/visible.
    fn commit(&mut self) -> Result<(), IndexError>;
}

/// In-memory index state.
///
/// Enumerates records in insertion order. Used for tests, tooling and as a
/// lightweight replica target.
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshot {
    index_id: String,
    records: Vec<Record>,
    timestamp: Option<DateTime<Utc>>,
}

impl MemorySnapshot {
    pub fn new(index_id: impl Into<String>) -> Self {
        Self {
            index_id: index_id.into(),
            records: Vec::new(),
            timestamp: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Append a record without checking for duplicates.
    pub fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, uinfo: &str) -> Option<&Record> {
        self.records.iter().find(|r| r.uinfo() == Some(uinfo))
    }
}

impl SnapshotAccessor for MemorySnapshot {
    fn index_id(&self) -> &str {
        &self.index_id
    }

    fn scan(&self) -> Result<RecordScan<'_>, IndexError> {
        Ok(Box::new(
            self.records
                .iter()
                .enumerate()
                .map(|(i, r)| Ok((RecordId(i as u64), r.clone()))),
        ))
    }

    fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }
}

impl RecordSink for MemorySnapshot {
    fn clear(&mut self) -> Result<(), IndexError> {
        self.records.clear();
        Ok(())
    }

    fn upsert(&mut self, record: Record) -> Result<(), IndexError> {
        let uinfo = record
            .uinfo()
            .ok_or_else(|| IndexError::InvalidRecord("artifact record without uinfo".into()))?
            .to_string();
        match self
            .records
            .iter_mut()
            .find(|r| r.uinfo() == Some(uinfo.as_str()))
        {
            Some(existing) => *existing = record,
            None => self.records.push(record),
        }
        Ok(())
    }

    fn set_timestamp(&mut self, timestamp: Option<DateTime<Utc>>) -> Result<(), IndexError> {
        self.timestamp = timestamp;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), IndexError> {
        Ok(())
    }
}
