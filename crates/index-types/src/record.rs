//! Record model for the artifact index.
//!
//! A record is an ordered dictionary of named, typed values. Three kinds
//! exist and are told apart only by the marker fields they carry:
//! - descriptor: `descriptor` + `index-info`
//! - aggregates: `all-groups` / `root-groups` with their `*-list` payloads
//! - artifacts: `uinfo` + `last-modified`

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::IndexError;

/// Field names that make up wire format version 1.
pub mod fields {
    /// Marker of the descriptor record.
    pub const DESCRIPTOR: &str = "descriptor";
    /// Value carried by the descriptor marker.
    pub const DESCRIPTOR_VALUE: &str = "ArtifactIndex";
    /// `<format version>|<index id>`
    pub const INDEX_INFO: &str = "index-info";
    /// Format version written into `index-info`.
    pub const INDEX_INFO_VERSION: &str = "1";

    pub const ALL_GROUPS: &str = "all-groups";
    pub const ALL_GROUPS_LIST: &str = "all-groups-list";
    pub const ROOT_GROUPS: &str = "root-groups";
    pub const ROOT_GROUPS_LIST: &str = "root-groups-list";

    /// Unique artifact key: `group|artifact|version|classifier|extension`.
    pub const UINFO: &str = "uinfo";
    /// Epoch millis of the last change to the artifact record.
    pub const LAST_MODIFIED: &str = "last-modified";

    pub const GROUP_ID: &str = "group-id";
    pub const ARTIFACT_ID: &str = "artifact-id";
    pub const VERSION: &str = "version";
    pub const CLASSIFIER: &str = "classifier";
    pub const EXTENSION: &str = "extension";
    pub const PACKAGING: &str = "packaging";
    pub const NAME: &str = "name";
    pub const DESCRIPTION: &str = "description";
    pub const SHA1: &str = "sha1";
    pub const SIZE: &str = "size";
    pub const CLASSNAMES: &str = "classnames";

    /// Placeholder used in `uinfo` when an artifact has no classifier.
    pub const NOT_AVAILABLE: &str = "NA";
}

/// A typed field value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Str(String),
    Long(i64),
    Bool(bool),
    List(Vec<String>),
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            FieldValue::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            FieldValue::List(v) => Some(v),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Str(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Str(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Long(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(value: Vec<String>) -> Self {
        FieldValue::List(value)
    }
}

/// One named value inside a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub value: FieldValue,
}

/// Kind of a record, derived from its marker fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Descriptor,
    AllGroups,
    RootGroups,
    Artifact,
    /// Carries none of the known markers.
    Unknown,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Descriptor => "descriptor",
            RecordKind::AllGroups => "all_groups",
            RecordKind::RootGroups => "root_groups",
            RecordKind::Artifact => "artifact",
            RecordKind::Unknown => "unknown",
        }
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self, RecordKind::AllGroups | RecordKind::RootGroups)
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position of a record inside one accessor's enumeration.
///
/// Only meaningful for the accessor that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(pub u64);

/// Sparse, ordered field dictionary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    fields: Vec<Field>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Artifact record with its two mandatory fields.
    pub fn artifact(uinfo: impl Into<String>, last_modified_ms: i64) -> Self {
        Self::new()
            .with(fields::UINFO, uinfo.into())
            .with(fields::LAST_MODIFIED, last_modified_ms)
    }

    /// Descriptor record for the given index id.
    pub fn descriptor(index_id: &str) -> Self {
        Self::new()
            .with(fields::DESCRIPTOR, fields::DESCRIPTOR_VALUE)
            .with(
                fields::INDEX_INFO,
                format!("{}|{}", fields::INDEX_INFO_VERSION, index_id),
            )
    }

    /// Aggregate record listing every group id.
    pub fn all_groups(groups: &BTreeSet<String>) -> Self {
        Self::new()
            .with(fields::ALL_GROUPS, fields::ALL_GROUPS)
            .with(
                fields::ALL_GROUPS_LIST,
                groups.iter().cloned().collect::<Vec<_>>(),
            )
    }

    /// Aggregate record listing every top-level group id.
    pub fn root_groups(groups: &BTreeSet<String>) -> Self {
        Self::new()
            .with(fields::ROOT_GROUPS, fields::ROOT_GROUPS)
            .with(
                fields::ROOT_GROUPS_LIST,
                groups.iter().cloned().collect::<Vec<_>>(),
            )
    }

    /// Builder form of [`Record::set`].
    pub fn with(mut self, name: &str, value: impl Into<FieldValue>) -> Self {
        self.set(name, value);
        self
    }

    /// Set a field, replacing an existing value in place.
    pub fn set(&mut self, name: &str, value: impl Into<FieldValue>) {
        let value = value.into();
        match self.fields.iter_mut().find(|f| f.name == name) {
            Some(field) => field.value = value,
            None => self.fields.push(Field {
                name: name.to_string(),
                value,
            }),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<FieldValue> {
        let pos = self.fields.iter().position(|f| f.name == name)?;
        Some(self.fields.remove(pos).value)
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FieldValue::as_str)
    }

    pub fn get_long(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(FieldValue::as_long)
    }

    pub fn get_list(&self, name: &str) -> Option<&[String]> {
        self.get(name).and_then(FieldValue::as_list)
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Classify by marker presence, never by position.
    pub fn kind(&self) -> RecordKind {
        if self.contains(fields::DESCRIPTOR) {
            RecordKind::Descriptor
        } else if self.contains(fields::ALL_GROUPS) {
            RecordKind::AllGroups
        } else if self.contains(fields::ROOT_GROUPS) {
            RecordKind::RootGroups
        } else if self.contains(fields::UINFO) {
            RecordKind::Artifact
        } else {
            RecordKind::Unknown
        }
    }

    pub fn uinfo(&self) -> Option<&str> {
        self.get_str(fields::UINFO)
    }

    /// Last-modified millis of an artifact record.
    pub fn last_modified(&self) -> Result<i64, IndexError> {
        self.get_long(fields::LAST_MODIFIED).ok_or_else(|| {
            IndexError::InvalidRecord(format!(
                "record {} has no numeric {} field",
                self.uinfo().unwrap_or("<no uinfo>"),
                fields::LAST_MODIFIED
            ))
        })
    }

    /// Index id carried by a descriptor record.
    pub fn descriptor_index_id(&self) -> Option<&str> {
        self.get_str(fields::INDEX_INFO)
            .and_then(|info| info.split_once('|'))
            .map(|(_, id)| id)
    }
}

/// Build the unique artifact key.
pub fn artifact_uinfo(
    group_id: &str,
    artifact_id: &str,
    version: &str,
    classifier: Option<&str>,
    extension: &str,
) -> String {
    format!(
        "{}|{}|{}|{}|{}",
        group_id,
        artifact_id,
        version,
        classifier.unwrap_or(fields::NOT_AVAILABLE),
        extension
    )
}

/// Top-level segment of a group id (`org.apache.maven` → `org`).
pub fn root_group(group_id: &str) -> &str {
    group_id.split('.').next().unwrap_or(group_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_by_marker() {
        assert_eq!(Record::descriptor("central").kind(), RecordKind::Descriptor);
        assert_eq!(
            Record::all_groups(&BTreeSet::new()).kind(),
            RecordKind::AllGroups
        );
        assert_eq!(
            Record::root_groups(&BTreeSet::new()).kind(),
            RecordKind::RootGroups
        );
        assert_eq!(Record::artifact("a|b|1|NA|jar", 1).kind(), RecordKind::Artifact);
        assert_eq!(
            Record::new().with("something", "else").kind(),
            RecordKind::Unknown
        );
    }

    #[test]
    fn test_set_replaces_in_place() {
        let mut record = Record::new().with("a", "1").with("b", 2i64);
        record.set("a", "changed");
        assert_eq!(record.len(), 2);
        assert_eq!(record.fields()[0].name, "a");
        assert_eq!(record.get_str("a"), Some("changed"));
        assert_eq!(record.get_long("b"), Some(2));
    }

    #[test]
    fn test_remove() {
        let mut record = Record::new().with("a", true);
        assert_eq!(record.remove("a"), Some(FieldValue::Bool(true)));
        assert!(record.is_empty());
        assert_eq!(record.remove("a"), None);
    }

    #[test]
    fn test_last_modified_missing() {
        let record = Record::new().with(fields::UINFO, "x|y|1|NA|jar");
        assert!(record.last_modified().is_err());
        let record = Record::artifact("x|y|1|NA|jar", 42);
        assert_eq!(record.last_modified().unwrap(), 42);
    }

    #[test]
    fn test_descriptor_index_id() {
        let record = Record::descriptor("central");
        assert_eq!(record.descriptor_index_id(), Some("central"));
        assert_eq!(record.get_str(fields::INDEX_INFO), Some("1|central"));
    }

    #[test]
    fn test_artifact_uinfo() {
        assert_eq!(
            artifact_uinfo("org.example", "demo", "1.0", None, "jar"),
            "org.example|demo|1.0|NA|jar"
        );
        assert_eq!(
            artifact_uinfo("org.example", "demo", "1.0", Some("sources"), "jar"),
            "org.example|demo|1.0|sources|jar"
        );
    }

    #[test]
    fn test_root_group() {
        assert_eq!(root_group("org.apache.maven"), "org");
        assert_eq!(root_group("junit"), "junit");
    }

    #[test]
    fn test_json_roundtrip() {
        let record = Record::artifact("g|a|1|NA|jar", 7)
            .with(fields::CLASSNAMES, vec!["A".to_string(), "B".to_string()])
            .with("signed", false);
        let json = serde_json::to_string(&record).unwrap();
        let decoded: Record = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, record);
    }
}
