//! Mapping between artifact records and Tantivy documents.

use tantivy::schema::Value;
use tantivy::TantivyDocument;

use index_types::{fields, Record, RecordKind};

use crate::error::SearchError;
use crate::schema::ArtifactSchema;

/// Convert an artifact record to a Tantivy document.
///
/// Text field contains: artifact id + name + description + class names.
pub fn record_to_doc(schema: &ArtifactSchema, record: &Record) -> Result<TantivyDocument, SearchError> {
    if record.kind() != RecordKind::Artifact {
        return Err(SearchError::InvalidRecord(format!(
            "only artifact records are stored, got {}",
            record.kind()
        )));
    }
    let uinfo = record.uinfo().unwrap_or_default();
    let last_modified = record
        .last_modified()
        .map_err(|e| SearchError::InvalidRecord(e.to_string()))?;

    // uinfo is group|artifact|version|classifier|extension
    let parts: Vec<&str> = uinfo.split('|').collect();
    let coordinate = |name: &str, pos: usize| {
        record
            .get_str(name)
            .or_else(|| parts.get(pos).copied())
            .unwrap_or_default()
    };
    let group_id = coordinate(fields::GROUP_ID, 0);
    let artifact_id = coordinate(fields::ARTIFACT_ID, 1);
    let version = coordinate(fields::VERSION, 2);

    let mut doc = TantivyDocument::default();
    doc.add_text(schema.uinfo, uinfo);
    doc.add_text(schema.group_id, group_id);
    doc.add_text(schema.artifact_id, artifact_id);
    doc.add_text(schema.version, version);
    doc.add_text(schema.text, extract_text(record));
    doc.add_i64(schema.last_modified, last_modified);
    doc.add_text(schema.record, serde_json::to_string(record)?);
    Ok(doc)
}

/// Rebuild the record stored in a document.
pub fn record_from_doc(schema: &ArtifactSchema, doc: &TantivyDocument) -> Result<Record, SearchError> {
    let json = doc
        .get_first(schema.record)
        .and_then(|v| v.as_str())
        .ok_or_else(|| SearchError::InvalidRecord("document has no stored record".into()))?;
    Ok(serde_json::from_str(json)?)
}

/// Searchable text of an artifact record.
pub fn extract_text(record: &Record) -> String {
    let mut parts = Vec::new();
    for name in [fields::ARTIFACT_ID, fields::NAME, fields::DESCRIPTION] {
        if let Some(value) = record.get_str(name) {
            parts.push(value.to_string());
        }
    }
    if let Some(classes) = record.get_list(fields::CLASSNAMES) {
        parts.extend(classes.iter().cloned());
    }
    parts.join(" ")
}
