//! Tantivy schema definition for artifact records.
//!
//! Only a handful of fields are indexed for lookup and search; the full
//! record is kept as stored JSON in `record`.

use tantivy::schema::{Field, Schema, FAST, INDEXED, STORED, STRING, TEXT};

use crate::SearchError;

/// Schema field handles for efficient access
#[derive(Debug, Clone)]
pub struct ArtifactSchema {
    schema: Schema,
    /// Unique artifact key (STRING | STORED), used for upserts
    pub uinfo: Field,
    /// Group id (STRING | STORED)
    pub group_id: Field,
    /// Artifact id (STRING | STORED)
    pub artifact_id: Field,
    /// Version (STRING | STORED)
    pub version: Field,
    /// Searchable text: name, description, artifact id, class names (TEXT)
    pub text: Field,
    /// Last-modified millis (INDEXED | STORED | FAST)
    pub last_modified: Field,
    /// Whole record as JSON (STORED)
    pub record: Field,
}

impl ArtifactSchema {
    /// Get the underlying Tantivy schema
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Create an ArtifactSchema from an existing Tantivy Schema
    pub fn from_schema(schema: Schema) -> Result<Self, SearchError> {
        let field = |name: &str| {
            schema
                .get_field(name)
                .map_err(|_| SearchError::SchemaMismatch(format!("missing {} field", name)))
        };

        Ok(Self {
            uinfo: field("uinfo")?,
            group_id: field("group_id")?,
            artifact_id: field("artifact_id")?,
            version: field("version")?,
            text: field("text")?,
            last_modified: field("last_modified")?,
            record: field("record")?,
            schema,
        })
    }
}

/// Build the artifact schema.
pub fn build_artifact_schema() -> ArtifactSchema {
    let mut schema_builder = Schema::builder();

    let uinfo = schema_builder.add_text_field("uinfo", STRING | STORED);
    let group_id = schema_builder.add_text_field("group_id", STRING | STORED);
    let artifact_id = schema_builder.add_text_field("artifact_id", STRING | STORED);
    let version = schema_builder.add_text_field("version", STRING | STORED);
    let text = schema_builder.add_text_field("text", TEXT);
    let last_modified = schema_builder.add_i64_field("last_modified", INDEXED | STORED | FAST);
    let record = schema_builder.add_text_field("record", STORED);

    let schema = schema_builder.build();

    ArtifactSchema {
        schema,
        uinfo,
        group_id,
        artifact_id,
        version,
        text,
        last_modified,
        record,
    }
}
