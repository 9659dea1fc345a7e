//! # index-types
//!
//! Shared domain types for the artifact index.
//!
//! This crate defines the data structures every other crate agrees on:
//! - Records: sparse, ordered field dictionaries (artifact, descriptor, aggregate)
//! - Accessors: the read contract over a live index state and the write
//!   contract a consumer applies decoded records to
//! - Settings: layered configuration
//!
//! ## Usage
//!
//! ```rust
//! use index_types::{fields, Record, RecordKind};
//!
//! let record = Record::artifact("org.example|demo|1.0|NA|jar", 1_700_000_000_000)
//!     .with(fields::GROUP_ID, "org.example");
//! assert_eq!(record.kind(), RecordKind::Artifact);
//! ```

pub mod accessor;
pub mod config;
pub mod error;
pub mod record;

pub use accessor::{MemorySnapshot, RecordScan, RecordSink, SnapshotAccessor};
pub use config::Settings;
pub use error::IndexError;
pub use record::{
    artifact_uinfo, fields, root_group, Field, FieldValue, Record, RecordId, RecordKind,
};
