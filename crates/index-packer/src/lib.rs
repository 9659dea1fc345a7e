//! # index-packer
//!
//! Publishes an artifact index as a full snapshot plus a chain of small
//! incremental chunks, and advances consumer copies along that chain.
//!
//! Publish side:
//! - [`pack`] runs one cycle: optional chunk, full snapshot, properties,
//!   checksum sidecars and cleanup of chunks that left the retention window
//! - [`IncrementalSelector`] decides what changed and keeps the chain bookkeeping
//! - [`codec`] is the binary record format both file kinds share
//!
//! Consumer side:
//! - [`plan`] turns local and remote properties into a chunk fetch list
//! - [`IndexUpdater`] fetches, decodes and applies chunks, falling back to
//!   the full snapshot when the chain cannot be bridged
//!
//! ## Usage
//!
//! ```rust,no_run
//! use index_packer::{pack, PackRequest};
//! use index_types::{MemorySnapshot, Record};
//!
//! let mut snapshot = MemorySnapshot::new("central");
//! snapshot.push(Record::artifact("org.example|demo|1.0|NA|jar", 1_700_000_000_000));
//!
//! let request = PackRequest::new("/var/lib/index", "/srv/publish");
//! let result = pack(&request, &snapshot).unwrap();
//! println!("counter = {:?}", result.counter);
//! ```

pub mod checksum;
pub mod codec;
pub mod error;
pub mod incremental;
pub mod packer;
pub mod planner;
pub mod properties;
pub mod replica;

pub use codec::{
    decode, decode_file, decode_gz, encode, read_summary, Header, IndexDataSummary, RecordReader,
    RecordWriter,
};
pub use error::{DecodeError, EncodeError, PackError, PropertiesError};
pub use incremental::{chunk_file_name, IncrementalSelector, Selection};
pub use packer::{pack, PackRequest, PackResult};
pub use planner::{plan, plan_sequences};
pub use properties::IndexProperties;
pub use replica::{DirectoryFetcher, IndexUpdater, ResourceFetcher, UpdateOutcome, UpdateResult};
