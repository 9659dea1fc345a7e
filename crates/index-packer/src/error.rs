//! Error types for packing, decoding and planning.

use index_types::IndexError;
use thiserror::Error;

/// Errors raised while reading a record stream.
///
/// Clean end of stream is not an error; every variant here means the stream
/// cannot be trusted.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Underlying read failed for a reason other than a short read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Stream does not start with the format magic
    #[error("Bad magic: {0:#010x}")]
    BadMagic(u32),

    /// Header names a format version this build cannot read
    #[error("Unsupported format version: {0}")]
    UnsupportedVersion(u8),

    /// Stream ended inside the header or a record
    #[error("Truncated stream while reading {0}")]
    Truncated(&'static str),

    /// Field value tag is not known to this format version
    #[error("Unknown value tag {tag} for field {field}")]
    UnknownValueTag { tag: u8, field: String },

    /// Field name or string value is not valid UTF-8
    #[error("Invalid UTF-8 in {0}")]
    InvalidUtf8(&'static str),

    /// Same field name appears twice in one record
    #[error("Duplicate field {0} in record")]
    DuplicateField(String),
}

/// Errors raised while writing a record stream.
#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Field name does not fit the u16 length prefix
    #[error("Field name too long: {0} bytes")]
    FieldNameTooLong(usize),

    /// Record has more fields than the u16 count prefix allows
    #[error("Too many fields in record: {0}")]
    TooManyFields(usize),

    /// String value or list does not fit the u32 length prefix
    #[error("Value too long in field {0}")]
    ValueTooLong(String),
}

/// Errors raised while reading the properties text format.
#[derive(Error, Debug)]
pub enum PropertiesError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed `\uXXXX` escape
    #[error("Malformed \\u escape on line {0}")]
    InvalidEscape(usize),
}

/// Errors surfaced by a publish or update cycle.
#[derive(Error, Debug)]
pub enum PackError {
    /// Precondition violation (bad target directory and the like)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Writing published files failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Properties error: {0}")]
    Properties(#[from] PropertiesError),

    /// Snapshot accessor or record sink failed
    #[error("Index error: {0}")]
    Index(#[from] IndexError),
}
