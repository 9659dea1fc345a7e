//! Binary transfer format for snapshots and chunks.
//!
//! A file is one gzip stream holding a fixed header followed by records until
//! end of stream. All integers are big-endian.
//!
//! ```text
//! header   magic u32 ("AIDX") | version u8 | timestamp i64 (millis, -1 = none)
//! record   field_count u16 | field*
//! field    name_len u16 | name | tag u8 | value
//! value    1 Str  = len u32 | utf-8
//!          2 Long = i64
//!          3 Bool = u8
//!          4 List = count u32 | Str*
//! ```
//!
//! Zero bytes where the next `field_count` would start is a clean end of
//! stream. A short read anywhere else is [`DecodeError::Truncated`].

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::debug;

use index_types::{fields, FieldValue, Record, RecordKind};

use crate::error::{DecodeError, EncodeError};

/// `"AIDX"`
pub const MAGIC: u32 = 0x4149_4458;
pub const FORMAT_VERSION: u8 = 1;

const TAG_STR: u8 = 1;
const TAG_LONG: u8 = 2;
const TAG_BOOL: u8 = 3;
const TAG_LIST: u8 = 4;

const NO_TIMESTAMP: i64 = -1;

/// Stream header, always first in the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: u8,
    /// Freshness of the index state the stream was taken from
    pub timestamp: Option<DateTime<Utc>>,
}

impl Header {
    pub fn new(timestamp: Option<DateTime<Utc>>) -> Self {
        Self {
            version: FORMAT_VERSION,
            timestamp,
        }
    }
}

/// Writes a header then records in caller order.
pub struct RecordWriter<W: Write> {
    out: W,
    records_written: usize,
}

impl<W: Write> RecordWriter<W> {
    /// Create a writer and emit the header.
    pub fn new(mut out: W, header: &Header) -> Result<Self, EncodeError> {
        out.write_all(&MAGIC.to_be_bytes())?;
        out.write_all(&[header.version])?;
        let millis = header
            .timestamp
            .map(|ts| ts.timestamp_millis())
            .unwrap_or(NO_TIMESTAMP);
        out.write_all(&millis.to_be_bytes())?;
        Ok(Self {
            out,
            records_written: 0,
        })
    }

    pub fn write_record(&mut self, record: &Record) -> Result<(), EncodeError> {
        let count =
            u16::try_from(record.len()).map_err(|_| EncodeError::TooManyFields(record.len()))?;
        self.out.write_all(&count.to_be_bytes())?;

        for field in record.fields() {
            let name_len = u16::try_from(field.name.len())
                .map_err(|_| EncodeError::FieldNameTooLong(field.name.len()))?;
            self.out.write_all(&name_len.to_be_bytes())?;
            self.out.write_all(field.name.as_bytes())?;

            match &field.value {
                FieldValue::Str(s) => {
                    self.out.write_all(&[TAG_STR])?;
                    self.write_str(&field.name, s)?;
                }
                FieldValue::Long(v) => {
                    self.out.write_all(&[TAG_LONG])?;
                    self.out.write_all(&v.to_be_bytes())?;
                }
                FieldValue::Bool(v) => {
                    self.out.write_all(&[TAG_BOOL, u8::from(*v)])?;
                }
                FieldValue::List(items) => {
                    self.out.write_all(&[TAG_LIST])?;
                    let count = u32::try_from(items.len())
                        .map_err(|_| EncodeError::ValueTooLong(field.name.clone()))?;
                    self.out.write_all(&count.to_be_bytes())?;
                    for item in items {
                        self.write_str(&field.name, item)?;
                    }
                }
            }
        }

        self.records_written += 1;
        Ok(())
    }

    fn write_str(&mut self, field: &str, value: &str) -> Result<(), EncodeError> {
        let len =
            u32::try_from(value.len()).map_err(|_| EncodeError::ValueTooLong(field.to_string()))?;
        self.out.write_all(&len.to_be_bytes())?;
        self.out.write_all(value.as_bytes())?;
        Ok(())
    }

    pub fn records_written(&self) -> usize {
        self.records_written
    }

    /// Flush and hand back the underlying writer.
    pub fn finish(mut self) -> Result<W, EncodeError> {
        self.out.flush()?;
        Ok(self.out)
    }
}

/// Lazy, forward-only record sequence over a decoded stream.
///
/// Yields `None` at clean end of stream. After the first error the reader is
/// fused and yields nothing more.
pub struct RecordReader<R: Read> {
    input: R,
    header: Header,
    done: bool,
}

impl<R: Read> RecordReader<R> {
    /// Read and validate the header.
    pub fn new(mut input: R) -> Result<Self, DecodeError> {
        let magic = u32::from_be_bytes(read_array(&mut input, "header")?);
        if magic != MAGIC {
            return Err(DecodeError::BadMagic(magic));
        }
        let [version]: [u8; 1] = read_array(&mut input, "header")?;
        if version != FORMAT_VERSION {
            return Err(DecodeError::UnsupportedVersion(version));
        }
        let millis = i64::from_be_bytes(read_array(&mut input, "header")?);
        let timestamp = if millis == NO_TIMESTAMP {
            None
        } else {
            Utc.timestamp_millis_opt(millis).single()
        };

        Ok(Self {
            input,
            header: Header { version, timestamp },
            done: false,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    fn read_record(&mut self) -> Result<Option<Record>, DecodeError> {
        // first byte decides between clean EOF and a record
        let mut first = [0u8; 1];
        loop {
            match self.input.read(&mut first) {
                Ok(0) => return Ok(None),
                Ok(_) => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(short_read(e, "record")),
            }
        }
        let [second]: [u8; 1] = read_array(&mut self.input, "record")?;
        let field_count = u16::from_be_bytes([first[0], second]);

        let mut record = Record::new();
        for _ in 0..field_count {
            let name_len = u16::from_be_bytes(read_array(&mut self.input, "field name")?);
            let name = read_string(&mut self.input, name_len as u64, "field name")?;
            if record.contains(&name) {
                return Err(DecodeError::DuplicateField(name));
            }
            let [tag]: [u8; 1] = read_array(&mut self.input, "field value")?;
            let value = match tag {
                TAG_STR => FieldValue::Str(read_len_prefixed(&mut self.input)?),
                TAG_LONG => FieldValue::Long(i64::from_be_bytes(read_array(
                    &mut self.input,
                    "field value",
                )?)),
                TAG_BOOL => {
                    let [b]: [u8; 1] = read_array(&mut self.input, "field value")?;
                    FieldValue::Bool(b != 0)
                }
                TAG_LIST => {
                    let count = u32::from_be_bytes(read_array(&mut self.input, "field value")?);
                    let mut items = Vec::new();
                    for _ in 0..count {
                        items.push(read_len_prefixed(&mut self.input)?);
                    }
                    FieldValue::List(items)
                }
                other => {
                    return Err(DecodeError::UnknownValueTag { tag: other, field: name });
                }
            };
            record.set(&name, value);
        }
        Ok(Some(record))
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = Result<Record, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

fn read_array<const N: usize>(
    input: &mut impl Read,
    what: &'static str,
) -> Result<[u8; N], DecodeError> {
    let mut buf = [0u8; N];
    input.read_exact(&mut buf).map_err(|e| short_read(e, what))?;
    Ok(buf)
}

fn read_len_prefixed(input: &mut impl Read) -> Result<String, DecodeError> {
    let len = u32::from_be_bytes(read_array(input, "field value")?);
    read_string(input, len as u64, "field value")
}

fn read_string(input: &mut impl Read, len: u64, what: &'static str) -> Result<String, DecodeError> {
    // never trust the prefix for an allocation size
    let mut bytes = Vec::new();
    let read = input
        .take(len)
        .read_to_end(&mut bytes)
        .map_err(|e| short_read(e, what))?;
    if (read as u64) < len {
        return Err(DecodeError::Truncated(what));
    }
    String::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8(what))
}

fn short_read(e: io::Error, what: &'static str) -> DecodeError {
    if e.kind() == ErrorKind::UnexpectedEof {
        DecodeError::Truncated(what)
    } else {
        DecodeError::Io(e)
    }
}

/// Encode records as an uncompressed stream.
pub fn encode<'a, W, I>(out: W, header: &Header, records: I) -> Result<usize, EncodeError>
where
    W: Write,
    I: IntoIterator<Item = &'a Record>,
{
    let mut writer = RecordWriter::new(out, header)?;
    for record in records {
        writer.write_record(record)?;
    }
    let count = writer.records_written();
    writer.finish()?;
    Ok(count)
}

/// Open an uncompressed stream.
pub fn decode<R: Read>(input: R) -> Result<RecordReader<R>, DecodeError> {
    RecordReader::new(input)
}

/// Open a gzip-compressed stream.
pub fn decode_gz<R: Read>(input: R) -> Result<RecordReader<GzDecoder<R>>, DecodeError> {
    RecordReader::new(GzDecoder::new(input))
}

/// Open a published `.gz` file. Call again to restart from the first record.
pub fn decode_file(path: &Path) -> Result<RecordReader<GzDecoder<BufReader<File>>>, DecodeError> {
    let file = File::open(path)?;
    decode_gz(BufReader::new(file))
}

/// Gzip writer over a file, used for snapshot and chunk output.
pub fn gz_file_writer(file: File) -> GzEncoder<BufWriter<File>> {
    GzEncoder::new(BufWriter::new(file), Compression::default())
}

/// Close a gzip file writer, flushing the trailer and syncing the file.
pub fn finish_gz_file(encoder: GzEncoder<BufWriter<File>>) -> io::Result<()> {
    let buffered = encoder.finish()?;
    let file = buffered.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()
}

/// What a stream holds, by record kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexDataSummary {
    pub timestamp: Option<DateTime<Utc>>,
    /// Index id from the descriptor, if the stream has one
    pub index_id: Option<String>,
    pub artifact_count: usize,
    pub all_groups: BTreeSet<String>,
    pub root_groups: BTreeSet<String>,
    pub aggregate_count: usize,
    pub unknown_count: usize,
}

/// Decode a whole stream and summarize it.
pub fn read_summary<R: Read>(reader: RecordReader<R>) -> Result<IndexDataSummary, DecodeError> {
    let mut summary = IndexDataSummary {
        timestamp: reader.header().timestamp,
        ..Default::default()
    };

    for record in reader {
        let record = record?;
        match record.kind() {
            RecordKind::Descriptor => {
                summary.index_id = record.descriptor_index_id().map(str::to_string);
            }
            RecordKind::AllGroups => {
                summary.aggregate_count += 1;
                if let Some(list) = record.get_list(fields::ALL_GROUPS_LIST) {
                    summary.all_groups.extend(list.iter().cloned());
                }
            }
            RecordKind::RootGroups => {
                summary.aggregate_count += 1;
                if let Some(list) = record.get_list(fields::ROOT_GROUPS_LIST) {
                    summary.root_groups.extend(list.iter().cloned());
                }
            }
            RecordKind::Artifact => summary.artifact_count += 1,
            RecordKind::Unknown => summary.unknown_count += 1,
        }
    }

    debug!(
        artifacts = summary.artifact_count,
        unknown = summary.unknown_count,
        "Summarized index data"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use pretty_assertions::assert_eq;

    fn sample_records() -> Vec<Record> {
        let mut groups = BTreeSet::new();
        groups.insert("org.example".to_string());
        let mut roots = BTreeSet::new();
        roots.insert("org".to_string());

        vec![
            Record::descriptor("central"),
            Record::artifact("org.example|a|1.0|NA|jar", 1_700_000_000_000)
                .with(fields::NAME, "Example ✓")
                .with(fields::SIZE, 1024i64)
                .with("osgi", true)
                .with(fields::CLASSNAMES, vec!["A".to_string(), "B".to_string()]),
            // sparse: different field set
            Record::artifact("org.example|b|1.0|sources|jar", 1_700_000_000_001),
            Record::all_groups(&groups),
            Record::root_groups(&roots),
        ]
    }

    fn encode_to_vec(header: &Header, records: &[Record]) -> Vec<u8> {
        let mut buf = Vec::new();
        encode(&mut buf, header, records).unwrap();
        buf
    }

    #[test]
    fn test_roundtrip_preserves_order_and_fields() {
        let ts = Utc.timestamp_millis_opt(1_700_000_000_500).unwrap();
        let records = sample_records();
        let buf = encode_to_vec(&Header::new(Some(ts)), &records);

        let reader = decode(buf.as_slice()).unwrap();
        assert_eq!(reader.header().timestamp, Some(ts));
        let decoded: Vec<Record> = reader.map(|r| r.unwrap()).collect();
        assert_eq!(decoded, records);
    }

    #[test]
    fn test_empty_stream_has_no_records() {
        let buf = encode_to_vec(&Header::new(None), &[]);
        let mut reader = decode(buf.as_slice()).unwrap();
        assert_eq!(reader.header().timestamp, None);
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_bad_magic() {
        let mut buf = encode_to_vec(&Header::new(None), &sample_records());
        buf[0] = b'X';
        assert!(matches!(decode(buf.as_slice()), Err(DecodeError::BadMagic(_))));
    }

    #[test]
    fn test_unsupported_version() {
        let mut buf = encode_to_vec(&Header::new(None), &sample_records());
        buf[4] = 2;
        assert!(matches!(
            decode(buf.as_slice()),
            Err(DecodeError::UnsupportedVersion(2))
        ));
    }

    #[test]
    fn test_truncated_header() {
        let buf = encode_to_vec(&Header::new(None), &[]);
        assert!(matches!(
            decode(&buf[..7]),
            Err(DecodeError::Truncated("header"))
        ));
    }

    #[test]
    fn test_truncated_record_is_not_clean_eof() {
        let records = sample_records();
        let buf = encode_to_vec(&Header::new(None), &records);

        // every cut inside the record area is an error, never a clean end
        let full_len = buf.len();
        let header_len = 13;
        let clean: Vec<usize> = {
            let mut ends = vec![header_len];
            let mut acc = Vec::new();
            for r in &records {
                acc.push(r.clone());
                ends.push(encode_to_vec(&Header::new(None), &acc).len());
            }
            ends
        };
        for cut in header_len..full_len {
            let decoded: Vec<Result<Record, DecodeError>> =
                decode(&buf[..cut]).unwrap().collect();
            let has_error = decoded.iter().any(|r| r.is_err());
            assert_eq!(has_error, !clean.contains(&cut), "cut at {}", cut);
        }
    }

    #[test]
    fn test_reader_stops_after_error() {
        let buf = encode_to_vec(&Header::new(None), &sample_records());
        let mut reader = decode(&buf[..buf.len() - 3]).unwrap();
        let mut errors = 0;
        for item in reader.by_ref() {
            if item.is_err() {
                errors += 1;
            }
        }
        assert_eq!(errors, 1);
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_unknown_tag() {
        let mut buf = Vec::new();
        let mut writer = RecordWriter::new(&mut buf, &Header::new(None)).unwrap();
        writer
            .write_record(&Record::new().with("flag", true))
            .unwrap();
        writer.finish().unwrap();
        // header 13 + count 2 + name_len 2 + "flag" 4 → tag byte
        buf[21] = 9;

        let result: Vec<_> = decode(buf.as_slice()).unwrap().collect();
        assert!(matches!(
            result[0],
            Err(DecodeError::UnknownValueTag { tag: 9, .. })
        ));
    }

    #[test]
    fn test_duplicate_field_is_rejected() {
        let mut buf = encode_to_vec(&Header::new(None), &[]);
        buf.extend_from_slice(&2u16.to_be_bytes());
        for value in ["first", "second"] {
            buf.extend_from_slice(&1u16.to_be_bytes());
            buf.push(b'k');
            buf.push(TAG_STR);
            buf.extend_from_slice(&(value.len() as u32).to_be_bytes());
            buf.extend_from_slice(value.as_bytes());
        }

        let result: Vec<_> = decode(buf.as_slice()).unwrap().collect();
        assert_eq!(result.len(), 1);
        assert!(matches!(&result[0], Err(DecodeError::DuplicateField(name)) if name == "k"));
    }

    #[test]
    fn test_invalid_utf8() {
        let mut buf = Vec::new();
        encode(&mut buf, &Header::new(None), &[Record::new().with("k", "vv")]).unwrap();
        let last = buf.len() - 1;
        buf[last] = 0xff;
        let result: Vec<_> = decode(buf.as_slice()).unwrap().collect();
        assert!(matches!(result[0], Err(DecodeError::InvalidUtf8(_))));
    }

    #[test]
    fn test_huge_length_prefix_is_truncation() {
        let mut buf = Vec::new();
        encode(&mut buf, &Header::new(None), &[Record::new().with("k", "v")]).unwrap();
        // rewrite the string length prefix (after header, count, name) to u32::MAX
        let at = 13 + 2 + 2 + 1 + 1;
        buf[at..at + 4].copy_from_slice(&u32::MAX.to_be_bytes());
        let result: Vec<_> = decode(buf.as_slice()).unwrap().collect();
        assert!(matches!(result[0], Err(DecodeError::Truncated(_))));
    }

    #[test]
    fn test_gzip_file_restartable() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("data.gz");
        let records = sample_records();

        let encoder = gz_file_writer(File::create(&path).unwrap());
        let mut writer = RecordWriter::new(encoder, &Header::new(None)).unwrap();
        for r in &records {
            writer.write_record(r).unwrap();
        }
        finish_gz_file(writer.finish().unwrap()).unwrap();

        let first: Vec<Record> = decode_file(&path).unwrap().map(|r| r.unwrap()).collect();
        let second: Vec<Record> = decode_file(&path).unwrap().map(|r| r.unwrap()).collect();
        assert_eq!(first, records);
        assert_eq!(first, second);
    }

    #[test]
    fn test_read_summary() {
        let mut gz = GzEncoder::new(Vec::new(), Compression::fast());
        encode(&mut gz, &Header::new(None), &sample_records()).unwrap();
        let bytes = gz.finish().unwrap();

        let summary = read_summary(decode_gz(bytes.as_slice()).unwrap()).unwrap();
        assert_eq!(summary.index_id.as_deref(), Some("central"));
        assert_eq!(summary.artifact_count, 2);
        assert_eq!(summary.aggregate_count, 2);
        assert_eq!(summary.unknown_count, 0);
        assert!(summary.all_groups.contains("org.example"));
        assert!(summary.root_groups.contains("org"));
    }
}
