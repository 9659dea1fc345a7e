//! Publish metadata persisted as a properties text file.
//!
//! Known keys are lifted into typed fields; everything else rides along in
//! [`IndexProperties::extra`] so a read/write cycle never drops data. A known
//! key whose value does not parse is kept verbatim in `extra` as well.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::PropertiesError;

pub const KEY_INDEX_ID: &str = "index-id";
pub const KEY_CHAIN_ID: &str = "chain-id";
pub const KEY_COUNTER: &str = "counter";
pub const KEY_TIMESTAMP: &str = "timestamp";
/// `chunk-<slot>` entries map a retention slot to a chunk sequence number.
pub const CHUNK_KEY_PREFIX: &str = "chunk-";

/// `yyyyMMddHHmmss.SSS Z`, always written in UTC.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S%.3f %z";

const HEADER_COMMENT: &str = "# Artifact index publish properties";

/// Typed view of the publish metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexProperties {
    pub index_id: Option<String>,
    /// Identity of the unbroken incremental lineage
    pub chain_id: Option<String>,
    /// Sequence number of the most recently published chunk
    pub counter: Option<u64>,
    /// Index state timestamp of the most recent full publish
    pub timestamp: Option<DateTime<Utc>>,
    /// Retention slot → chunk sequence number (slot 0 is the newest)
    pub chunks: BTreeMap<usize, u64>,
    /// Keys not modelled above, plus known keys with unparseable values
    pub extra: BTreeMap<String, String>,
}

impl IndexProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.index_id.is_none()
            && self.chain_id.is_none()
            && self.counter.is_none()
            && self.timestamp.is_none()
            && self.chunks.is_empty()
            && self.extra.is_empty()
    }

    /// Sequence numbers of every advertised chunk.
    pub fn chunk_sequences(&self) -> impl Iterator<Item = u64> + '_ {
        self.chunks.values().copied()
    }

    pub fn advertises_chunk(&self, sequence: u64) -> bool {
        self.chunk_sequences().any(|s| s == sequence)
    }

    /// Build from raw key/value pairs.
    pub fn from_map(map: BTreeMap<String, String>) -> Self {
        let mut props = Self::new();
        for (key, value) in map {
            let parsed = match key.as_str() {
                KEY_INDEX_ID => {
                    props.index_id = Some(value.clone());
                    true
                }
                KEY_CHAIN_ID => {
                    props.chain_id = Some(value.clone());
                    true
                }
                KEY_COUNTER => match value.trim().parse::<u64>() {
                    Ok(counter) => {
                        props.counter = Some(counter);
                        true
                    }
                    Err(_) => false,
                },
                KEY_TIMESTAMP => match parse_timestamp(&value) {
                    Some(ts) => {
                        props.timestamp = Some(ts);
                        true
                    }
                    None => false,
                },
                k if k.starts_with(CHUNK_KEY_PREFIX) => {
                    let slot = k[CHUNK_KEY_PREFIX.len()..].parse::<usize>();
                    let sequence = value.trim().parse::<u64>();
                    match (slot, sequence) {
                        (Ok(slot), Ok(sequence)) => {
                            props.chunks.insert(slot, sequence);
                            true
                        }
                        _ => false,
                    }
                }
                _ => false,
            };
            if !parsed {
                props.extra.insert(key, value);
            }
        }
        props
    }

    /// Flatten back into raw key/value pairs.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        let mut map = self.extra.clone();
        if let Some(id) = &self.index_id {
            map.insert(KEY_INDEX_ID.to_string(), id.clone());
        }
        if let Some(chain) = &self.chain_id {
            map.insert(KEY_CHAIN_ID.to_string(), chain.clone());
        }
        if let Some(counter) = self.counter {
            map.insert(KEY_COUNTER.to_string(), counter.to_string());
        }
        if let Some(ts) = self.timestamp {
            map.insert(KEY_TIMESTAMP.to_string(), format_timestamp(ts));
        }
        for (slot, sequence) in &self.chunks {
            map.insert(format!("{}{}", CHUNK_KEY_PREFIX, slot), sequence.to_string());
        }
        map
    }

    /// Parse properties text.
    pub fn parse(text: &str) -> Result<Self, PropertiesError> {
        Ok(Self::from_map(parse_properties(text)?))
    }

    /// Render properties text (sorted keys, escaped).
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        out.push_str(HEADER_COMMENT);
        out.push('\n');
        for (key, value) in self.to_map() {
            out.push_str(&escape(&key, true));
            out.push('=');
            out.push_str(&escape(&value, false));
            out.push('\n');
        }
        out
    }

    /// Load from a file; `Ok(None)` if the file does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>, PropertiesError> {
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(path)?;
        let props = Self::parse(&text)?;
        debug!(path = ?path, keys = props.to_map().len(), "Loaded properties");
        Ok(Some(props))
    }

    /// Write to a file via a tmp file and rename.
    pub fn save(&self, path: &Path) -> Result<(), PropertiesError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut tmp_name = path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp = std::path::PathBuf::from(tmp_name);
        fs::write(&tmp, self.to_text())?;
        fs::rename(&tmp, path)?;
        debug!(path = ?path, "Saved properties");
        Ok(())
    }
}

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a `yyyyMMddHHmmss.SSS Z` timestamp with any offset into UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(value.trim(), TIMESTAMP_FORMAT)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

/// Parse the properties text format into raw pairs.
///
/// Later duplicates win.
pub fn parse_properties(text: &str) -> Result<BTreeMap<String, String>, PropertiesError> {
    let mut map = BTreeMap::new();
    let mut lines = text.lines().enumerate();

    while let Some((index, line)) = lines.next() {
        let line_no = index + 1;
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
            continue;
        }

        // join continuation lines (odd number of trailing backslashes)
        let mut logical = trimmed.to_string();
        while ends_with_continuation(&logical) {
            logical.pop();
            match lines.next() {
                Some((_, next)) => logical.push_str(next.trim_start()),
                None => break,
            }
        }

        let (raw_key, raw_value) = split_key_value(&logical);
        let key = unescape(raw_key, line_no)?;
        let value = unescape(raw_value, line_no)?;
        map.insert(key, value);
    }
    Ok(map)
}

fn ends_with_continuation(line: &str) -> bool {
    line.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

/// Split a logical line at the first unescaped `=`, `:` or whitespace.
fn split_key_value(line: &str) -> (&str, &str) {
    let mut escaped = false;
    let mut key_end = line.len();
    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' | ' ' | '\t' | '\x0c' => {
                key_end = i;
                break;
            }
            _ => {}
        }
    }

    let key = &line[..key_end];
    let mut rest = line[key_end..].trim_start_matches([' ', '\t', '\x0c']);
    if let Some(stripped) = rest.strip_prefix(['=', ':']) {
        rest = stripped.trim_start_matches([' ', '\t', '\x0c']);
    }
    (key, rest)
}

fn unescape(raw: &str, line_no: usize) -> Result<String, PropertiesError> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    let mut pending_high: Option<u16> = None;

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(next) = chars.next() else {
            break;
        };
        match next {
            't' => out.push('\t'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            'f' => out.push('\x0c'),
            'u' => {
                let hex: String = chars.by_ref().take(4).collect();
                let unit = if hex.len() == 4 {
                    u16::from_str_radix(&hex, 16).ok()
                } else {
                    None
                };
                let unit = unit.ok_or(PropertiesError::InvalidEscape(line_no))?;
                // \uXXXX escapes are UTF-16 code units; pair surrogates
                if let Some(high) = pending_high.take() {
                    match char::decode_utf16([high, unit]).next() {
                        Some(Ok(ch)) => out.push(ch),
                        _ => return Err(PropertiesError::InvalidEscape(line_no)),
                    }
                } else if (0xD800..0xDC00).contains(&unit) {
                    pending_high = Some(unit);
                } else {
                    let ch = char::from_u32(unit as u32)
                        .ok_or(PropertiesError::InvalidEscape(line_no))?;
                    out.push(ch);
                }
            }
            other => out.push(other),
        }
    }
    if pending_high.is_some() {
        return Err(PropertiesError::InvalidEscape(line_no));
    }
    Ok(out)
}

fn escape(value: &str, is_key: bool) -> String {
    let mut out = String::with_capacity(value.len());
    for (i, c) in value.chars().enumerate() {
        match c {
            ' ' if is_key || i == 0 => out.push_str("\\ "),
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\x0c' => out.push_str("\\f"),
            '=' | ':' | '#' | '!' => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || (c as u32) > 0x7e => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    out.push_str(&format!("\\u{:04X}", unit));
                }
            }
            c => out.push(c),
        }
    }
    out
}
