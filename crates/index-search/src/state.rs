//! Index state sidecar.
//!
//! Tantivy keeps documents; the identity of the index and the time it was
//! last updated live next to it in `index-state.json`.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SearchError;

pub const INDEX_STATE_FILE_NAME: &str = "index-state.json";

/// Persisted identity and freshness of a live index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexState {
    /// Identity of the index
    pub index_id: String,

    /// Time of the last committed update; `None` if never updated
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl IndexState {
    pub fn new(index_id: impl Into<String>) -> Self {
        Self {
            index_id: index_id.into(),
            timestamp: None,
        }
    }
}

/// Read the state sidecar from an index directory.
pub fn read_index_state(index_dir: &Path) -> Result<Option<IndexState>, SearchError> {
    let path = index_dir.join(INDEX_STATE_FILE_NAME);
    if !path.exists() {
        return Ok(None);
    }
    let bytes = std::fs::read(&path)?;
    Ok(Some(serde_json::from_slice(&bytes)?))
}

/// Write the state sidecar atomically (tmp file + rename).
pub fn write_index_state(index_dir: &Path, state: &IndexState) -> Result<(), SearchError> {
    std::fs::create_dir_all(index_dir)?;
    let path = index_dir.join(INDEX_STATE_FILE_NAME);
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, serde_json::to_vec_pretty(state)?)?;
    std::fs::rename(&tmp, &path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn test_missing_state() {
        let dir = TempDir::new().unwrap();
        assert!(read_index_state(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_state_roundtrip() {
        let dir = TempDir::new().unwrap();
        let state = IndexState {
            index_id: "central".to_string(),
            timestamp: Some(Utc.timestamp_millis_opt(1_700_000_000_123).unwrap()),
        };
        write_index_state(dir.path(), &state).unwrap();
        assert_eq!(read_index_state(dir.path()).unwrap(), Some(state));
    }

    #[test]
    fn test_state_without_timestamp() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(INDEX_STATE_FILE_NAME),
            r#"{"index_id":"central"}"#,
        )
        .unwrap();
        let state = read_index_state(dir.path()).unwrap().unwrap();
        assert_eq!(state.index_id, "central");
        assert!(state.timestamp.is_none());
    }
}
