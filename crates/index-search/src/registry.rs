//! Registry of open indexes keyed by index id.
//!
//! The owning service adds and removes entries; components that need to
//! resolve an index by id receive the registry by reference.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::error::SearchError;
use crate::index::SearchIndex;

#[derive(Default)]
pub struct IndexRegistry {
    indexes: HashMap<String, Arc<SearchIndex>>,
}

impl IndexRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an index under its own id.
    pub fn add(&mut self, index: SearchIndex) -> Result<Arc<SearchIndex>, SearchError> {
        let id = index.index_id().to_string();
        if self.indexes.contains_key(&id) {
            return Err(SearchError::AlreadyRegistered(id));
        }
        let index = Arc::new(index);
        self.indexes.insert(id.clone(), index.clone());
        info!(index_id = %id, "Registered index");
        Ok(index)
    }

    pub fn remove(&mut self, id: &str) -> Option<Arc<SearchIndex>> {
        let removed = self.indexes.remove(id);
        if removed.is_some() {
            info!(index_id = %id, "Unregistered index");
        }
        removed
    }

    pub fn get(&self, id: &str) -> Option<Arc<SearchIndex>> {
        self.indexes.get(id).cloned()
    }

    /// Registered ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.indexes.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }
}
