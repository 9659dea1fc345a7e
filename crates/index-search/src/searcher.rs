//! Keyword search over the artifact index.

use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::Value;
use tantivy::{IndexReader, TantivyDocument};
use tracing::{debug, info};

use crate::error::SearchError;
use crate::index::SearchIndex;
use crate::schema::ArtifactSchema;

/// A search result with relevance score.
#[derive(Debug, Clone)]
pub struct SearchHit {
    /// Unique artifact key
    pub uinfo: String,
    /// BM25 relevance score
    pub score: f32,
    /// Last-modified millis
    pub last_modified: Option<i64>,
}

/// Searcher for artifact queries using BM25 ranking.
pub struct ArtifactSearcher {
    reader: IndexReader,
    schema: ArtifactSchema,
    query_parser: QueryParser,
}

impl ArtifactSearcher {
    /// Create a new searcher from a SearchIndex.
    pub fn new(index: &SearchIndex) -> Result<Self, SearchError> {
        let reader = index.reader()?;
        let schema = index.schema().clone();

        let query_parser = QueryParser::for_index(
            index.index(),
            vec![schema.text, schema.group_id, schema.artifact_id],
        );

        Ok(Self {
            reader,
            schema,
            query_parser,
        })
    }

    /// Reload the reader to see recent commits.
    pub fn reload(&self) -> Result<(), SearchError> {
        self.reader.reload()?;
        debug!("Reloaded search reader");
        Ok(())
    }

    /// Search with a query string.
    pub fn search(&self, query_str: &str, limit: usize) -> Result<Vec<SearchHit>, SearchError> {
        if query_str.trim().is_empty() {
            return Ok(Vec::new());
        }

        let searcher = self.reader.searcher();
        let query = self.query_parser.parse_query(query_str)?;
        let top_docs = searcher.search(&query, &TopDocs::with_limit(limit))?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, doc_address) in top_docs {
            let doc: TantivyDocument = searcher.doc(doc_address)?;

            let uinfo = doc
                .get_first(self.schema.uinfo)
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();

            let last_modified = doc
                .get_first(self.schema.last_modified)
                .and_then(|v| v.as_i64());

            hits.push(SearchHit {
                uinfo,
                score,
                last_modified,
            });
        }

        info!(query = query_str, results = hits.len(), "Artifact search complete");
        Ok(hits)
    }
}
