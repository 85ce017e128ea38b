//! In-memory [`DocumentStore`] used to run the loader without a database.

use crate::error::Result;
use crate::filter::{bson_eq, convert_date_fields, lookup_path, DocumentQuery, Filter};
use crate::traits::DocumentStore;
use async_trait::async_trait;
use bson::{Bson, Document};
use std::collections::HashMap;
use tracing::debug;

/// Collections of documents held in insertion order
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    collections: HashMap<String, Vec<Document>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append documents to a collection, creating it if needed
    pub fn with_collection(
        mut self,
        name: impl Into<String>,
        documents: impl IntoIterator<Item = Document>,
    ) -> Self {
        self.collections
            .entry(name.into())
            .or_default()
            .extend(documents);
        self
    }

    pub fn insert(&mut self, collection: impl Into<String>, document: Document) {
        self.collections
            .entry(collection.into())
            .or_default()
            .push(document);
    }

    pub fn count(&self, collection: &str) -> usize {
        self.collections.get(collection).map_or(0, Vec::len)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn source_type(&self) -> &'static str {
        "memory"
    }

    async fn distinct(&self, collection: &str, field: &str, filter: &Filter) -> Result<Vec<Bson>> {
        let mut values: Vec<Bson> = Vec::new();
        for doc in self.collections.get(collection).into_iter().flatten() {
            if !filter.matches(doc) {
                continue;
            }
            if let Some(value) = lookup_path(doc, field) {
                if !values.iter().any(|v| bson_eq(v, value)) {
                    values.push(value.clone());
                }
            }
        }
        debug!(
            "Found {} distinct values of '{}' in memory collection '{}'",
            values.len(),
            field,
            collection
        );
        Ok(values)
    }

    async fn find(&self, query: &DocumentQuery) -> Result<Vec<Document>> {
        let documents: Vec<Document> = self
            .collections
            .get(&query.collection)
            .into_iter()
            .flatten()
            .map(|doc| convert_date_fields(doc, &query.date_fields))
            .filter(|doc| query.filter.matches(doc))
            .collect();
        debug!(
            "Memory collection '{}' returned {} documents",
            query.collection,
            documents.len()
        );
        Ok(documents)
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
