use crate::error::Result;
use crate::filter::{DocumentQuery, Filter};
use async_trait::async_trait;
use bson::{Bson, Document};
use std::sync::Arc;

/// Read-only access to a document collection store.
///
/// Implementations never mutate stored data. A handle is owned by one
/// logical caller at a time; callers that need parallel queries open one
/// handle each.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Get the type name of this store
    fn source_type(&self) -> &'static str;

    /// Distinct values of `field` among the documents of `collection`
    /// matching `filter`. A missing or empty collection yields an empty list.
    async fn distinct(&self, collection: &str, field: &str, filter: &Filter) -> Result<Vec<Bson>>;

    /// Documents matching the query, in store order, with the query's date
    /// fields converted to date-times
    async fn find(&self, query: &DocumentQuery) -> Result<Vec<Document>>;

    /// Release the connection
    async fn close(&self) -> Result<()>;
}

#[async_trait]
impl<T: DocumentStore + ?Sized> DocumentStore for Arc<T> {
    fn source_type(&self) -> &'static str {
        (**self).source_type()
    }

    async fn distinct(&self, collection: &str, field: &str, filter: &Filter) -> Result<Vec<Bson>> {
        (**self).distinct(collection, field, filter).await
    }

    async fn find(&self, query: &DocumentQuery) -> Result<Vec<Document>> {
        (**self).find(query).await
    }

    async fn close(&self) -> Result<()> {
        (**self).close().await
    }
}
