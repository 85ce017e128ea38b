//! # lifesnaps-query
//!
//! Core abstractions for reading the LifeSnaps dataset from a document store.
//!
//! ## Architecture
//!
//! - **DocumentStore**: read-only trait every backend implements
//! - **Filter / DocumentQuery**: field/operator/value filters a backend
//!   translates into its own query language
//! - **Table**: the normalized, typed, row-oriented result handed to callers
//! - **ConnectionConfig**: host, port and database of the store
//! - **MemoryStore**: in-memory backend for tests and offline use
//!
//! ## Example
//!
//! ```rust
//! use lifesnaps_query::{Condition, DocumentQuery, DocumentStore, Filter, MemoryStore};
//! use bson::doc;
//!
//! # async fn example() -> lifesnaps_query::Result<()> {
//! let store = MemoryStore::new().with_collection(
//!     "fitbit",
//!     vec![doc! { "id": "U1", "type": "steps", "data": { "value": "12" } }],
//! );
//!
//! let query = DocumentQuery::new("fitbit")
//!     .with_filter(Filter::new().and(Condition::eq("id", "U1")));
//! let documents = store.find(&query).await?;
//! assert_eq!(documents.len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! Backend crates:
//! - `lifesnaps-query-mongodb` - MongoDB implementation

pub mod config;
pub mod error;
pub mod filter;
pub mod memory;
pub mod traits;
pub mod types;

// Re-export commonly used items
pub use config::ConnectionConfig;
pub use error::{DataError, Result};
pub use filter::{Condition, DocumentQuery, Filter, Operator};
pub use memory::MemoryStore;
pub use traits::DocumentStore;
pub use types::{CellValue, Column, FieldType, Table};
