//! # lifesnaps-loader
//!
//! Turns LifeSnaps documents into normalized tables.
//!
//! A request names a user, a metric and an optional date range. The loader
//! validates it, builds a filter for the metric's collection, runs it
//! against a [`DocumentStore`](lifesnaps_query::DocumentStore) and flattens
//! the returned records through the metric's schema map into a
//! [`Table`](lifesnaps_query::Table) sorted by timestamp.
//!
//! ## Example
//!
//! ```rust,no_run
//! use lifesnaps_loader::{DateRange, LifeSnapsLoader};
//!
//! # async fn example() -> lifesnaps_query::Result<()> {
//! let loader = LifeSnapsLoader::configure("localhost", 27017, "rais_anonymized").await?;
//! let users = loader.get_user_ids().await?;
//! if let Some(user) = users.iter().next() {
//!     let range = DateRange::parse(Some("2021-05-22"), Some("2021-06-06"))?;
//!     let sleep = loader.load_sleep_summary(user, range).await?;
//!     println!("{} nights", sleep.len());
//! }
//! loader.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod loader;
pub mod metric;
pub mod normalize;
pub mod query;
pub mod sleep;
pub mod user;

pub use loader::LifeSnapsLoader;
pub use metric::{Collection, Metric, MetricSpec};
pub use normalize::LoadOptions;
pub use query::DateRange;
pub use user::UserId;
