use crate::metric::{Collection, Metric};
use crate::normalize::{normalize, LoadOptions};
use crate::query::{build_query, DateRange};
use crate::user::UserId;
use bson::Bson;
use chrono::NaiveDate;
use lifesnaps_query::{
    Condition, ConnectionConfig, DataError, DocumentStore, Filter, Result, Table,
};
use lifesnaps_query_mongodb::MongoStore;
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Reads LifeSnaps metrics for one user at a time and returns normalized
/// tables.
///
/// The store handle is owned by the loader and passed explicitly, so the
/// same code runs against MongoDB or an in-memory store.
pub struct LifeSnapsLoader<S = MongoStore> {
    store: S,
}

impl LifeSnapsLoader<MongoStore> {
    /// Connect to the store at `host:port` and use `database`
    pub async fn configure(host: &str, port: u16, database: &str) -> Result<Self> {
        Self::connect(&ConnectionConfig::new(host, port, database)).await
    }

    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let store = MongoStore::connect(config).await?;
        Ok(Self::with_store(store))
    }

    /// Connect using the `LIFESNAPS_MONGO_*` environment variables
    pub async fn from_env() -> Result<Self> {
        Self::connect(&ConnectionConfig::from_env()?).await
    }
}

impl<S: DocumentStore> LifeSnapsLoader<S> {
    pub fn with_store(store: S) -> Self {
        debug!("Loader using {} store", store.source_type());
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Distinct user identifiers present in the wearable collection
    pub async fn get_user_ids(&self) -> Result<BTreeSet<UserId>> {
        let collection = Collection::Fitbit;
        let filter = Filter::new().and(Condition::ne(collection.user_key(), Bson::Null));

        let users: BTreeSet<UserId> = self
            .store
            .distinct(collection.name(), collection.user_key(), &filter)
            .await?
            .into_iter()
            .filter(|value| match value {
                Bson::Null | Bson::Undefined => false,
                Bson::String(s) => !s.is_empty(),
                _ => true,
            })
            .map(UserId::new)
            .collect();

        debug!("Found {} users", users.len());
        Ok(users)
    }

    /// Load a metric by name.
    ///
    /// Checks, in order: the metric name, the date range, then the user.
    pub async fn load_metric(
        &self,
        user: impl Into<UserId>,
        metric: &str,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<Table> {
        let metric: Metric = metric.parse()?;
        let range = DateRange::new(start_date, end_date)?;
        self.load(user, metric, range).await
    }

    pub async fn load(
        &self,
        user: impl Into<UserId>,
        metric: Metric,
        range: DateRange,
    ) -> Result<Table> {
        self.load_with(user, metric, range, LoadOptions::default())
            .await
    }

    pub async fn load_with(
        &self,
        user: impl Into<UserId>,
        metric: Metric,
        mut range: DateRange,
        options: LoadOptions,
    ) -> Result<Table> {
        let user = self.resolve_user(user.into()).await?;
        let spec = metric.spec();

        if !spec.time.is_timed() && !range.is_unbounded() {
            warn!(
                "Metric '{}' has no timestamp, ignoring date range {}",
                metric, range
            );
            range = DateRange::all();
        }

        let query = build_query(&spec, &user, &range);
        debug!(
            "Loading '{}' for user {} in {} from collection '{}'",
            metric, user, range, query.collection
        );

        let documents = self.store.find(&query).await?;
        let table = normalize(&spec, &documents, &range, &options)?;

        debug!(
            "Normalized {} documents of '{}' into {} rows",
            documents.len(),
            metric,
            table.len()
        );
        Ok(table)
    }

    pub async fn load_sleep_summary(
        &self,
        user: impl Into<UserId>,
        range: DateRange,
    ) -> Result<Table> {
        self.load(user, Metric::SleepSummary, range).await
    }

    /// Sleep stage segments; short wake episodes are merged in when
    /// `include_short_data` is set
    pub async fn load_sleep_stages(
        &self,
        user: impl Into<UserId>,
        range: DateRange,
        include_short_data: bool,
    ) -> Result<Table> {
        let options = LoadOptions {
            include_short_sleep_data: include_short_data,
        };
        self.load_with(user, Metric::SleepStage, range, options)
            .await
    }

    pub async fn load_steps(&self, user: impl Into<UserId>, range: DateRange) -> Result<Table> {
        self.load(user, Metric::Steps, range).await
    }

    pub async fn load_heart_rate(
        &self,
        user: impl Into<UserId>,
        range: DateRange,
    ) -> Result<Table> {
        self.load(user, Metric::HeartRate, range).await
    }

    pub async fn load_profile(&self, user: impl Into<UserId>) -> Result<Table> {
        self.load(user, Metric::Profile, DateRange::all()).await
    }

    /// Release the store connection
    pub async fn close(&self) -> Result<()> {
        self.store.close().await
    }

    /// The stored form of a user identifier, so the filter matches the
    /// stored representation. An exact match wins; otherwise the first stored
    /// identifier with the same string form is used.
    async fn resolve_user(&self, user: UserId) -> Result<UserId> {
        let mut users = self.get_user_ids().await?;
        if let Some(stored) = users.take(&user) {
            return Ok(stored);
        }
        users
            .into_iter()
            .find(|stored| stored.same_key(&user))
            .ok_or_else(|| DataError::UnknownUser(user.to_string()))
    }
}
