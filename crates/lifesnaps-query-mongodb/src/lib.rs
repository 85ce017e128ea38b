//! MongoDB implementation of the lifesnaps-query DocumentStore trait
//!
//! Reads go through two driver commands:
//! - `distinct` for enumerating user identifiers
//! - `aggregate` for metric records, with stored timestamp strings converted
//!   to dates inside the pipeline before range filtering
//!
//! ## Example
//!
//! ```rust,no_run
//! use lifesnaps_query::{ConnectionConfig, DocumentStore, Filter};
//! use lifesnaps_query_mongodb::MongoStore;
//!
//! # async fn example() -> lifesnaps_query::Result<()> {
//! let store = MongoStore::connect(&ConnectionConfig::default()).await?;
//! let users = store.distinct("fitbit", "id", &Filter::new()).await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use bson::{doc, Bson, Document};
use futures::TryStreamExt;
use lifesnaps_query::{ConnectionConfig, DataError, DocumentQuery, DocumentStore, Filter, Result};
use mongodb::{
    options::{ClientOptions, Credential},
    Client, Database,
};
use tracing::{debug, error};

const APP_NAME: &str = "lifesnaps-loader";

/// MongoDB document store
#[derive(Clone)]
pub struct MongoStore {
    client: Client,
    database: Database,
    config: ConnectionConfig,
}

impl MongoStore {
    /// Connect and verify that the server answers within the configured
    /// connect timeout
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        config.validate()?;
        debug!("Creating MongoDB store for {}", config.connection_string());

        let url = format!("mongodb://{}:{}", config.host, config.port);
        let mut client_options = ClientOptions::parse(url.as_str()).await.map_err(|e| {
            error!("Failed to parse MongoDB URL: {}", e);
            DataError::ConnectionFailed(format!("Failed to parse MongoDB URL: {}", e))
        })?;

        client_options.app_name = Some(APP_NAME.to_string());
        client_options.connect_timeout = Some(config.connect_timeout());
        client_options.server_selection_timeout = Some(config.connect_timeout());

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            let mut credential = Credential::default();
            credential.username = Some(username.clone());
            credential.password = Some(password.clone());
            client_options.credential = Some(credential);
        }

        let client = Client::with_options(client_options).map_err(|e| {
            error!("Failed to create MongoDB client: {}", e);
            DataError::ConnectionFailed(format!("Failed to create MongoDB client: {}", e))
        })?;

        let database = client.database(&config.database);

        // Test connection
        database.run_command(doc! { "ping": 1 }).await.map_err(|e| {
            error!(
                "MongoDB at {}:{} unreachable: {}",
                config.host, config.port, e
            );
            DataError::ConnectionFailed(format!(
                "MongoDB at {}:{} unreachable: {}",
                config.host, config.port, e
            ))
        })?;

        debug!("MongoDB store connected to database '{}'", config.database);

        Ok(Self {
            client,
            database,
            config: config.clone(),
        })
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }
}

/// Aggregation pipeline for a document query.
///
/// Non-date conditions are matched first so the date conversion only runs
/// on the user's records of one type.
pub fn pipeline(query: &DocumentQuery) -> Vec<Document> {
    let (date_filter, base_filter) = query
        .filter
        .partition(|condition| query.is_date_field(&condition.field));

    let mut stages = vec![doc! { "$match": base_filter.to_document() }];

    if !query.date_fields.is_empty() {
        let mut converted = Document::new();
        for field in &query.date_fields {
            converted.insert(
                field.clone(),
                doc! {
                    "$convert": {
                        "input": format!("${}", field),
                        "to": "date",
                        "onError": null,
                        "onNull": null,
                    }
                },
            );
        }
        stages.push(doc! { "$addFields": converted });
    }

    if !date_filter.is_empty() {
        stages.push(doc! { "$match": date_filter.to_document() });
    }

    stages
}

#[async_trait]
impl DocumentStore for MongoStore {
    fn source_type(&self) -> &'static str {
        "mongodb"
    }

    async fn distinct(&self, collection: &str, field: &str, filter: &Filter) -> Result<Vec<Bson>> {
        debug!("Distinct '{}' in collection '{}'", field, collection);

        let values = self
            .database
            .collection::<Document>(collection)
            .distinct(field, filter.to_document())
            .await
            .map_err(|e| {
                error!("Distinct on {}.{} failed: {}", collection, field, e);
                DataError::QueryFailed(format!(
                    "Distinct on {}.{} failed: {}",
                    collection, field, e
                ))
            })?;

        debug!("Found {} distinct values", values.len());
        Ok(values)
    }

    async fn find(&self, query: &DocumentQuery) -> Result<Vec<Document>> {
        let stages = pipeline(query);
        debug!(
            "Aggregating collection '{}' with pipeline {:?}",
            query.collection, stages
        );

        let cursor = self
            .database
            .collection::<Document>(&query.collection)
            .aggregate(stages)
            .await
            .map_err(|e| {
                error!("Aggregate on '{}' failed: {}", query.collection, e);
                DataError::QueryFailed(format!("Aggregate on '{}' failed: {}", query.collection, e))
            })?;

        let documents: Vec<Document> = cursor.try_collect().await.map_err(|e| {
            error!("Reading cursor of '{}' failed: {}", query.collection, e);
            DataError::QueryFailed(format!("Reading cursor failed: {}", e))
        })?;

        debug!(
            "Collection '{}' returned {} documents",
            query.collection,
            documents.len()
        );
        Ok(documents)
    }

    async fn close(&self) -> Result<()> {
        debug!("Closing MongoDB store");
        self.client.clone().shutdown().await;
        Ok(())
    }
}
