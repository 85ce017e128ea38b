use chrono::NaiveDate;
use thiserror::Error;

/// Unified error type for store access and table normalization
#[derive(Error, Debug)]
pub enum DataError {
    /// Store unreachable within the connect timeout, or handshake failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// User identifier never observed in the store
    #[error("Unknown user: {0}")]
    UnknownUser(String),

    /// Metric name outside the supported catalog
    #[error("Unknown metric: {0}")]
    UnknownMetric(String),

    /// Start date after end date
    #[error("Invalid date range: start {start} is after end {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    /// Date input that could not be parsed
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Query execution failed on the store side
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// A record does not match the schema map of its metric
    #[error("Schema error in metric '{metric}', field '{field}': {reason}")]
    SchemaError {
        metric: String,
        field: String,
        reason: String,
    },
}

impl DataError {
    /// Create a schema error for a metric field
    pub fn schema(
        metric: impl Into<String>,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        DataError::SchemaError {
            metric: metric.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        DataError::InvalidConfiguration(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, DataError>;
