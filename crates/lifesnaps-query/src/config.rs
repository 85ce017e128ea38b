use crate::error::{DataError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 27017;
pub const DEFAULT_DATABASE: &str = "rais_anonymized";
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;

pub const ENV_HOST: &str = "LIFESNAPS_MONGO_HOST";
pub const ENV_PORT: &str = "LIFESNAPS_MONGO_PORT";
pub const ENV_DATABASE: &str = "LIFESNAPS_MONGO_DATABASE";
pub const ENV_USERNAME: &str = "LIFESNAPS_MONGO_USERNAME";
pub const ENV_PASSWORD: &str = "LIFESNAPS_MONGO_PASSWORD";
pub const ENV_CONNECT_TIMEOUT_MS: &str = "LIFESNAPS_MONGO_CONNECT_TIMEOUT_MS";

fn default_connect_timeout_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}

/// Connection configuration for the document store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Host name or address of the store
    pub host: String,
    /// Port number
    pub port: u16,
    /// Database holding the dataset collections
    pub database: String,
    /// Username, when the store requires authentication
    #[serde(default)]
    pub username: Option<String>,
    /// Password, never serialized
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    /// Bound on the initial reachability check
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT, DEFAULT_DATABASE)
    }
}

impl ConnectionConfig {
    pub fn new(host: impl Into<String>, port: u16, database: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            database: database.into(),
            username: None,
            password: None,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
        }
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Build a configuration from `LIFESNAPS_MONGO_*` environment variables,
    /// falling back to the defaults for unset ones
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ConnectionConfig::from_env`] with a custom variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(host) = lookup(ENV_HOST) {
            config.host = host;
        }
        if let Some(port) = lookup(ENV_PORT) {
            config.port = port.trim().parse().map_err(|_| {
                DataError::invalid_configuration(format!(
                    "{} is not a valid port: {}",
                    ENV_PORT, port
                ))
            })?;
        }
        if let Some(database) = lookup(ENV_DATABASE) {
            config.database = database;
        }
        config.username = lookup(ENV_USERNAME);
        config.password = lookup(ENV_PASSWORD);
        if let Some(timeout) = lookup(ENV_CONNECT_TIMEOUT_MS) {
            config.connect_timeout_ms = timeout.trim().parse().map_err(|_| {
                DataError::invalid_configuration(format!(
                    "{} is not a valid number of milliseconds: {}",
                    ENV_CONNECT_TIMEOUT_MS, timeout
                ))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(DataError::invalid_configuration("host must not be empty"));
        }
        if self.port == 0 {
            return Err(DataError::invalid_configuration("port must be non-zero"));
        }
        if self.database.trim().is_empty() {
            return Err(DataError::invalid_configuration(
                "database name must not be empty",
            ));
        }
        if self.connect_timeout_ms == 0 {
            return Err(DataError::invalid_configuration(
                "connect timeout must be positive",
            ));
        }
        if self.username.is_some() != self.password.is_some() {
            return Err(DataError::invalid_configuration(
                "username and password must be set together",
            ));
        }
        Ok(())
    }

    /// Get connection string for display purposes (without password)
    pub fn connection_string(&self) -> String {
        match &self.username {
            Some(username) => format!(
                "mongodb://{}@{}:{}/{}",
                username, self.host, self.port, self.database
            ),
            None => format!("mongodb://{}:{}/{}", self.host, self.port, self.database),
        }
    }
}
