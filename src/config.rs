use thiserror::Error;

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("DATABASE_URL environment variable is not set")]
    MissingDatabaseUrl,
    #[error("DATABASE_MAX_CONNECTIONS must be a positive integer, got {value:?}")]
    InvalidMaxConnections { value: String },
}

/// Startup settings for the storage layer.
/// Bind address and port are left to rocket's own configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
}

impl Config {
    /// Reads the configuration from the environment, loading `.env` first if there is one.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_vars(
            dotenv::var("DATABASE_URL").ok(),
            dotenv::var("DATABASE_MAX_CONNECTIONS").ok(),
        )
    }

    /// A private single-connection sqlite database.
    /// Each in-memory connection is its own database, so the pool must not grow.
    pub fn in_memory() -> Self {
        Self {
            database_url: "sqlite::memory:".to_owned(),
            max_connections: 1,
        }
    }

    fn from_vars(
        database_url: Option<String>,
        max_connections: Option<String>,
    ) -> Result<Self, ConfigError> {
        let database_url = match database_url {
            Some(url) if !url.trim().is_empty() => url,
            _ => return Err(ConfigError::MissingDatabaseUrl),
        };

        let max_connections = match max_connections {
            None => DEFAULT_MAX_CONNECTIONS,
            Some(value) => match value.trim().parse::<u32>() {
                Ok(count) if count > 0 => count,
                _ => return Err(ConfigError::InvalidMaxConnections { value }),
            },
        };

        Ok(Self {
            database_url,
            max_connections,
        })
    }
}
