//! Configuration loading and representation.

use anyhow::{Context, Result, bail};

use keystone_observability::LogFormat;

/// Connection settings for the three backing databases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// Relational write store (customers and other entities).
    pub write_url: String,
    /// Relational event store.
    pub event_store_url: String,
    /// Document (read-side) database.
    pub read_url: String,
    pub max_connections: u32,
}

/// Process configuration, read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub log_format: LogFormat,
    /// `None` selects the in-memory stores (dev/test).
    pub database: Option<DatabaseConfig>,
}

impl AppConfig {
    /// Load from the process environment (and `.env`, when present).
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let host = lookup("APP_HOST").unwrap_or_else(|| "0.0.0.0".to_string());

        let port = lookup("APP_PORT")
            .unwrap_or_else(|| "8080".to_string())
            .parse::<u16>()
            .context("APP_PORT must be a valid u16")?;

        let log_format = match lookup("LOG_FORMAT") {
            Some(v) => v.parse::<LogFormat>().context("LOG_FORMAT is invalid")?,
            None => LogFormat::default(),
        };

        let use_persistent = lookup("USE_PERSISTENT_STORES")
            .unwrap_or_else(|| "false".to_string())
            .parse::<bool>()
            .context("USE_PERSISTENT_STORES must be true or false")?;

        let database = if use_persistent {
            let required = |key: &str| match lookup(key) {
                Some(v) if !v.trim().is_empty() => Ok(v),
                _ => bail!("{key} must be set when USE_PERSISTENT_STORES=true"),
            };

            let max_connections = lookup("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|| "10".to_string())
                .parse::<u32>()
                .context("DB_MAX_CONNECTIONS must be a valid u32")?;

            Some(DatabaseConfig {
                write_url: required("WRITE_DATABASE_URL")?,
                event_store_url: required("EVENT_STORE_DATABASE_URL")?,
                read_url: required("READ_DATABASE_URL")?,
                max_connections,
            })
        } else {
            None
        };

        Ok(Self {
            host,
            port,
            log_format,
            database,
        })
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
