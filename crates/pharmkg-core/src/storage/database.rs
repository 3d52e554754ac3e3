//! PostgreSQL connection pool
//!
//! Every pooled connection runs the graph extension prelude on connect, so
//! any connection handed out by the pool can execute cypher queries.

use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::{Executor, PgPool};
use sqlx::postgres::PgPoolOptions;
use tracing::debug;

use crate::config::DatabaseSettings;

/// Default maximum connections in the pool
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Statements run on every new connection when the graph extension is used
const AGE_SESSION_PRELUDE: &str = r#"LOAD 'age'; SET search_path = ag_catalog, "$user", public;"#;

/// Database configuration options
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Connection URL (postgres://...)
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Seconds to wait for a connection from the pool
    pub connect_timeout_secs: u64,
    /// Whether to run `LOAD 'age'` on connect
    pub load_age: bool,
}

impl DatabaseConfig {
    /// Create a new database config for the given URL
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            connect_timeout_secs: 30,
            load_age: true,
        }
    }

    /// Build from the `[database]` config section
    pub fn from_settings(settings: &DatabaseSettings) -> Result<Self> {
        Ok(Self {
            url: settings.resolved_url()?,
            max_connections: settings.max_connections,
            connect_timeout_secs: settings.connect_timeout_secs,
            load_age: settings.load_age,
        })
    }

    /// Set the maximum number of connections
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Skip the graph extension prelude
    pub fn without_age(mut self) -> Self {
        self.load_age = false;
        self
    }
}

/// Installed versions of the extensions this crate relies on
#[derive(Debug, Clone, Default)]
pub struct ExtensionStatus {
    pub age: Option<String>,
    pub vector: Option<String>,
}

/// Database connection pool wrapper
#[derive(Debug, Clone)]
pub struct Database {
    pool: PgPool,
    config: DatabaseConfig,
}

impl Database {
    /// Create a new database connection with the given configuration
    pub async fn new(config: DatabaseConfig) -> Result<Self> {
        let load_age = config.load_age;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .after_connect(move |conn, _meta| {
                Box::pin(async move {
                    if load_age {
                        conn.execute(sqlx::raw_sql(AGE_SESSION_PRELUDE)).await?;
                    }
                    Ok(())
                })
            })
            .connect(&config.url)
            .await
            .context("Failed to connect to database")?;

        debug!(max_connections = config.max_connections, load_age, "Database pool ready");

        Ok(Self { pool, config })
    }

    /// Connect using the `[database]` config section
    pub async fn from_settings(settings: &DatabaseSettings) -> Result<Self> {
        Self::new(DatabaseConfig::from_settings(settings)?).await
    }

    /// Get the underlying connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Get the database configuration
    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Check if database is healthy
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("Database health check failed")?;
        Ok(())
    }

    /// Report which extensions are installed
    pub async fn extension_status(&self) -> Result<ExtensionStatus> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT extname::text, extversion FROM pg_extension WHERE extname IN ('age', 'vector')",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to query installed extensions")?;

        let mut status = ExtensionStatus::default();
        for (name, version) in rows {
            match name.as_str() {
                "age" => status.age = Some(version),
                "vector" => status.vector = Some(version),
                _ => {}
            }
        }
        Ok(status)
    }

    /// Close the database connection pool
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_config_builder() {
        let config = DatabaseConfig::with_url("postgres://localhost/fpkg")
            .max_connections(10)
            .without_age();

        assert_eq!(config.url, "postgres://localhost/fpkg");
        assert_eq!(config.max_connections, 10);
        assert!(!config.load_age);
    }

    #[test]
    fn test_config_from_settings_prefers_file_url() {
        let settings = DatabaseSettings {
            url: Some("postgres://db/fpkg".into()),
            max_connections: 2,
            connect_timeout_secs: 5,
            load_age: true,
        };
        let config = DatabaseConfig::from_settings(&settings).unwrap();
        assert_eq!(config.url, "postgres://db/fpkg");
        assert_eq!(config.max_connections, 2);
        assert_eq!(config.connect_timeout_secs, 5);
    }

    #[test]
    fn test_prelude_sets_search_path() {
        assert!(AGE_SESSION_PRELUDE.contains("LOAD 'age'"));
        assert!(AGE_SESSION_PRELUDE.contains("ag_catalog"));
    }
}
