//! Database connection and pool management

use brm_common::config::DatabaseConfig;
use brm_common::{Error, Result};
use sqlx::error::ErrorKind;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, Transaction};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// Database pool wrapper
#[derive(Clone)]
pub struct DatabasePool {
    pool: SqlitePool,
    transaction_timeout: Duration,
}

impl DatabasePool {
    /// Create a new database pool from configuration
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let (options, in_memory) = Self::connect_options(config)?;

        info!(
            backend = %config.backend,
            in_memory,
            "Connecting to database"
        );

        let mut pool_options = SqlitePoolOptions::new()
            .acquire_timeout(config.acquire_timeout());

        // Every connection to `:memory:` opens its own database, so the pool
        // must hold exactly one connection for its whole lifetime.
        pool_options = if in_memory {
            pool_options
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            pool_options
                .max_connections(config.max_connections)
                .min_connections(config.min_connections)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| Error::Database(format!("Failed to connect: {}", e)))?;

        info!("Database connection established");

        Ok(Self {
            pool,
            transaction_timeout: config.transaction_timeout(),
        })
    }

    /// Open a private in-memory database and apply the schema
    pub async fn in_memory() -> Result<Self> {
        let pool = Self::new(&DatabaseConfig::in_memory()).await?;
        pool.migrate().await?;
        Ok(pool)
    }

    /// Build connect options from configuration
    fn connect_options(config: &DatabaseConfig) -> Result<(SqliteConnectOptions, bool)> {
        if config.backend != "sqlite" {
            return Err(Error::Config(format!(
                "Unsupported database backend: {} (only sqlite is supported)",
                config.backend
            )));
        }

        match (&config.url, &config.path) {
            (Some(url), _) => {
                let in_memory = url.contains(":memory:") || url.contains("mode=memory");
                let options = SqliteConnectOptions::from_str(url)
                    .map_err(|e| Error::Config(format!("Invalid database URL: {}", e)))?
                    .create_if_missing(true);
                let options = if in_memory {
                    options
                } else {
                    options.journal_mode(SqliteJournalMode::Wal)
                };
                Ok((options, in_memory))
            }
            (None, Some(path)) => Ok((
                SqliteConnectOptions::new()
                    .filename(path)
                    .create_if_missing(true)
                    .journal_mode(SqliteJournalMode::Wal),
                false,
            )),
            (None, None) => Err(Error::Config(
                "Database URL or path required".to_string(),
            )),
        }
    }

    /// Get the underlying pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Upper bound applied to every write transaction
    pub fn transaction_timeout(&self) -> Duration {
        self.transaction_timeout
    }

    /// Override the write transaction timeout
    pub fn with_transaction_timeout(mut self, timeout: Duration) -> Self {
        self.transaction_timeout = timeout;
        self
    }

    /// Start a storage transaction
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        debug!("Beginning transaction");
        self.pool.begin().await.map_err(db_error)
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(format!("Migration failed: {}", e)))?;

        info!("Database migrations completed");
        Ok(())
    }

    /// Check database health
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Database(format!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Close all pooled connections
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Classify a driver error into the BRM error taxonomy
pub(crate) fn db_error(e: sqlx::Error) -> Error {
    match &e {
        sqlx::Error::RowNotFound => Error::NotFound("No matching row".to_string()),
        sqlx::Error::Database(db) => match db.kind() {
            ErrorKind::UniqueViolation
            | ErrorKind::ForeignKeyViolation
            | ErrorKind::NotNullViolation
            | ErrorKind::CheckViolation => Error::ConstraintViolation(db.message().to_string()),
            _ => Error::Database(e.to_string()),
        },
        _ => Error::Database(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_pool_is_migrated() {
        let db = DatabasePool::in_memory().await.unwrap();
        db.health_check().await.unwrap();

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name LIKE '%rule%' ORDER BY name",
        )
        .fetch_all(db.pool())
        .await
        .unwrap();

        let names: Vec<&str> = tables.iter().map(|(n,)| n.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "bounce_rule_changes",
                "bounce_rules",
                "throughput_rule_changes",
                "throughput_rules"
            ]
        );
    }

    #[tokio::test]
    async fn test_file_pool() {
        let dir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig {
            url: None,
            path: Some(dir.path().join("rules.db")),
            ..DatabaseConfig::default()
        };

        let db = DatabasePool::new(&config).await.unwrap();
        db.migrate().await.unwrap();
        db.health_check().await.unwrap();
        db.close().await;
    }

    #[tokio::test]
    async fn test_unsupported_backend() {
        let config = DatabaseConfig {
            backend: "postgres".to_string(),
            ..DatabaseConfig::default()
        };

        match DatabasePool::new(&config).await {
            Err(Error::Config(msg)) => assert!(msg.contains("postgres")),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("postgres backend should be rejected"),
        }
    }
}
