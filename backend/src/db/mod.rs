//! # Database Module
//!
//! This module handles all persistence for the homestay backend.
//! We use PostgreSQL for storing:
//!
//! - Homestays (bed capacity plus descriptive metadata)
//! - Bookings (stays committed against a homestay)
//! - Payments (gateway orders and their settlement status)
//! - Payment confirmations (UTR references entered by guests)
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      DATABASE LAYER                              │
//! │                                                                  │
//! │  ┌──────────────────────────────────────────────────────────┐   │
//! │  │          Store traits (store.rs)  ◄── MemoryStore         │   │
//! │  └──────────────────────────────────────────────────────────┘   │
//! │                              │                                   │
//! │  ┌──────────────────────────────────────────────────────────┐   │
//! │  │        Connection Pool (deadpool-postgres) + timeout      │   │
//! │  └──────────────────────────────────────────────────────────┘   │
//! │                              │                                   │
//! │         ┌──────────────┬─────┴────────┬──────────────┐          │
//! │         ▼              ▼              ▼              ▼          │
//! │  ┌────────────┐ ┌────────────┐ ┌────────────┐ ┌────────────┐   │
//! │  │ homestays  │ │  bookings  │ │  payments  │ │confirmations│  │
//! │  └────────────┘ └────────────┘ └────────────┘ └────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod memory;
pub mod models;
pub mod queries;
pub mod store;

use std::future::Future;
use std::time::Duration;

use deadpool_postgres::{Config, Pool, Runtime};
use tokio_postgres::{NoTls, Config as TokioConfig};
use thiserror::Error;
use tracing::{debug, info, warn, error};

/// Database-related errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to connect to the database
    #[error("Database connection failed: {0}")]
    ConnectionError(String),

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryError(#[from] tokio_postgres::Error),

    /// Migration failed
    #[error("Migration failed: {0}")]
    MigrationError(String),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// The store did not answer in time
    #[error("Store call timed out after {0:?}")]
    Timeout(Duration),
}

/// Database connection wrapper.
///
/// Wraps the connection pool together with the per-call timeout that
/// every store operation is bounded by.
///
/// ## Usage
///
/// ```rust,ignore
/// let db = Database::connect("postgres://...", Duration::from_secs(5)).await?;
/// let homestay = db.get_homestay(7).await?;
/// ```
#[derive(Clone)]
pub struct Database {
    /// The connection pool
    pool: Pool,

    /// Upper bound for one store call
    op_timeout: Duration,
}

impl Database {
    /// Connect to the PostgreSQL database.
    ///
    /// Creates a connection pool with a maximum of 10 connections and
    /// verifies it with a trivial query.
    ///
    /// ## Arguments
    ///
    /// * `database_url` - PostgreSQL connection string
    /// * `op_timeout` - Bound applied to every later store call
    pub async fn connect(database_url: &str, op_timeout: Duration) -> Result<Self, DatabaseError> {
        info!("Connecting to database...");

        // Parse the connection string using tokio_postgres::Config
        let tokio_config = database_url.parse::<TokioConfig>()
            .map_err(|e| DatabaseError::ConfigError(format!("Invalid database URL: {}", e)))?;

        // Convert to deadpool config
        let mut config = Config::new();

        if let Some(dbname) = tokio_config.get_dbname() {
            config.dbname = Some(dbname.to_string());
        }
        if let Some(user) = tokio_config.get_user() {
            config.user = Some(user.to_string());
        }
        if let Some(password) = tokio_config.get_password() {
            // Password is &[u8], convert to String
            config.password = Some(String::from_utf8_lossy(password).to_string());
        }
        if let Some(tokio_postgres::config::Host::Tcp(host)) = tokio_config.get_hosts().first() {
            config.host = Some(host.clone());
        }
        if let Some(port) = tokio_config.get_ports().first() {
            config.port = Some(*port);
        }

        config.pool = Some(deadpool_postgres::PoolConfig {
            max_size: 10,
            ..Default::default()
        });

        let pool = config
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

        let db = Self { pool, op_timeout };

        // Simple query to verify connection
        db.bounded(queries::ping(db.pool()))
            .await
            .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

        info!("Database connection established");

        Ok(db)
    }

    /// Run database migrations.
    ///
    /// The schema lives in `migrations/001_initial_schema.sql`. Objects
    /// that already exist are tolerated so restarts are harmless.
    pub async fn run_migrations(&self) -> Result<(), DatabaseError> {
        info!("Running database migrations...");

        let client = self.pool.get().await
            .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

        let current_dir = std::env::current_dir()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        debug!("Current working directory: {}", current_dir);

        // The binary may be started from the workspace root or from backend/
        let migration_paths = [
            "migrations/001_initial_schema.sql",
            "backend/migrations/001_initial_schema.sql",
            "../migrations/001_initial_schema.sql",
        ];

        let mut migration_sql = None;
        for path in &migration_paths {
            match std::fs::read_to_string(path) {
                Ok(content) => {
                    info!("Found migration file at: {}", path);
                    migration_sql = Some(content);
                    break;
                }
                Err(e) => {
                    debug!("Tried path '{}': {}", path, e);
                }
            }
        }

        let migration_sql = migration_sql.ok_or_else(|| {
            error!("Could not find migration file. Current dir: {}. Tried paths: {:?}", current_dir, migration_paths);
            DatabaseError::MigrationError(format!(
                "Could not find migration file. Current directory: {}. Tried paths: {:?}",
                current_dir, migration_paths
            ))
        })?;

        info!("Executing migration SQL ({} bytes)...", migration_sql.len());

        match client.batch_execute(&migration_sql).await {
            Ok(_) => {
                info!("Migrations completed successfully");
                Ok(())
            }
            Err(e) => {
                // 42P07 = duplicate_table, 42710 = duplicate_object
                let is_duplicate = e
                    .code()
                    .map(|code| matches!(code.code(), "42P07" | "42710"))
                    .unwrap_or(false);

                if is_duplicate || e.to_string().contains("already exists") {
                    warn!("Some database objects already exist ({}). This is OK if migrations were run before.", e);
                    Ok(())
                } else {
                    let detail = e
                        .as_db_error()
                        .and_then(|db_err| db_err.detail())
                        .unwrap_or("No detail available");
                    error!("Migration execution error: {} ({})", e, detail);
                    Err(DatabaseError::MigrationError(format!("{}: {}", e, detail)))
                }
            }
        }
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Run a store future under the configured timeout.
    ///
    /// A call that outlives the bound is reported as failed; whatever the
    /// server already did with it is not rolled back.
    pub async fn bounded<T, F>(&self, call: F) -> Result<T, DatabaseError>
    where
        F: Future<Output = Result<T, DatabaseError>>,
    {
        match tokio::time::timeout(self.op_timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Store call exceeded {:?}", self.op_timeout);
                Err(DatabaseError::Timeout(self.op_timeout))
            }
        }
    }
}

// Re-export commonly used items
pub use memory::MemoryStore;
pub use models::*;
pub use store::{BookingStore, HealthProbe, HomestayStore, PaymentStore};
