//! Database connection pool management
//!
//! Provides unified database pool creation and configuration for the
//! messaging workspace.

mod metrics;

pub use metrics::{acquire_with_metrics, spawn_metrics_sampler};

use deadpool_postgres::tokio_postgres::{Config as PgConfig, NoTls};
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod, Runtime};
pub use deadpool_postgres::PoolError;
use std::time::Duration;
use tracing::{debug, info};

/// Database connection pool configuration
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Service name for metrics labeling
    pub service_name: String,
    /// PostgreSQL connection URL
    pub database_url: String,
    /// Maximum number of connections
    pub max_connections: usize,
    /// Connection creation timeout (new connection to PostgreSQL)
    pub connect_timeout_secs: u64,
    /// Connection acquisition timeout (get connection from pool)
    pub acquire_timeout_secs: u64,
    /// Connection recycle timeout
    pub recycle_timeout_secs: u64,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            service_name: String::from("unknown"),
            database_url: String::new(),
            max_connections: 20,
            connect_timeout_secs: 5,
            acquire_timeout_secs: 10,
            recycle_timeout_secs: 5,
        }
    }
}

impl DbConfig {
    /// Create a new DbConfig from environment variables
    pub fn from_env(service_name: &str) -> Result<Self, String> {
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| "DATABASE_URL environment variable not set".to_string())?;

        Ok(Self {
            service_name: service_name.to_string(),
            database_url,
            max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(20),
            connect_timeout_secs: std::env::var("DB_CONNECT_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            acquire_timeout_secs: std::env::var("DB_ACQUIRE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            recycle_timeout_secs: std::env::var("DB_RECYCLE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
        })
    }

    /// Log pool configuration details
    pub fn log_config(&self) {
        info!(
            "Database pool configuration: service={}, max_connections={}, \
             connect_timeout={}s, acquire_timeout={}s",
            self.service_name,
            self.max_connections,
            self.connect_timeout_secs,
            self.acquire_timeout_secs,
        );
    }
}

pub type PgPool = Pool;

/// Errors raised while building the pool
#[derive(Debug, thiserror::Error)]
pub enum PoolInitError {
    #[error("invalid database url: {0}")]
    InvalidUrl(#[from] tokio_postgres::Error),
    #[error("pool build failed: {0}")]
    Build(#[from] deadpool_postgres::BuildError),
}

/// Build a deadpool-postgres pool from the given configuration
pub async fn create_pool(config: DbConfig) -> Result<PgPool, PoolInitError> {
    debug!(
        "Creating database pool: service={}, max={}, acquire_timeout={}s",
        config.service_name, config.max_connections, config.acquire_timeout_secs,
    );

    let pg_config: PgConfig = config.database_url.parse()?;

    let mgr_config = ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    };
    let manager = Manager::from_config(pg_config, NoTls, mgr_config);

    let pool = Pool::builder(manager)
        .max_size(config.max_connections)
        .runtime(Runtime::Tokio1)
        .wait_timeout(Some(Duration::from_secs(config.acquire_timeout_secs)))
        .create_timeout(Some(Duration::from_secs(config.connect_timeout_secs)))
        .recycle_timeout(Some(Duration::from_secs(config.recycle_timeout_secs)))
        .build()?;

    info!(
        service = %config.service_name,
        max_connections = config.max_connections,
        "database pool created"
    );

    Ok(pool)
}
