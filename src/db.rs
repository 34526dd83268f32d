use crate::error::AppError;
use crate::websocket::reconnect::ReconnectPolicy;
use db_pool::{acquire_with_metrics, create_pool, DbConfig, PgPool};
use tracing::{info, warn};

pub const SERVICE_NAME: &str = "messaging-service";

const MIGRATIONS: &[(&str, &str)] = &[(
    "0001_init",
    include_str!("../migrations/0001_init.sql"),
)];

const STARTUP_ATTEMPTS: u32 = 5;

pub async fn init_pool(database_url: &str) -> Result<PgPool, AppError> {
    let mut config = DbConfig::from_env(SERVICE_NAME).unwrap_or_default();
    config.service_name = SERVICE_NAME.to_owned();
    config.database_url = database_url.to_owned();
    config.log_config();

    let pool = create_pool(config)
        .await
        .map_err(|e| AppError::Config(format!("database pool: {e}")))?;

    // the database often comes up after the service; retry with backoff
    // before giving up
    let mut policy = ReconnectPolicy::default();
    loop {
        match run_migrations(&pool).await {
            Ok(()) => return Ok(pool),
            Err(e) if policy.attempt() + 1 < STARTUP_ATTEMPTS => {
                let delay = policy.next_delay();
                warn!(error = %e, retry_in = ?delay, "database not ready");
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Apply bundled migrations in order. Statements are idempotent
/// (CREATE ... IF NOT EXISTS), so reruns on restart are safe.
async fn run_migrations(pool: &PgPool) -> Result<(), AppError> {
    let client = acquire_with_metrics(pool, SERVICE_NAME).await?;
    for (name, sql) in MIGRATIONS {
        client.batch_execute(sql).await?;
        info!(migration = name, "migration applied");
    }
    Ok(())
}
