//! Prometheus metrics for the database connection pool
//!
//! Tracks pool size by state and connection acquisition latency.

use deadpool_postgres::{Object, Pool};
use once_cell::sync::Lazy;
use prometheus::{register_histogram_vec, register_int_gauge_vec, HistogramVec, IntGaugeVec};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// Database connection pool size by state (idle/active/max)
static DB_POOL_CONNECTIONS: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "db_pool_connections",
        "Database pool connection count by state",
        &["service", "state"]
    )
    .expect("metrics registration succeeds at startup")
});

/// Time to acquire a connection from the pool
static DB_POOL_ACQUIRE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "db_pool_acquire_duration_seconds",
        "Time to acquire connection from pool",
        &["service"],
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]
    )
    .expect("metrics registration succeeds at startup")
});

fn update_pool_metrics(pool: &Pool, service: &str) {
    let status = pool.status();
    let size = status.size as i64;
    let idle = status.available as i64;

    DB_POOL_CONNECTIONS
        .with_label_values(&[service, "idle"])
        .set(idle);
    DB_POOL_CONNECTIONS
        .with_label_values(&[service, "active"])
        .set(size - idle);
    DB_POOL_CONNECTIONS
        .with_label_values(&[service, "max"])
        .set(status.max_size as i64);
}

/// Acquire a connection from the pool and record acquisition latency
pub async fn acquire_with_metrics(
    pool: &Pool,
    service: &str,
) -> Result<Object, deadpool_postgres::PoolError> {
    let start = Instant::now();
    let result = pool.get().await;

    DB_POOL_ACQUIRE_DURATION
        .with_label_values(&[service])
        .observe(start.elapsed().as_secs_f64());

    result
}

/// Periodically sample pool state into the gauges
pub fn spawn_metrics_sampler(pool: Pool, service: String, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            update_pool_metrics(&pool, &service);
        }
    })
}
