//! Connection pool and schema setup for the catalog store.
//!
//! Both PostgreSQL and SQLite URLs are accepted; the migrator creates the same
//! schema on either.

use crate::config::AppConfig;
use crate::errors::ServiceError;
use metrics::{counter, gauge};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use std::time::Duration;
use tracing::{debug, error, info};

pub type DbPool = DatabaseConnection;

/// Pool tuning
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
    pub acquire_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            acquire_timeout: Duration::from_secs(8),
        }
    }
}

impl From<&AppConfig> for DbConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            url: cfg.database_url.clone(),
            max_connections: cfg.pool.max_connections,
            min_connections: cfg.pool.min_connections,
            connect_timeout: Duration::from_secs(cfg.pool.connect_timeout_secs),
            idle_timeout: Duration::from_secs(cfg.pool.idle_timeout_secs),
            acquire_timeout: Duration::from_secs(cfg.pool.acquire_timeout_secs),
        }
    }
}

/// Every pooled connection to `sqlite::memory:` opens its own empty database.
fn is_in_memory_sqlite(url: &str) -> bool {
    url.starts_with("sqlite::memory:") || url.contains("mode=memory")
}

impl DbConfig {
    /// Pool bounds actually used for this URL.
    fn effective_bounds(&self) -> (u32, u32) {
        if is_in_memory_sqlite(&self.url) {
            (1, 1)
        } else {
            let max = self.max_connections.max(1);
            (max, self.min_connections.min(max))
        }
    }
}

pub async fn establish_connection_with_config(config: &DbConfig) -> Result<DbPool, ServiceError> {
    let (max_connections, min_connections) = config.effective_bounds();
    debug!(max_connections, min_connections, "Configuring catalog database pool");

    let mut opt = ConnectOptions::new(config.url.clone());
    opt.max_connections(max_connections)
        .min_connections(min_connections)
        .connect_timeout(config.connect_timeout)
        .acquire_timeout(config.acquire_timeout)
        .sqlx_logging(false);
    // Closing the only in-memory connection would drop the schema with it.
    if !is_in_memory_sqlite(&config.url) {
        opt.idle_timeout(config.idle_timeout);
    }

    gauge!("catalog.db.max_connections", max_connections as f64);

    let pool = Database::connect(opt).await.map_err(|e| {
        error!("Catalog database connection failed: {}", e);
        counter!("catalog.db.connection_failures", 1);
        ServiceError::DatabaseError(e)
    })?;

    info!(max_connections, "Catalog database pool ready");
    Ok(pool)
}

pub async fn establish_connection_from_app_config(cfg: &AppConfig) -> Result<DbPool, ServiceError> {
    establish_connection_with_config(&DbConfig::from(cfg)).await
}

/// Applies pending catalog migrations. Already-applied ones are skipped.
pub async fn run_migrations(pool: &DbPool) -> Result<(), ServiceError> {
    let start = std::time::Instant::now();
    let pending = crate::migrator::Migrator::get_pending_migrations(pool)
        .await
        .map(|m| m.len())
        .unwrap_or(0);

    crate::migrator::Migrator::up(pool, None).await.map_err(|e| {
        error!(elapsed = ?start.elapsed(), "Catalog migrations failed: {}", e);
        ServiceError::DatabaseError(e)
    })?;

    info!(applied = pending, elapsed = ?start.elapsed(), "Catalog schema up to date");
    Ok(())
}

/// Pings the database, recording latency and failures.
pub async fn check_connection(pool: &DbPool) -> Result<Duration, ServiceError> {
    let start = std::time::Instant::now();
    match pool.ping().await {
        Ok(()) => {
            let elapsed = start.elapsed();
            gauge!("catalog.db.ping_latency_ms", elapsed.as_millis() as f64);
            Ok(elapsed)
        }
        Err(e) => {
            counter!("catalog.db.connection_failures", 1);
            Err(ServiceError::DatabaseError(e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_config_tuning_reaches_the_pool() {
        let mut app = AppConfig::new(
            "postgres://localhost/catalog".into(),
            "127.0.0.1".into(),
            8080,
            "test".into(),
        );
        app.pool.max_connections = 3;
        app.pool.min_connections = 5;
        app.pool.acquire_timeout_secs = 2;

        let cfg = DbConfig::from(&app);
        assert_eq!(cfg.acquire_timeout, Duration::from_secs(2));
        assert_eq!(cfg.effective_bounds(), (3, 3));
    }

    #[test]
    fn in_memory_sqlite_uses_one_connection() {
        let cfg = DbConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 8,
            ..Default::default()
        };
        assert_eq!(cfg.effective_bounds(), (1, 1));
        assert!(is_in_memory_sqlite("sqlite://file:catalog?mode=memory&cache=shared"));
        assert!(!is_in_memory_sqlite("sqlite://catalog.db?mode=rwc"));
    }

    #[tokio::test]
    async fn migrations_apply_once_on_sqlite() {
        let pool = establish_connection_with_config(&DbConfig {
            url: "sqlite::memory:".to_string(),
            ..Default::default()
        })
        .await
        .expect("connect");
        run_migrations(&pool).await.expect("migrate");
        check_connection(&pool).await.expect("ping");

        run_migrations(&pool).await.expect("second run is a no-op");
        assert!(crate::migrator::Migrator::get_pending_migrations(&pool)
            .await
            .expect("pending")
            .is_empty());
    }
}
