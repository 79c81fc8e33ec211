//! Configuration and connection pool construction. Single-backend
//! Postgres equivalent of the teacher's `DatabaseConfig` /
//! `DatabasePool` pair — the Sqlite branch is dropped because §5's
//! row-level locking (`SELECT ... FOR UPDATE`) is inherently
//! Postgres-specific, and the gRPC-facing parts of the teacher's
//! surface (server listen port as an active concern) are out of scope
//! per §1.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{error, info};

use ledger_core::Error;

/// Configuration for the ledger's database connection.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub connection_timeout_seconds: u64,
    /// Carried for a future transport layer; unused by this crate.
    pub listen_port: u16,
}

impl LedgerConfig {
    /// Load configuration from the environment. `DATABASE_URL` is
    /// required (no default, unlike the teacher's Sqlite fallback,
    /// since there is no embedded-database story here).
    /// `LEDGER_LISTEN_PORT` defaults to 8080.
    pub fn from_env() -> Result<Self, Error> {
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| Error::Validation("DATABASE_URL is required".to_string()))?;

        let max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .unwrap_or(10);

        let listen_port = std::env::var("LEDGER_LISTEN_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .unwrap_or(8080);

        let config = Self {
            database_url,
            max_connections,
            connection_timeout_seconds: 30,
            listen_port,
        };

        info!(
            max_connections = config.max_connections,
            listen_port = config.listen_port,
            "resolved ledger configuration"
        );

        Ok(config)
    }

    /// Open a connection pool and run pending migrations.
    pub async fn connect(&self) -> Result<PgPool, Error> {
        info!(
            max_connections = self.max_connections,
            "creating Postgres connection pool"
        );

        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(Duration::from_secs(self.connection_timeout_seconds))
            .connect(&self.database_url)
            .await
            .map_err(|e| {
                error!(error = %e, "failed to create connection pool");
                Error::Internal(format!("failed to create connection pool: {e}"))
            })?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                error!(error = %e, "failed to run migrations");
                Error::Internal(format!("failed to run migrations: {e}"))
            })?;

        info!("connection pool ready");
        Ok(pool)
    }
}

/// Plain health check, replacing the teacher's gRPC-facing health RPC
/// since there is no server here to expose it over.
pub async fn health_check(pool: &PgPool) -> Result<(), Error> {
    sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .map_err(|e| {
            error!(error = %e, "health check failed");
            Error::Internal(format!("health check failed: {e}"))
        })?;
    Ok(())
}

/// Connection pool statistics, mirroring the teacher's `ConnectionStats`.
#[derive(Debug, Clone)]
pub struct ConnectionStats {
    pub size: u32,
    pub idle: usize,
    pub is_closed: bool,
}

pub fn pool_stats(pool: &PgPool) -> ConnectionStats {
    ConnectionStats {
        size: pool.size(),
        idle: pool.num_idle(),
        is_closed: pool.is_closed(),
    }
}
