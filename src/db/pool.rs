//! Connection pool handles and the pool-opening routine.
//!
//! This module provides the engine-specific pool type (`MySqlPool`, `PgPool`),
//! the fixed sizing policy applied to every pool, and the [`PoolOpener`] seam
//! through which adapters open new pools.

use crate::config::DEFAULT_CONNECT_TIMEOUT_SECS;
use crate::db::dsn;
use crate::error::{DbError, DbResult};
use crate::models::{Engine, Role};
use sqlx::pool::PoolOptions;
use sqlx::{Database, MySql, MySqlPool, PgPool, Postgres};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

// Sizing policy for every pool. Connections must not outlive a short-lived
// invocation, and a pool never takes more than 10 of the server's connections.
pub const MAX_LIFETIME: Duration = Duration::from_secs(60);
pub const MAX_IDLE_TIME: Duration = Duration::from_secs(60);
pub const MAX_IDLE_CONNECTIONS: u32 = 10;
pub const MAX_OPEN_CONNECTIONS: u32 = 10;

/// Size and lifetime limits of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSizing {
    pub max_lifetime: Duration,
    pub max_idle_time: Duration,
    pub max_idle_connections: u32,
    pub max_open_connections: u32,
}

impl Default for PoolSizing {
    fn default() -> Self {
        Self {
            max_lifetime: MAX_LIFETIME,
            max_idle_time: MAX_IDLE_TIME,
            max_idle_connections: MAX_IDLE_CONNECTIONS,
            max_open_connections: MAX_OPEN_CONNECTIONS,
        }
    }
}

impl PoolSizing {
    /// Build `sqlx` pool options carrying this sizing.
    ///
    /// `sqlx` never keeps more idle connections than `max_connections`, so
    /// the idle cap is enforced by `max_open_connections` as long as
    /// `max_idle_connections >= max_open_connections`.
    pub fn pool_options<DB: Database>(&self, acquire_timeout: Duration) -> PoolOptions<DB> {
        PoolOptions::<DB>::new()
            .min_connections(0)
            .max_connections(self.max_open_connections)
            .max_lifetime(self.max_lifetime)
            .idle_timeout(self.max_idle_time)
            .acquire_timeout(acquire_timeout)
    }

    /// Read the sizing back from the options a live pool was built with.
    pub fn from_options<DB: Database>(options: &PoolOptions<DB>) -> Self {
        let max_open_connections = options.get_max_connections();
        Self {
            max_lifetime: options.get_max_lifetime().unwrap_or(Duration::MAX),
            max_idle_time: options.get_idle_timeout().unwrap_or(Duration::MAX),
            max_idle_connections: max_open_connections,
            max_open_connections,
        }
    }
}

/// Database-specific connection pool.
#[derive(Debug, Clone)]
pub enum DbPool {
    MySql(MySqlPool),
    Postgres(PgPool),
}

impl DbPool {
    /// Get the engine for this pool.
    pub fn engine(&self) -> Engine {
        match self {
            DbPool::MySql(_) => Engine::MySql,
            DbPool::Postgres(_) => Engine::Postgres,
        }
    }

    /// Number of connections currently held (idle and in use).
    pub fn size(&self) -> u32 {
        impl_db_dispatch!(self, |pool| pool.size())
    }

    pub fn num_idle(&self) -> usize {
        impl_db_dispatch!(self, |pool| pool.num_idle())
    }

    pub fn is_closed(&self) -> bool {
        impl_db_dispatch!(self, |pool| pool.is_closed())
    }

    /// Sizing the live pool was configured with.
    pub fn sizing(&self) -> PoolSizing {
        impl_db_dispatch!(self, |pool| PoolSizing::from_options(pool.options()))
    }

    pub fn as_mysql(&self) -> Option<&MySqlPool> {
        match self {
            DbPool::MySql(pool) => Some(pool),
            DbPool::Postgres(_) => None,
        }
    }

    pub fn as_postgres(&self) -> Option<&PgPool> {
        match self {
            DbPool::Postgres(pool) => Some(pool),
            DbPool::MySql(_) => None,
        }
    }
}

/// A pool cached in a registry slot.
#[derive(Debug)]
pub struct ManagedPool {
    engine: Engine,
    role: Role,
    host: String,
    database: String,
    pool: DbPool,
    created_at: Instant,
}

/// Shared handle to a cached pool. Compare with `Arc::ptr_eq`.
pub type PoolHandle = Arc<ManagedPool>;

impl ManagedPool {
    pub fn new(
        engine: Engine,
        role: Role,
        host: impl Into<String>,
        database: impl Into<String>,
        pool: DbPool,
    ) -> Self {
        Self {
            engine,
            role,
            host: host.into(),
            database: database.into(),
            pool,
            created_at: Instant::now(),
        }
    }

    pub fn engine(&self) -> Engine {
        self.engine
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Get a reference to the underlying pool.
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn sizing(&self) -> PoolSizing {
        self.pool.sizing()
    }
}

/// Opens a new pool for an engine tag and DSN.
pub trait PoolOpener: Send + Sync {
    fn open(
        &self,
        engine: Engine,
        dsn: &str,
        sizing: &PoolSizing,
    ) -> impl Future<Output = DbResult<DbPool>> + Send;
}

/// Whether a new pool connects before it is handed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectMode {
    /// Open one connection up front; bad credentials fail pool creation.
    #[default]
    Eager,
    /// Build the pool without I/O; connections open on first use.
    Lazy,
}

/// [`PoolOpener`] backed by `sqlx`.
#[derive(Debug, Clone)]
pub struct SqlxPoolOpener {
    connect_timeout: Duration,
    mode: ConnectMode,
}

impl SqlxPoolOpener {
    pub fn new(connect_timeout: Duration, mode: ConnectMode) -> Self {
        Self {
            connect_timeout,
            mode,
        }
    }

    /// Opener that builds pools without connecting.
    pub fn lazy() -> Self {
        Self::new(
            Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            ConnectMode::Lazy,
        )
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn mode(&self) -> ConnectMode {
        self.mode
    }

    fn connect_error(&self, engine: Engine, err: sqlx::Error) -> DbError {
        if matches!(err, sqlx::Error::PoolTimedOut) {
            return DbError::timeout(
                format!("{} connect", engine),
                self.connect_timeout.as_secs(),
            );
        }

        let suggestion = connection_suggestion(engine, &err);
        match DbError::from(err) {
            DbError::Connection { message, .. } => DbError::connection(message, suggestion),
            other => other,
        }
    }
}

impl Default for SqlxPoolOpener {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            ConnectMode::Eager,
        )
    }
}

impl PoolOpener for SqlxPoolOpener {
    async fn open(&self, engine: Engine, dsn: &str, sizing: &PoolSizing) -> DbResult<DbPool> {
        debug!(engine = %engine, mode = ?self.mode, "Opening sqlx pool");

        match engine {
            Engine::MySql => {
                let options = dsn::mysql_connect_options(dsn)?;
                let pool_options = sizing.pool_options::<MySql>(self.connect_timeout);
                let pool = match self.mode {
                    ConnectMode::Lazy => pool_options.connect_lazy_with(options),
                    ConnectMode::Eager => pool_options
                        .connect_with(options)
                        .await
                        .map_err(|e| self.connect_error(engine, e))?,
                };
                Ok(DbPool::MySql(pool))
            }
            Engine::Postgres => {
                let options = dsn::postgres_connect_options(dsn)?;
                let pool_options = sizing.pool_options::<Postgres>(self.connect_timeout);
                let pool = match self.mode {
                    ConnectMode::Lazy => pool_options.connect_lazy_with(options),
                    ConnectMode::Eager => pool_options
                        .connect_with(options)
                        .await
                        .map_err(|e| self.connect_error(engine, e))?,
                };
                Ok(DbPool::Postgres(pool))
            }
        }
    }
}

/// Generate a helpful suggestion for connection errors.
pub fn connection_suggestion(engine: Engine, error: &sqlx::Error) -> String {
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") {
        return format!("Check that the {} server is running and accessible", engine);
    }

    if error_str.contains("authentication") || error_str.contains("password") {
        return "Verify the user and password configured for this role".to_string();
    }

    if error_str.contains("does not exist") || error_str.contains("unknown database") {
        return "Check that the database name exists".to_string();
    }

    if error_str.contains("tls") || error_str.contains("ssl") {
        return "Check TLS/SSL configuration on the server".to_string();
    }

    match engine {
        Engine::Postgres => {
            "Verify the host, port and dbname settings (default port 5432)".to_string()
        }
        Engine::MySql => "Verify the host, port and database settings (default port 3306)".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sizing() {
        let sizing = PoolSizing::default();
        assert_eq!(sizing.max_lifetime, Duration::from_secs(60));
        assert_eq!(sizing.max_idle_time, Duration::from_secs(60));
        assert_eq!(sizing.max_idle_connections, 10);
        assert_eq!(sizing.max_open_connections, 10);
    }

    #[test]
    fn test_pool_options_round_trip_sizing() {
        let sizing = PoolSizing::default();
        let options = sizing.pool_options::<MySql>(Duration::from_secs(5));
        assert_eq!(PoolSizing::from_options(&options), sizing);
        assert_eq!(options.get_acquire_timeout(), Duration::from_secs(5));
        assert_eq!(options.get_min_connections(), 0);
    }

    #[test]
    fn test_connect_error_reports_configured_timeout() {
        let opener = SqlxPoolOpener::new(Duration::from_secs(7), ConnectMode::Eager);
        let err = opener.connect_error(Engine::MySql, sqlx::Error::PoolTimedOut);
        assert!(matches!(err, DbError::Timeout { elapsed_secs: 7, .. }));
        assert_eq!(err.to_string(), "Timeout: MySQL connect exceeded 7s");
    }

    #[test]
    fn test_connect_error_keeps_engine_suggestion() {
        let opener = SqlxPoolOpener::default();
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "Connection refused");
        let err = opener.connect_error(Engine::Postgres, sqlx::Error::Io(io));

        assert!(matches!(err, DbError::Connection { .. }));
        assert!(err.to_string().contains("Connection refused"));
        assert_eq!(
            err.suggestion(),
            Some("Check that the PostgreSQL server is running and accessible")
        );
        assert!(err.is_retryable());
    }

    #[test]
    fn test_connect_error_falls_through_for_other_sqlx_errors() {
        let opener = SqlxPoolOpener::default();
        let err = opener.connect_error(Engine::MySql, sqlx::Error::WorkerCrashed);
        assert!(matches!(err, DbError::Internal { .. }));
    }

    #[tokio::test]
    async fn test_lazy_opener_builds_sized_pool_without_io() {
        let opener = SqlxPoolOpener::lazy();
        let pool = opener
            .open(
                Engine::Postgres,
                "user=u password=p host=127.0.0.1 dbname=d sslmode=disable",
                &PoolSizing::default(),
            )
            .await
            .unwrap();

        assert_eq!(pool.engine(), Engine::Postgres);
        assert_eq!(pool.size(), 0);
        assert!(!pool.is_closed());
        assert_eq!(pool.sizing(), PoolSizing::default());
        assert!(pool.as_postgres().is_some());
        assert!(pool.as_mysql().is_none());
    }

    #[tokio::test]
    async fn test_opener_rejects_invalid_dsn_before_connecting() {
        let opener = SqlxPoolOpener::default();
        let result = opener
            .open(Engine::MySql, "not a dsn", &PoolSizing::default())
            .await;
        assert!(matches!(result, Err(DbError::InvalidDsn { .. })));
    }

    #[test]
    fn test_connection_suggestion_refused() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "Connection refused");
        let suggestion = connection_suggestion(Engine::MySql, &sqlx::Error::Io(io));
        assert!(suggestion.contains("MySQL server is running"));
    }
}
