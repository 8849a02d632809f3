//! Process-wide pool registry.
//!
//! A [`PoolRegistry`] holds one [`EngineAdapter`] per supported engine and
//! dispatches every acquire to the adapter for the requested engine. It is
//! constructed once at startup and shared by reference or `Arc`; it does no
//! caching of its own.

use crate::config::ConfigSource;
use crate::db::adapter::EngineAdapter;
use crate::db::pool::{PoolHandle, PoolOpener, SqlxPoolOpener};
use crate::error::DbResult;
use crate::models::{ConnectRequest, Engine, Role};
use serde::Serialize;

/// Description of a populated slot (no secrets exposed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotSummary {
    pub engine: Engine,
    pub role: Role,
    pub host: String,
    pub database: String,
    pub max_lifetime_secs: u64,
    pub max_idle_time_secs: u64,
    pub max_idle_connections: u32,
    pub max_open_connections: u32,
}

impl SlotSummary {
    fn from_handle(handle: &PoolHandle) -> Self {
        let sizing = handle.sizing();
        Self {
            engine: handle.engine(),
            role: handle.role(),
            host: handle.host().to_string(),
            database: handle.database().to_string(),
            max_lifetime_secs: sizing.max_lifetime.as_secs(),
            max_idle_time_secs: sizing.max_idle_time.as_secs(),
            max_idle_connections: sizing.max_idle_connections,
            max_open_connections: sizing.max_open_connections,
        }
    }
}

pub struct PoolRegistry<C, O = SqlxPoolOpener> {
    config: C,
    opener: O,
    mysql: EngineAdapter,
    postgres: EngineAdapter,
}

impl<C: ConfigSource> PoolRegistry<C, SqlxPoolOpener> {
    /// Create a registry that opens pools with the default `sqlx` opener.
    pub fn new(config: C) -> Self {
        Self::with_opener(config, SqlxPoolOpener::default())
    }
}

impl<C: ConfigSource, O: PoolOpener> PoolRegistry<C, O> {
    pub fn with_opener(config: C, opener: O) -> Self {
        Self {
            config,
            opener,
            mysql: EngineAdapter::new(Engine::MySql),
            postgres: EngineAdapter::new(Engine::Postgres),
        }
    }

    /// The adapter serving `engine`.
    pub fn adapter(&self, engine: Engine) -> &EngineAdapter {
        match engine {
            Engine::MySql => &self.mysql,
            Engine::Postgres => &self.postgres,
        }
    }

    pub fn config(&self) -> &C {
        &self.config
    }

    pub fn opener(&self) -> &O {
        &self.opener
    }

    /// Get or create the pool for (engine, role).
    ///
    /// Errors from pool creation are returned as-is; the slot stays empty and
    /// the next call retries.
    pub async fn acquire(&self, engine: Engine, role: Role) -> DbResult<PoolHandle> {
        self.adapter(engine)
            .resolve(role, &self.config, &self.opener)
            .await
    }

    pub async fn acquire_request(&self, request: ConnectRequest) -> DbResult<PoolHandle> {
        self.acquire(request.engine, request.role).await
    }

    /// Get or create a pool by engine and role name.
    ///
    /// An unknown engine yields [`DbError::UnsupportedEngine`](crate::DbError::UnsupportedEngine),
    /// which is fatal; an unknown role yields a recoverable
    /// [`DbError::UnsupportedRole`](crate::DbError::UnsupportedRole). Neither touches a slot.
    pub async fn acquire_named(&self, engine: &str, role: &str) -> DbResult<PoolHandle> {
        let engine: Engine = engine.parse()?;
        self.adapter(engine)
            .resolve_named(role, &self.config, &self.opener)
            .await
    }

    /// The cached handle for (engine, role), without creating one.
    pub fn cached(&self, engine: Engine, role: Role) -> Option<PoolHandle> {
        self.adapter(engine).cached(role)
    }

    pub fn is_populated(&self, engine: Engine, role: Role) -> bool {
        self.adapter(engine).is_populated(role)
    }

    /// Summaries of all populated slots, in (engine, role) order.
    pub fn summary(&self) -> Vec<SlotSummary> {
        Engine::ALL
            .into_iter()
            .flat_map(|engine| Role::ALL.into_iter().map(move |role| (engine, role)))
            .filter_map(|(engine, role)| self.cached(engine, role))
            .map(|handle| SlotSummary::from_handle(&handle))
            .collect()
    }
}

impl<C, O> std::fmt::Debug for PoolRegistry<C, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolRegistry")
            .field("mysql", &self.mysql)
            .field("postgres", &self.postgres)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StaticConfig;
    use crate::error::DbError;
    use crate::models::ConnectionConfig;
    use std::sync::Arc;

    fn registry() -> PoolRegistry<StaticConfig> {
        let config = StaticConfig::new()
            .with(
                Role::Slave,
                ConnectionConfig::new(Engine::MySql, "127.0.0.1:3306", "u", "p", "d"),
            )
            .with(
                Role::Master,
                ConnectionConfig::new(Engine::Postgres, "127.0.0.1", "u", "p", "d"),
            );
        PoolRegistry::with_opener(config, SqlxPoolOpener::lazy())
    }

    #[tokio::test]
    async fn test_registry_starts_empty() {
        let registry = registry();
        assert!(registry.summary().is_empty());
        for engine in Engine::ALL {
            for role in Role::ALL {
                assert!(!registry.is_populated(engine, role));
            }
        }
    }

    #[tokio::test]
    async fn test_acquire_dispatches_to_engine_adapter() {
        let registry = registry();

        let mysql = registry.acquire(Engine::MySql, Role::Slave).await.unwrap();
        assert_eq!(mysql.engine(), Engine::MySql);
        assert!(mysql.pool().as_mysql().is_some());

        let postgres = registry
            .acquire_request(ConnectRequest::new(Engine::Postgres, Role::Master))
            .await
            .unwrap();
        assert_eq!(postgres.engine(), Engine::Postgres);

        assert!(registry.is_populated(Engine::MySql, Role::Slave));
        assert!(!registry.is_populated(Engine::MySql, Role::Master));
        assert!(registry.is_populated(Engine::Postgres, Role::Master));
        assert!(!registry.is_populated(Engine::Postgres, Role::Slave));
    }

    #[tokio::test]
    async fn test_acquire_named() {
        let registry = registry();

        let first = registry.acquire_named("mysql", "SLAVE_DB").await.unwrap();
        let second = registry.acquire(Engine::MySql, Role::Slave).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let err = registry.acquire_named("oracle", "slave").await.unwrap_err();
        assert!(matches!(err, DbError::UnsupportedEngine { .. }));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_summary_lists_populated_slots() {
        let registry = registry();
        registry.acquire(Engine::Postgres, Role::Master).await.unwrap();
        registry.acquire(Engine::MySql, Role::Slave).await.unwrap();

        let summary = registry.summary();
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].engine, Engine::MySql);
        assert_eq!(summary[0].role, Role::Slave);
        assert_eq!(summary[0].host, "127.0.0.1:3306");
        assert_eq!(summary[1].engine, Engine::Postgres);
        assert_eq!(summary[1].max_lifetime_secs, 60);
        assert_eq!(summary[1].max_open_connections, 10);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json[0]["engine"], "mysql");
        assert_eq!(json[1]["role"], "master");
    }
}
