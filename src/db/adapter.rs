//! Per-engine pool cache.
//!
//! An [`EngineAdapter`] owns one slot per [`Role`]. A slot is a
//! `tokio::sync::OnceCell`, so concurrent callers on an empty slot wait for a
//! single creation and all receive the same handle. If creation fails the cell
//! stays empty and the next caller starts over.
//!
//! Slots only move from empty to populated; there is no reset.

use crate::config::ConfigSource;
use crate::db::dsn;
use crate::db::pool::{ManagedPool, PoolHandle, PoolOpener, PoolSizing};
use crate::error::{DbError, DbResult};
use crate::models::{Engine, Role};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

pub struct EngineAdapter {
    engine: Engine,
    slave: OnceCell<PoolHandle>,
    master: OnceCell<PoolHandle>,
}

impl EngineAdapter {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            slave: OnceCell::new(),
            master: OnceCell::new(),
        }
    }

    pub fn engine(&self) -> Engine {
        self.engine
    }

    fn slot(&self, role: Role) -> &OnceCell<PoolHandle> {
        match role {
            Role::Slave => &self.slave,
            Role::Master => &self.master,
        }
    }

    /// The cached handle for `role`, without creating one.
    pub fn cached(&self, role: Role) -> Option<PoolHandle> {
        self.slot(role).get().cloned()
    }

    pub fn is_populated(&self, role: Role) -> bool {
        self.slot(role).initialized()
    }

    /// Get or create the pool for `role`.
    pub async fn resolve<C, O>(&self, role: Role, config: &C, opener: &O) -> DbResult<PoolHandle>
    where
        C: ConfigSource + ?Sized,
        O: PoolOpener,
    {
        let slot = self.slot(role);

        if let Some(handle) = slot.get() {
            debug!(engine = %self.engine, role = %role, "Returning cached pool");
            return Ok(Arc::clone(handle));
        }

        let handle = slot
            .get_or_try_init(|| self.create(role, config, opener))
            .await?;

        Ok(Arc::clone(handle))
    }

    /// Get or create the pool for a role given by name.
    ///
    /// An unknown role is rejected before any slot is touched.
    pub async fn resolve_named<C, O>(
        &self,
        role: &str,
        config: &C,
        opener: &O,
    ) -> DbResult<PoolHandle>
    where
        C: ConfigSource + ?Sized,
        O: PoolOpener,
    {
        let role: Role = role.parse()?;
        self.resolve(role, config, opener).await
    }

    async fn create<C, O>(&self, role: Role, config: &C, opener: &O) -> DbResult<PoolHandle>
    where
        C: ConfigSource + ?Sized,
        O: PoolOpener,
    {
        let engine = self.engine;

        let connection = config
            .connection_config(engine, role)
            .map_err(|e| DbError::pool_creation(engine, role, e))?;
        let dsn = dsn::build(engine, &connection);

        info!(
            engine = %engine,
            role = %role,
            dsn = %dsn::masked(engine, &connection),
            "Creating connection pool"
        );

        let pool = opener
            .open(connection.engine, &dsn, &PoolSizing::default())
            .await
            .map_err(|e| {
                warn!(engine = %engine, role = %role, error = %e, "Pool creation failed");
                DbError::pool_creation(engine, role, e)
            })?;

        info!(
            engine = %engine,
            role = %role,
            host = %connection.host,
            database = %connection.database,
            "Connection pool ready"
        );

        Ok(Arc::new(ManagedPool::new(
            engine,
            role,
            connection.host,
            connection.database,
            pool,
        )))
    }
}

impl std::fmt::Debug for EngineAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineAdapter")
            .field("engine", &self.engine)
            .field("slave", &self.slave.initialized())
            .field("master", &self.master.initialized())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StaticConfig;
    use crate::db::pool::SqlxPoolOpener;
    use crate::models::ConnectionConfig;

    fn mysql_config() -> StaticConfig {
        StaticConfig::new()
            .with(
                Role::Slave,
                ConnectionConfig::new(Engine::MySql, "127.0.0.1:3306", "u", "p", "d"),
            )
            .with(
                Role::Master,
                ConnectionConfig::new(Engine::MySql, "127.0.0.1:3306", "u", "p", "d"),
            )
    }

    #[tokio::test]
    async fn test_resolve_caches_per_role() {
        let adapter = EngineAdapter::new(Engine::MySql);
        let config = mysql_config();
        let opener = SqlxPoolOpener::lazy();

        let slave = adapter.resolve(Role::Slave, &config, &opener).await.unwrap();
        assert!(adapter.is_populated(Role::Slave));
        assert!(!adapter.is_populated(Role::Master));

        let again = adapter.resolve(Role::Slave, &config, &opener).await.unwrap();
        assert!(Arc::ptr_eq(&slave, &again));

        let master = adapter.resolve(Role::Master, &config, &opener).await.unwrap();
        assert!(!Arc::ptr_eq(&slave, &master));
        assert_eq!(master.role(), Role::Master);
        assert_eq!(master.engine(), Engine::MySql);
    }

    #[tokio::test]
    async fn test_resolve_named_unknown_role_leaves_slots_empty() {
        let adapter = EngineAdapter::new(Engine::MySql);
        let result = adapter
            .resolve_named("replica", &mysql_config(), &SqlxPoolOpener::lazy())
            .await;

        assert!(matches!(result, Err(DbError::UnsupportedRole { .. })));
        assert!(!adapter.is_populated(Role::Slave));
        assert!(!adapter.is_populated(Role::Master));
    }

    #[tokio::test]
    async fn test_missing_config_leaves_slot_empty() {
        let adapter = EngineAdapter::new(Engine::Postgres);
        let result = adapter
            .resolve(Role::Slave, &StaticConfig::new(), &SqlxPoolOpener::lazy())
            .await;

        let err = result.unwrap_err();
        assert!(matches!(err, DbError::PoolCreation { .. }));
        assert!(adapter.cached(Role::Slave).is_none());
    }
}
