//! Integration tests against real servers.
//!
//! Set TEST_MYSQL_HOST / TEST_POSTGRES_HOST (plus _USER, _PASSWORD, _DATABASE)
//! to run these tests; they are skipped otherwise.
//! Example: TEST_MYSQL_HOST=127.0.0.1:3306 TEST_MYSQL_USER=root TEST_MYSQL_PASSWORD=root TEST_MYSQL_DATABASE=test_db

use pool_registry::config::StaticConfig;
use pool_registry::db::PoolRegistry;
use pool_registry::{ConnectionConfig, Engine, Role};
use std::sync::Arc;

fn live_config(engine: Engine) -> Option<ConnectionConfig> {
    let prefix = format!("TEST_{}", engine.tag().to_ascii_uppercase());
    let var = |field: &str| std::env::var(format!("{}_{}", prefix, field)).ok();

    let host = match var("HOST") {
        Some(host) => host,
        None => {
            eprintln!("Skipping test: {}_HOST not set", prefix);
            return None;
        }
    };

    Some(ConnectionConfig::new(
        engine,
        host,
        var("USER").unwrap_or_else(|| "root".to_string()),
        var("PASSWORD").unwrap_or_default(),
        var("DATABASE").unwrap_or_else(|| "test".to_string()),
    ))
}

fn registry_for(connection: ConnectionConfig) -> PoolRegistry<StaticConfig> {
    let config = StaticConfig::new()
        .with(Role::Slave, connection.clone())
        .with(Role::Master, connection);
    PoolRegistry::new(config)
}

#[tokio::test]
async fn test_mysql_pools_connect_and_are_cached() {
    let Some(connection) = live_config(Engine::MySql) else {
        return;
    };
    let registry = registry_for(connection);

    let slave = registry.acquire(Engine::MySql, Role::Slave).await.unwrap();
    let master = registry.acquire(Engine::MySql, Role::Master).await.unwrap();
    assert!(!Arc::ptr_eq(&slave, &master));

    let pool = slave.pool().as_mysql().unwrap();
    let one: i64 = sqlx::query_scalar("SELECT 1").fetch_one(pool).await.unwrap();
    assert_eq!(one, 1);
    assert!(slave.pool().size() >= 1);
    assert!(slave.pool().size() <= 10);

    let again = registry.acquire(Engine::MySql, Role::Slave).await.unwrap();
    assert!(Arc::ptr_eq(&slave, &again));
}

#[tokio::test]
async fn test_postgres_pools_connect_without_tls() {
    let Some(connection) = live_config(Engine::Postgres) else {
        return;
    };
    let registry = registry_for(connection);

    let master = registry.acquire(Engine::Postgres, Role::Master).await.unwrap();
    let pool = master.pool().as_postgres().unwrap();

    let ssl: Option<bool> = sqlx::query_scalar("SELECT ssl FROM pg_stat_ssl WHERE pid = pg_backend_pid()")
        .fetch_optional(pool)
        .await
        .unwrap();
    assert_ne!(ssl, Some(true));
}

#[tokio::test]
async fn test_wrong_password_is_reported_and_retryable() {
    let Some(mut connection) = live_config(Engine::MySql) else {
        return;
    };
    connection.password = "definitely-not-the-password".to_string();
    let registry = registry_for(connection);

    let err = registry
        .acquire(Engine::MySql, Role::Slave)
        .await
        .unwrap_err();
    assert!(err.is_retryable());
    assert!(!registry.is_populated(Engine::MySql, Role::Slave));
}
