//! Pool Registry Library
//!
//! This library lazily opens and caches one connection pool per
//! (engine, role) pair for MySQL and PostgreSQL, with a read-only `slave`
//! role and a read-write `master` role.

pub mod config;
pub mod db;
pub mod error;
pub mod models;

pub use config::{Config, ConfigSource, StaticConfig};
pub use db::{PoolHandle, PoolRegistry};
pub use error::{DbError, DbResult};
pub use models::{ConnectRequest, ConnectionConfig, Engine, Role};
