//! Database abstraction layer.
//!
//! This module provides pool acquisition functionality:
//! - Engine-specific DSN construction and parsing
//! - Pool sizing and the `sqlx` pool opener
//! - Per-engine adapters caching one pool per role
//! - The registry dispatching (engine, role) requests to adapters
//! - Database dispatch macros for reducing code duplication

#[macro_use]
pub mod macros;
pub mod adapter;
pub mod dsn;
pub mod pool;
pub mod registry;

pub use adapter::EngineAdapter;
pub use pool::{
    ConnectMode, DbPool, ManagedPool, PoolHandle, PoolOpener, PoolSizing, SqlxPoolOpener,
};
pub use registry::{PoolRegistry, SlotSummary};
