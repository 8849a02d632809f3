//! Configuration handling for the pool registry.
//!
//! This module provides configuration management via CLI arguments and environment
//! variables, and the [`ConfigSource`] seam through which adapters read the
//! connection settings of one (engine, role) slot.

use crate::error::{DbError, DbResult};
use crate::models::{ConnectRequest, ConnectionConfig, Engine, Role};
use clap::Parser;
use std::collections::HashMap;
use std::time::Duration;

pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Supplies connection settings per (engine, role).
///
/// Called only when a slot is populated, never on a cache hit.
pub trait ConfigSource: Send + Sync {
    fn connection_config(&self, engine: Engine, role: Role) -> DbResult<ConnectionConfig>;
}

impl<T: ConfigSource + ?Sized> ConfigSource for std::sync::Arc<T> {
    fn connection_config(&self, engine: Engine, role: Role) -> DbResult<ConnectionConfig> {
        (**self).connection_config(engine, role)
    }
}

/// Connection settings of one slot as given on the command line / environment.
#[derive(Debug, Clone, Copy)]
struct SlotSettings<'a> {
    host: Option<&'a str>,
    user: Option<&'a str>,
    password: Option<&'a str>,
    database: Option<&'a str>,
}

/// Environment variable for one setting, e.g. `MYSQL_SLAVE_HOST`.
pub fn setting_env(engine: Engine, role: Role, field: &str) -> String {
    format!("{}_{}_{}", engine.tag(), role.tag(), field).to_ascii_uppercase()
}

/// CLI flag for one setting, e.g. `--mysql-slave-host`.
pub fn setting_flag(engine: Engine, role: Role, field: &str) -> String {
    format!("--{}-{}-{}", engine.tag(), role.tag(), field)
}

/// Configuration for the pool registry.
#[derive(Clone, Parser)]
#[command(
    name = "pool-registry",
    about = "Open and cache MySQL/PostgreSQL connection pools per read (slave) and write (master) role",
    version,
    author
)]
pub struct Config {
    /// Pools to open at startup, as engine:role (e.g. mysql:slave,postgres:master)
    #[arg(
        short = 'a',
        long = "acquire",
        value_name = "ENGINE:ROLE",
        env = "DB_ACQUIRE",
        value_delimiter = ','
    )]
    pub acquire: Vec<String>,

    /// Driver connect/acquire timeout in seconds
    #[arg(
        long,
        default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS,
        env = "DB_CONNECT_TIMEOUT"
    )]
    pub connect_timeout: u64,

    /// Build pools without opening a connection up front
    #[arg(long, env = "DB_LAZY_CONNECT")]
    pub lazy_connect: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = DEFAULT_LOG_LEVEL, env = "DB_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "DB_JSON_LOGS")]
    pub json_logs: bool,

    /// MySQL read pool host (host or host:port)
    #[arg(long, env = "MYSQL_SLAVE_HOST")]
    pub mysql_slave_host: Option<String>,
    #[arg(long, env = "MYSQL_SLAVE_USER")]
    pub mysql_slave_user: Option<String>,
    #[arg(long, env = "MYSQL_SLAVE_PASSWORD", hide_env_values = true)]
    pub mysql_slave_password: Option<String>,
    #[arg(long, env = "MYSQL_SLAVE_DATABASE")]
    pub mysql_slave_database: Option<String>,

    /// MySQL write pool host (host or host:port)
    #[arg(long, env = "MYSQL_MASTER_HOST")]
    pub mysql_master_host: Option<String>,
    #[arg(long, env = "MYSQL_MASTER_USER")]
    pub mysql_master_user: Option<String>,
    #[arg(long, env = "MYSQL_MASTER_PASSWORD", hide_env_values = true)]
    pub mysql_master_password: Option<String>,
    #[arg(long, env = "MYSQL_MASTER_DATABASE")]
    pub mysql_master_database: Option<String>,

    /// PostgreSQL read pool host (host or host:port)
    #[arg(long, env = "POSTGRES_SLAVE_HOST")]
    pub postgres_slave_host: Option<String>,
    #[arg(long, env = "POSTGRES_SLAVE_USER")]
    pub postgres_slave_user: Option<String>,
    #[arg(long, env = "POSTGRES_SLAVE_PASSWORD", hide_env_values = true)]
    pub postgres_slave_password: Option<String>,
    #[arg(long, env = "POSTGRES_SLAVE_DATABASE")]
    pub postgres_slave_database: Option<String>,

    /// PostgreSQL write pool host (host or host:port)
    #[arg(long, env = "POSTGRES_MASTER_HOST")]
    pub postgres_master_host: Option<String>,
    #[arg(long, env = "POSTGRES_MASTER_USER")]
    pub postgres_master_user: Option<String>,
    #[arg(long, env = "POSTGRES_MASTER_PASSWORD", hide_env_values = true)]
    pub postgres_master_password: Option<String>,
    #[arg(long, env = "POSTGRES_MASTER_DATABASE")]
    pub postgres_master_database: Option<String>,
}

impl Config {
    /// Parse configuration from command line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Create a default configuration (useful for testing).
    pub fn default_config() -> Self {
        Self {
            acquire: Vec::new(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT_SECS,
            lazy_connect: false,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            json_logs: false,
            mysql_slave_host: None,
            mysql_slave_user: None,
            mysql_slave_password: None,
            mysql_slave_database: None,
            mysql_master_host: None,
            mysql_master_user: None,
            mysql_master_password: None,
            mysql_master_database: None,
            postgres_slave_host: None,
            postgres_slave_user: None,
            postgres_slave_password: None,
            postgres_slave_database: None,
            postgres_master_host: None,
            postgres_master_user: None,
            postgres_master_password: None,
            postgres_master_database: None,
        }
    }

    /// Parse and validate all `--acquire` requests.
    ///
    /// Fails on the first unsupported engine or role, before any pool is opened.
    pub fn parse_requests(&self) -> DbResult<Vec<ConnectRequest>> {
        self.acquire.iter().map(|s| s.parse()).collect()
    }

    /// Get the connection timeout as a Duration.
    pub fn connect_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    fn slot(&self, engine: Engine, role: Role) -> SlotSettings<'_> {
        let (host, user, password, database) = match (engine, role) {
            (Engine::MySql, Role::Slave) => (
                &self.mysql_slave_host,
                &self.mysql_slave_user,
                &self.mysql_slave_password,
                &self.mysql_slave_database,
            ),
            (Engine::MySql, Role::Master) => (
                &self.mysql_master_host,
                &self.mysql_master_user,
                &self.mysql_master_password,
                &self.mysql_master_database,
            ),
            (Engine::Postgres, Role::Slave) => (
                &self.postgres_slave_host,
                &self.postgres_slave_user,
                &self.postgres_slave_password,
                &self.postgres_slave_database,
            ),
            (Engine::Postgres, Role::Master) => (
                &self.postgres_master_host,
                &self.postgres_master_user,
                &self.postgres_master_password,
                &self.postgres_master_database,
            ),
        };

        SlotSettings {
            host: host.as_deref(),
            user: user.as_deref(),
            password: password.as_deref(),
            database: database.as_deref(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("acquire", &self.acquire)
            .field("connect_timeout", &self.connect_timeout)
            .field("lazy_connect", &self.lazy_connect)
            .field("log_level", &self.log_level)
            .field("json_logs", &self.json_logs)
            .finish_non_exhaustive()
    }
}

impl ConfigSource for Config {
    fn connection_config(&self, engine: Engine, role: Role) -> DbResult<ConnectionConfig> {
        let slot = self.slot(engine, role);

        let required = |value: Option<&str>, field: &str| -> DbResult<String> {
            match value {
                Some(v) if !v.trim().is_empty() => Ok(v.to_string()),
                _ => Err(DbError::configuration(
                    format!("{} {} {} is not set", engine, role, field),
                    format!(
                        "Set {} or pass {}",
                        setting_env(engine, role, field),
                        setting_flag(engine, role, field)
                    ),
                )),
            }
        };

        Ok(ConnectionConfig {
            engine,
            host: required(slot.host, "host")?,
            user: required(slot.user, "user")?,
            password: slot.password.unwrap_or_default().to_string(),
            database: required(slot.database, "database")?,
        })
    }
}

/// In-memory [`ConfigSource`] for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticConfig {
    slots: HashMap<(Engine, Role), ConnectionConfig>,
}

impl StaticConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the configuration for one slot, replacing any previous value.
    pub fn with(mut self, role: Role, config: ConnectionConfig) -> Self {
        self.slots.insert((config.engine, role), config);
        self
    }

    pub fn insert(&mut self, role: Role, config: ConnectionConfig) {
        self.slots.insert((config.engine, role), config);
    }
}

impl ConfigSource for StaticConfig {
    fn connection_config(&self, engine: Engine, role: Role) -> DbResult<ConnectionConfig> {
        self.slots.get(&(engine, role)).cloned().ok_or_else(|| {
            DbError::configuration(
                format!("No configuration for {} {}", engine, role),
                "Register the slot with StaticConfig::with before acquiring it",
            )
        })
    }
}
