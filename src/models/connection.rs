//! Connection-related data models.
//!
//! This module defines the engine and role identifiers that key the pool
//! registry, and the per-slot connection configuration.

use crate::error::{DbError, DbResult};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Supported database engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    /// Includes MariaDB
    MySql,
    Postgres,
}

impl Engine {
    /// All supported engines, in registry order.
    pub const ALL: [Engine; 2] = [Engine::MySql, Engine::Postgres];

    /// Get the display name for this engine.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::MySql => "MySQL",
            Self::Postgres => "PostgreSQL",
        }
    }

    /// Driver tag, as used in settings names and CLI requests.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::MySql => "mysql",
            Self::Postgres => "postgres",
        }
    }

    /// Get the default port for this engine.
    pub fn default_port(&self) -> u16 {
        match self {
            Self::MySql => 3306,
            Self::Postgres => 5432,
        }
    }
}

impl std::fmt::Display for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl FromStr for Engine {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(Self::MySql),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            _ => Err(DbError::unsupported_engine(s)),
        }
    }
}

/// Pool role within an engine.
///
/// Roles are independent slots: neither takes precedence over the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Read-only pool, typically against a replica.
    Slave,
    /// Read-write pool against the primary.
    Master,
}

impl Role {
    /// All supported roles, in slot order.
    pub const ALL: [Role; 2] = [Role::Slave, Role::Master];

    pub fn tag(&self) -> &'static str {
        match self {
            Self::Slave => "slave",
            Self::Master => "master",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

impl FromStr for Role {
    type Err = DbError;

    /// Accepts `slave`/`master` and the legacy `SLAVE_DB`/`Master_DB` tags.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "slave" | "slave_db" => Ok(Self::Slave),
            "master" | "master_db" => Ok(Self::Master),
            _ => Err(DbError::unsupported_role(s)),
        }
    }
}

/// A request for the pool of one (engine, role) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ConnectRequest {
    pub engine: Engine,
    pub role: Role,
}

impl ConnectRequest {
    pub fn new(engine: Engine, role: Role) -> Self {
        Self { engine, role }
    }

    /// Parse a request from separate engine and role names.
    ///
    /// The engine is checked first, so an unknown engine is always reported
    /// as [`DbError::UnsupportedEngine`] even if the role is also invalid.
    pub fn parse(engine: &str, role: &str) -> DbResult<Self> {
        let engine = engine.parse()?;
        let role = role.parse()?;
        Ok(Self { engine, role })
    }
}

impl std::fmt::Display for ConnectRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.engine.tag(), self.role)
    }
}

impl FromStr for ConnectRequest {
    type Err = DbError;

    /// Parse the `engine:role` form used on the command line.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (engine, role) = s.split_once(':').ok_or_else(|| {
            DbError::invalid_input(format!(
                "Invalid pool request '{}': expected <engine>:<role>, e.g. mysql:slave",
                s
            ))
        })?;
        Self::parse(engine, role)
    }
}

/// Configuration for one (engine, role) connection.
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Engine tag passed to the pool opener.
    pub engine: Engine,
    /// `host` or `host:port`
    pub host: String,
    pub user: String,
    /// Contains sensitive data - never log
    #[serde(skip_serializing, default)]
    pub password: String,
    pub database: String,
}

impl ConnectionConfig {
    pub fn new(
        engine: Engine,
        host: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            engine,
            host: host.into(),
            user: user.into(),
            password: password.into(),
            database: database.into(),
        }
    }

    /// Copy of this configuration with the password masked, for logging.
    pub fn redacted(&self) -> Self {
        Self {
            password: "****".to_string(),
            ..self.clone()
        }
    }
}

impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("engine", &self.engine)
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &"****")
            .field("database", &self.database)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_from_str() {
        assert_eq!("mysql".parse::<Engine>().unwrap(), Engine::MySql);
        assert_eq!("MariaDB".parse::<Engine>().unwrap(), Engine::MySql);
        assert_eq!("postgres".parse::<Engine>().unwrap(), Engine::Postgres);
        assert_eq!("postgresql".parse::<Engine>().unwrap(), Engine::Postgres);
        assert!(matches!(
            "oracle".parse::<Engine>(),
            Err(DbError::UnsupportedEngine { .. })
        ));
    }

    #[test]
    fn test_role_from_str_accepts_legacy_tags() {
        assert_eq!("SLAVE_DB".parse::<Role>().unwrap(), Role::Slave);
        assert_eq!("Master_DB".parse::<Role>().unwrap(), Role::Master);
        assert_eq!("master".parse::<Role>().unwrap(), Role::Master);
        assert!(matches!(
            "replica".parse::<Role>(),
            Err(DbError::UnsupportedRole { .. })
        ));
    }

    #[test]
    fn test_connect_request_from_str() {
        let request: ConnectRequest = "postgres:master".parse().unwrap();
        assert_eq!(request, ConnectRequest::new(Engine::Postgres, Role::Master));
        assert_eq!(request.to_string(), "postgres:master");

        assert!(matches!(
            "mysql".parse::<ConnectRequest>(),
            Err(DbError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_connect_request_engine_checked_first() {
        let err = ConnectRequest::parse("sqlite", "nobody").unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_connection_config_never_exposes_password() {
        let config = ConnectionConfig::new(Engine::MySql, "h:3306", "u", "secret", "d");

        assert!(!format!("{:?}", config).contains("secret"));
        assert!(!serde_json::to_string(&config).unwrap().contains("secret"));
        assert_eq!(config.redacted().password, "****");
        assert_eq!(config.redacted().host, "h:3306");
    }
}
