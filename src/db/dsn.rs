//! Engine-specific connection strings.
//!
//! Each engine has a pure function from [`ConnectionConfig`] to its DSN text:
//!
//! - MySQL: `user:password@tcp(host)/database?charset=utf8mb4&parseTime=True&maxAllowedPacket=0`
//! - PostgreSQL: `user=U password=P host=H dbname=D sslmode=disable`
//!
//! The same text is parsed back into `sqlx` connect options when the pool is
//! opened, so the DSN that is logged (masked) is exactly the DSN that is used.

use crate::error::{DbError, DbResult};
use crate::models::{ConnectionConfig, Engine};
use sqlx::mysql::{MySqlConnectOptions, MySqlSslMode};
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use std::borrow::Cow;
use tracing::{debug, warn};

/// Fixed MySQL DSN parameters: utf8mb4 charset, time values decoded as time types.
pub const MYSQL_DSN_PARAMS: &str = "charset=utf8mb4&parseTime=True&maxAllowedPacket=0";

/// PostgreSQL connections never negotiate TLS.
pub const POSTGRES_SSL_MODE: &str = "disable";

/// Build the DSN for `engine` from a connection configuration.
pub fn build(engine: Engine, config: &ConnectionConfig) -> String {
    match engine {
        Engine::MySql => mysql_dsn(config),
        Engine::Postgres => postgres_dsn(config),
    }
}

/// Build the DSN with the password replaced by `****`, safe to log.
pub fn masked(engine: Engine, config: &ConnectionConfig) -> String {
    build(engine, &config.redacted())
}

pub fn mysql_dsn(config: &ConnectionConfig) -> String {
    format!(
        "{}:{}@tcp({})/{}?{}",
        config.user, config.password, config.host, config.database, MYSQL_DSN_PARAMS
    )
}

pub fn postgres_dsn(config: &ConnectionConfig) -> String {
    format!(
        "user={} password={} host={} dbname={} sslmode={}",
        quote_pg_value(&config.user),
        quote_pg_value(&config.password),
        quote_pg_value(&config.host),
        quote_pg_value(&config.database),
        POSTGRES_SSL_MODE
    )
}

/// Quote a keyword/value value the way libpq expects, only when required.
fn quote_pg_value(value: &str) -> Cow<'_, str> {
    let needs_quotes = value.is_empty()
        || value
            .chars()
            .any(|c| c.is_whitespace() || c == '\'' || c == '\\');

    if !needs_quotes {
        return Cow::Borrowed(value);
    }

    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    Cow::Owned(format!("'{}'", escaped))
}

/// Fields recovered from a DSN.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DsnParts {
    pub host: String,
    pub port: Option<u16>,
    pub user: String,
    pub password: String,
    pub database: String,
    /// Remaining driver parameters, in order of appearance.
    pub params: Vec<(String, String)>,
}

/// Parse a `user:password@tcp(host[:port])/database?params` DSN.
///
/// The address is located with the last `@tcp(`, so passwords may contain `@`.
pub fn parse_mysql(dsn: &str) -> DbResult<DsnParts> {
    let (credentials, rest) = dsn
        .rsplit_once("@tcp(")
        .ok_or_else(|| DbError::invalid_dsn("MySQL DSN is missing the '@tcp(' address"))?;
    let (user, password) = credentials.split_once(':').unwrap_or((credentials, ""));

    let (address, rest) = rest
        .split_once(')')
        .ok_or_else(|| DbError::invalid_dsn("MySQL DSN address is missing ')'"))?;
    let rest = rest
        .strip_prefix('/')
        .ok_or_else(|| DbError::invalid_dsn("MySQL DSN is missing '/' before the database"))?;
    let (database, query) = rest.split_once('?').unwrap_or((rest, ""));

    let (host, port) = split_host_port(address)?;

    let params = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (key.to_string(), value.to_string())
        })
        .collect();

    Ok(DsnParts {
        host,
        port,
        user: user.to_string(),
        password: password.to_string(),
        database: database.to_string(),
        params,
    })
}

/// Parse a libpq keyword/value DSN (`key=value key='quoted value' ...`).
pub fn parse_postgres(dsn: &str) -> DbResult<DsnParts> {
    let mut parts = DsnParts::default();

    for (key, value) in pg_pairs(dsn)? {
        match key.as_str() {
            "user" => parts.user = value,
            "password" => parts.password = value,
            "host" => {
                let (host, port) = split_host_port(&value)?;
                parts.host = host;
                if port.is_some() {
                    parts.port = port;
                }
            }
            "port" => parts.port = Some(parse_port(&value)?),
            "dbname" => parts.database = value,
            _ => parts.params.push((key, value)),
        }
    }

    if parts.host.is_empty() {
        return Err(DbError::invalid_dsn("PostgreSQL DSN has no host"));
    }

    Ok(parts)
}

/// Split the keyword/value list, honoring single quotes and backslash escapes.
fn pg_pairs(dsn: &str) -> DbResult<Vec<(String, String)>> {
    let mut pairs = Vec::new();
    let mut chars = dsn.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        if chars.peek().is_none() {
            return Ok(pairs);
        }

        let mut key = String::new();
        while let Some(c) = chars.next_if(|c| *c != '=' && !c.is_whitespace()) {
            key.push(c);
        }
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        if chars.next() != Some('=') {
            return Err(DbError::invalid_dsn(format!(
                "missing '=' after '{}' in PostgreSQL DSN",
                key
            )));
        }
        while chars.next_if(|c| c.is_whitespace()).is_some() {}

        let mut value = String::new();
        if chars.next_if_eq(&'\'').is_some() {
            loop {
                match chars.next() {
                    Some('\\') => match chars.next() {
                        Some(c) => value.push(c),
                        None => break,
                    },
                    Some('\'') => break,
                    Some(c) => value.push(c),
                    None => {
                        return Err(DbError::invalid_dsn(format!(
                            "unterminated quoted value for '{}' in PostgreSQL DSN",
                            key
                        )));
                    }
                }
            }
        } else {
            while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
                if c == '\\' {
                    if let Some(escaped) = chars.next() {
                        value.push(escaped);
                    }
                } else {
                    value.push(c);
                }
            }
        }

        pairs.push((key, value));
    }
}

/// Split `host`, `host:port`, `[v6]` or `[v6]:port`.
fn split_host_port(address: &str) -> DbResult<(String, Option<u16>)> {
    let (host, port) = if let Some(rest) = address.strip_prefix('[') {
        let (host, after) = rest
            .split_once(']')
            .ok_or_else(|| DbError::invalid_dsn(format!("unterminated '[' in '{}'", address)))?;
        let port = match after {
            "" => None,
            _ => {
                let port = after.strip_prefix(':').ok_or_else(|| {
                    DbError::invalid_dsn(format!("unexpected text after ']' in '{}'", address))
                })?;
                Some(parse_port(port)?)
            }
        };
        (host, port)
    } else {
        match address.rsplit_once(':') {
            Some((host, port)) if !host.contains(':') => (host, Some(parse_port(port)?)),
            // bare IPv6 address without brackets
            _ => (address, None),
        }
    };

    if host.is_empty() {
        return Err(DbError::invalid_dsn("host cannot be empty"));
    }

    Ok((host.to_string(), port))
}

fn parse_port(port: &str) -> DbResult<u16> {
    port.parse()
        .map_err(|_| DbError::invalid_dsn(format!("invalid port '{}'", port)))
}

/// Translate a MySQL DSN into `sqlx` connect options.
pub fn mysql_connect_options(dsn: &str) -> DbResult<MySqlConnectOptions> {
    let parts = parse_mysql(dsn)?;

    let mut options = MySqlConnectOptions::new()
        .host(&parts.host)
        .port(parts.port.unwrap_or(Engine::MySql.default_port()))
        .username(&parts.user);
    if !parts.password.is_empty() {
        options = options.password(&parts.password);
    }
    if !parts.database.is_empty() {
        options = options.database(&parts.database);
    }

    // No `tls` parameter means plaintext, even when a TLS backend is compiled in.
    options = options.ssl_mode(mysql_ssl_mode(&parts.params)?);

    for (key, value) in &parts.params {
        match key.as_str() {
            "tls" => {}
            "charset" => options = options.charset(value),
            "collation" => options = options.collation(value),
            // sqlx always decodes DATETIME/TIMESTAMP into time types and
            // negotiates the packet size with the server.
            "parseTime" | "maxAllowedPacket" => {
                debug!(param = %key, value = %value, "DSN parameter handled by driver")
            }
            _ => warn!(param = %key, "Ignoring unsupported MySQL DSN parameter"),
        }
    }

    Ok(options)
}

/// TLS mode named by a MySQL DSN's `tls` parameter; disabled when absent.
pub fn mysql_ssl_mode(params: &[(String, String)]) -> DbResult<MySqlSslMode> {
    let Some((_, value)) = params.iter().find(|(key, _)| key == "tls") else {
        return Ok(MySqlSslMode::Disabled);
    };

    match value.to_ascii_lowercase().as_str() {
        "false" => Ok(MySqlSslMode::Disabled),
        "preferred" => Ok(MySqlSslMode::Preferred),
        "skip-verify" => Ok(MySqlSslMode::Required),
        "true" => Ok(MySqlSslMode::VerifyIdentity),
        other => Err(DbError::invalid_dsn(format!(
            "unsupported tls value '{}'",
            other
        ))),
    }
}

/// Translate a PostgreSQL DSN into `sqlx` connect options.
pub fn postgres_connect_options(dsn: &str) -> DbResult<PgConnectOptions> {
    let parts = parse_postgres(dsn)?;

    let mut options = PgConnectOptions::new()
        .host(&parts.host)
        .port(parts.port.unwrap_or(Engine::Postgres.default_port()))
        .username(&parts.user);
    if !parts.password.is_empty() {
        options = options.password(&parts.password);
    }
    if !parts.database.is_empty() {
        options = options.database(&parts.database);
    }

    for (key, value) in &parts.params {
        match key.as_str() {
            "sslmode" => {
                let mode: PgSslMode = value.parse().map_err(|e| {
                    DbError::invalid_dsn(format!("invalid sslmode '{}': {}", value, e))
                })?;
                options = options.ssl_mode(mode);
            }
            "application_name" => options = options.application_name(value),
            _ => warn!(param = %key, "Ignoring unsupported PostgreSQL DSN parameter"),
        }
    }

    Ok(options)
}
