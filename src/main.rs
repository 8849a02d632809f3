//! Pool Registry - Main entry point.
//!
//! Opens the requested (engine, role) pools once, reports them, and exits.
//! Useful as a deployment smoke test for connection settings.

use clap::Parser;
use futures_util::future::join_all;
use pool_registry::config::Config;
use pool_registry::db::{ConnectMode, PoolRegistry, SqlxPoolOpener};
use std::error::Error as _;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    // Logs go to stderr; stdout carries the JSON summary.
    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse configuration from command line and environment
    let config = Config::parse();

    // Initialize logging
    init_tracing(&config);

    if config.acquire.is_empty() {
        eprintln!("Error: At least one pool must be requested.");
        eprintln!();
        eprintln!("Usage: pool-registry --acquire <engine>:<role>[,<engine>:<role>...]");
        eprintln!();
        eprintln!("Engines: mysql, postgres    Roles: slave, master");
        eprintln!();
        eprintln!("Examples:");
        eprintln!("  MYSQL_SLAVE_HOST=db:3306 MYSQL_SLAVE_USER=app MYSQL_SLAVE_DATABASE=shop \\");
        eprintln!("    pool-registry --acquire mysql:slave");
        eprintln!("  pool-registry --acquire mysql:slave,postgres:master --lazy-connect");
        std::process::exit(1);
    }

    // Unsupported engines are a deployment defect: stop before connecting anything.
    let requests = match config.parse_requests() {
        Ok(requests) => requests,
        Err(e) => {
            error!(error = %e, fatal = e.is_fatal(), "Invalid pool request");
            return Err(e.into());
        }
    };

    info!(
        count = requests.len(),
        "Starting pool registry v{}",
        env!("CARGO_PKG_VERSION")
    );

    let mode = if config.lazy_connect {
        ConnectMode::Lazy
    } else {
        ConnectMode::Eager
    };
    let opener = SqlxPoolOpener::new(config.connect_timeout_duration(), mode);
    let registry = PoolRegistry::with_opener(config, opener);

    let results = join_all(
        requests
            .iter()
            .map(|request| registry.acquire_request(*request)),
    )
    .await;

    // A pool that cannot be created at startup is treated as fatal here; the
    // library itself would allow a later retry.
    let mut failed = None;
    for (request, result) in requests.iter().zip(results) {
        if let Err(e) = result {
            error!(
                request = %request,
                error = %e,
                cause = e.source().map(ToString::to_string).unwrap_or_default(),
                suggestion = e.suggestion().unwrap_or(""),
                "Failed to acquire pool"
            );
            failed.get_or_insert(e);
        }
    }
    if let Some(e) = failed {
        return Err(e.into());
    }

    println!("{}", serde_json::to_string_pretty(&registry.summary())?);

    info!("All requested pools ready");
    Ok(())
}
