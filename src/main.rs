//! prqld - Main entry point.
//!
//! Loads the backend registry and token table, then serves queries over HTTP
//! until SIGINT/SIGTERM. SIGHUP re-reads both files.

use clap::Parser;
use prqld::config::Config;
use prqld::db::{ConnectionManager, QueryExecutor, SqlxConnector};
use prqld::lifecycle::{load_backends, load_tokens};
use prqld::transport::{HttpTransport, Transport};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber.with(fmt::layer().json()).init();
    } else {
        subscriber
            .with(fmt::layer().with_target(true).with_thread_ids(false))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();
    init_tracing(&config);

    info!("Starting prqld v{}", env!("CARGO_PKG_VERSION"));

    let pool_options = config.pool_options();
    pool_options.validate()?;

    let backends = load_backends(&config.backends_file)?;
    let tokens = Arc::new(load_tokens(&config.tokens_file)?);

    let connections = Arc::new(ConnectionManager::new(
        SqlxConnector::new(pool_options),
        backends,
        tokens.clone(),
    ));
    let executor = QueryExecutor::new(connections.clone(), config.query_timeout_duration());

    #[cfg(unix)]
    let reload_task = prqld::lifecycle::Reloader::new(&config.backends_file, &config.tokens_file)
        .spawn_on_hangup(tokens, connections.clone())?;

    let transport = HttpTransport::new(
        executor,
        &config.http_host,
        config.http_port,
        config.shutdown_timeout_duration(),
    );
    info!(
        transport = transport.name(),
        addr = %transport.bind_addr(),
        query_timeout_secs = config.query_timeout,
        "Serving queries"
    );
    let result = transport.run().await;

    #[cfg(unix)]
    reload_task.abort();

    if let Err(e) = result {
        error!(error = %e, "Server error");
        connections.close_all().await;
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}
