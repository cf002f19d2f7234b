//! postbox-relay binary entry point.
//!
//! Usage:
//! ```bash
//! postbox-relay --config postbox.toml
//! postbox-relay --help
//! ```

use anyhow::Context;
use postbox_relay::config::Config;
use postbox_relay::http::{build_router, health};
use postbox_relay::server::PostboxRelay;
use postbox_relay::storage::SqliteStorage;
use postbox_relay::{logging, protocol};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::TcpListener;

const DEFAULT_CONFIG: &str = "postbox.toml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if std::env::args().any(|arg| arg == "--help" || arg == "-h") {
        print_usage();
        return Ok(());
    }

    let config = load_config(get_config_path().as_deref())?;
    let log = logging::init(&config.logging)?;
    health::init_start_time();

    tracing::info!("postbox-relay v{} starting", env!("CARGO_PKG_VERSION"));

    let storage = SqliteStorage::new(&config.storage.database)
        .await
        .with_context(|| format!("opening {}", config.storage.database.display()))?;
    let relay = Arc::new(PostboxRelay::new(config.clone(), storage));

    let listen = config.server.listen_address()?;
    let listener = TcpListener::bind(listen)
        .await
        .with_context(|| format!("binding {listen}"))?;

    if config.http.enabled {
        let http_listener = TcpListener::bind(config.http.bind_address.as_str())
            .await
            .with_context(|| format!("binding {}", config.http.bind_address))?;
        tracing::info!("HTTP endpoints on {}", config.http.bind_address);

        let app = build_router(relay.clone());
        tokio::spawn(async move {
            if let Err(e) = axum::serve(http_listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await
            {
                tracing::error!("HTTP server failed: {}", e);
            }
        });
    }

    protocol::serve(listener, relay.clone(), shutdown_signal()).await?;

    relay.storage().close().await;
    tracing::info!("postbox-relay stopped");
    log.shutdown().context("flushing logs")?;
    Ok(())
}

/// Explicit `--config <path>` argument, if given.
fn get_config_path() -> Option<PathBuf> {
    std::env::args()
        .skip_while(|arg| arg != "--config")
        .nth(1)
        .map(PathBuf::from)
}

/// Load the named config file, or `postbox.toml` if it exists, or defaults.
fn load_config(explicit: Option<&Path>) -> anyhow::Result<Config> {
    if let Some(path) = explicit {
        return Ok(Config::from_file(path)?);
    }

    let default = Path::new(DEFAULT_CONFIG);
    if default.exists() {
        Ok(Config::from_file(default)?)
    } else {
        Ok(Config::default())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

fn print_usage() {
    println!("postbox-relay v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Usage: postbox-relay [--config <path>]");
    println!();
    println!("  --config <path>  TOML configuration file (default: {DEFAULT_CONFIG})");
    println!("  -h, --help       Print this help");
}
