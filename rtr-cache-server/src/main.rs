#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use rtr_cache_core::config::load_from_path;
use rtr_cache_core::transport::run_server;
use rtr_cache_core::Store;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "RPKI-RTR cache server")]
struct Cli {
    /// Path to configuration TOML file
    #[arg(short, long, value_name = "FILE", default_value = "rtr-cache.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    let config = match load_from_path(&cli.config) {
        Ok(cfg) => cfg,
        Err(err) => {
            error!(%err, "failed to load configuration");
            std::process::exit(1);
        }
    };

    let store = Store::new(&config.data_dir);
    if let Err(err) = store.ensure_dir() {
        error!(%err, "failed to create data directory");
        std::process::exit(1);
    }
    let store = Arc::new(store);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = match run_server(Arc::new(config), store, shutdown_rx).await {
        Ok(handle) => handle,
        Err(err) => {
            error!(%err, "failed to start server");
            std::process::exit(1);
        }
    };

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(err) => {
            error!(%err, "failed to install SIGTERM handler");
            std::process::exit(1);
        }
    };
    let mut sigint = match signal(SignalKind::interrupt()) {
        Ok(s) => s,
        Err(err) => {
            error!(%err, "failed to install SIGINT handler");
            std::process::exit(1);
        }
    };

    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        _ = sigint.recv() => info!("received SIGINT, shutting down"),
    }

    let _ = shutdown_tx.send(true);
    if let Err(err) = handle.join().await {
        error!(%err, "server task ended with error");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).with_target(false).init();
}
