#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::Parser;
use rtr_cache_core::config::load_from_path;
use rtr_cache_core::kickbus;
use rtr_cache_core::producer::{run_once, ProducerOutcome, RetentionPolicy};
use rtr_cache_core::roa::StructuralRoaDecoder;
use rtr_cache_core::Store;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "RPKI-RTR cache producer: turns a validated ROA tree into a snapshot")]
struct Cli {
    /// Filesystem path of the validated ROA tree
    validator_tree: PathBuf,

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

    let serial = match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs() as u32,
        Err(err) => {
            error!(%err, "system clock is before the UNIX epoch");
            std::process::exit(1);
        }
    };

    let retention = RetentionPolicy { window_seconds: config.retention_window_seconds() };
    let outcome = run_once(&cli.validator_tree, &store, &StructuralRoaDecoder, retention, serial);

    match outcome {
        Ok(ProducerOutcome::Empty) => {
            info!("validator tree held no ROAs, current left untouched");
        }
        Ok(ProducerOutcome::Published { serial, record_count, snapshots_retained }) => {
            info!(serial, record_count, snapshots_retained, "published new snapshot");
            match kickbus::broadcast(&config.kickme_dir).await {
                Ok(delivered) => info!(delivered, "kick broadcast complete"),
                Err(err) => error!(%err, "kick broadcast failed"),
            }
        }
        Err(err) => {
            error!(%err, "producer run failed");
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).with_target(false).init();
}
