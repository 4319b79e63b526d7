#![forbid(unsafe_code)]

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use rtr_cache_core::transport::run_client;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Manual test client: connects, runs the full protocol exchange, and
/// prints what it learned. Used for debugging a server and by integration
/// tests that want a real socket rather than the bare state machine.
#[derive(Parser, Debug)]
#[command(author, version, about = "RPKI-RTR test client")]
struct Cli {
    /// Address of the cache server to connect to
    server: SocketAddr,

    /// Poll interval while idle, in seconds
    #[arg(long, default_value_t = 600)]
    poll_interval_seconds: u64,
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    let poll_interval = Duration::from_secs(cli.poll_interval_seconds);

    match run_client(cli.server, poll_interval).await {
        Ok(session) => {
            info!(
                serial = ?session.current_serial(),
                records = session.records().len(),
                "session ended"
            );
        }
        Err(err) => {
            error!(%err, "client session failed");
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).with_target(false).init();
}
