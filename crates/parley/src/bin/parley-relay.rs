//! `parley-relay`: runs a standalone presence relay.

use std::time::Duration;

use clap::Parser;
use parley::prelude::*;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "parley-relay")]
#[command(about = "Presence and private-messaging relay over WebSocket")]
#[command(version)]
struct Args {
    /// Address to listen on
    #[arg(long, env = "PARLEY_BIND", default_value = "0.0.0.0:3001")]
    bind: String,

    /// Events buffered per connection before new ones are dropped
    #[arg(long, env = "PARLEY_OUTBOX_CAPACITY", default_value_t = 256)]
    outbox_capacity: usize,

    /// Seconds a client may take to complete the WebSocket upgrade
    #[arg(long, env = "PARLEY_HANDSHAKE_TIMEOUT", default_value_t = 10)]
    handshake_timeout_secs: u64,

    /// Report rejected names and undeliverable messages back to the client
    #[arg(long, env = "PARLEY_NOTIFY_ERRORS")]
    notify_errors: bool,

    /// Log level (trace, debug, info, warn, error); RUST_LOG wins if set
    #[arg(short, long, env = "PARLEY_LOG", default_value = "info")]
    log_level: String,
}

impl Args {
    fn server_config(&self) -> ServerConfig {
        ServerConfig {
            bind_addr: self.bind.clone(),
            notify_errors: self.notify_errors,
            handshake_timeout: Duration::from_secs(self.handshake_timeout_secs),
            session: SessionConfig {
                outbox_capacity: self.outbox_capacity,
                ..SessionConfig::default()
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let server = ParleyServerBuilder::new()
        .config(args.server_config())
        .build()
        .await?;

    tracing::info!(addr = %server.local_addr()?, "starting parley relay");

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await?;
    Ok(())
}
