//! chatsync terminal client entry point.
//!
//! # Usage
//!
//! ```bash
//! # Connect to a local server and open room 1
//! CHATSYNC_TOKEN=... chatsync --server http://localhost:8080 --room 1
//! ```

use chatsync_cli::{Command, Coordinator, CoordinatorConfig, Runtime, TerminalDriver};
use chatsync_transport::Endpoint;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// chatsync realtime chat client
#[derive(Parser, Debug)]
#[command(name = "chatsync")]
#[command(about = "Line-oriented client for chatsync rooms")]
#[command(version)]
struct Args {
    /// Server origin; REST and WebSocket URLs are derived from it
    #[arg(short, long, default_value = "http://localhost:8080")]
    server: String,

    /// Bearer credential
    #[arg(short, long, env = "CHATSYNC_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Room to open on start
    #[arg(short, long)]
    room: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer().with_writer(std::io::stderr)).with(filter).init();

    let endpoint = Endpoint::parse(&args.server)?;
    tracing::info!(server = %endpoint.origin(), "chatsync starting");

    if args.token.is_none() {
        tracing::warn!("no token provided; rooms can be listed but not opened");
    }

    let driver = TerminalDriver::new(endpoint, args.token.clone());
    let coordinator = Coordinator::new(CoordinatorConfig::default(), args.token);
    let initial: Vec<Command> = args.room.map(Command::Select).into_iter().collect();

    Runtime::new(driver, coordinator).run(initial).await?;

    Ok(())
}
