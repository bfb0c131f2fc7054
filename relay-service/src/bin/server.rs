//! Standalone relay server binary
//!
//! Holds the credential store and forwards captured applications to the
//! ingestion backend.
//!
//! # Usage
//!
//! ```bash
//! relay-server
//! relay-server --config /path/to/config.toml
//! relay-server --socket /tmp/relay.sock --api-base https://api.example.com
//! ```

use relay_service::{RelayConfig, RelayServer};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command line overrides on top of the config file
#[derive(Debug, Default)]
struct CliArgs {
    config_path: Option<PathBuf>,
    socket_path: Option<PathBuf>,
    db_path: Option<PathBuf>,
    api_base: Option<String>,
}

/// Parse command line arguments
fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut cli = CliArgs::default();
    let mut iter = args.into_iter();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-v" => {
                println!("relay-server v{}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" | "-c" => cli.config_path = iter.next().map(PathBuf::from),
            "--socket" => cli.socket_path = iter.next().map(PathBuf::from),
            "--db" => cli.db_path = iter.next().map(PathBuf::from),
            "--api-base" => cli.api_base = iter.next(),
            _ => {
                eprintln!("Unknown argument: {}", arg);
                eprintln!("Use --help for usage information.");
                std::process::exit(1);
            }
        }
    }

    cli
}

fn print_help() {
    println!(
        r#"Relay Server - authenticated forwarding of captured job applications

USAGE:
    relay-server [OPTIONS]

OPTIONS:
    -h, --help              Show this help message
    -v, --version           Show version
    -c, --config <PATH>     Path to configuration file
    --socket <PATH>         Unix socket path (default: /tmp/apptrack-relay.sock)
    --db <PATH>             Auth store database path
    --api-base <URL>        Backend origin used when none has been synced"#
    );
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = parse_args();

    let mut config = match &cli.config_path {
        Some(path) => RelayConfig::load_from_path(path.clone()),
        None => RelayConfig::load(),
    };
    if let Some(socket) = cli.socket_path {
        config.socket_path = socket;
    }
    if let Some(db) = cli.db_path {
        config.db_path = db;
    }
    if let Some(api_base) = cli.api_base {
        config.default_api_base = api_base;
    }

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting relay server");

    let server = RelayServer::from_config(&config)?;
    info!("Socket: {:?}", server.socket_path());
    info!("Auth store: {:?}", config.db_path);

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
        }
    }

    // Clean up socket file
    if server.socket_path().exists() {
        std::fs::remove_file(server.socket_path())?;
    }

    Ok(())
}
