//! Capture Router - Main entry point
//!
//! Runs one page session: reads host input as JSON lines on stdin and
//! forwards captures and credentials to the relay server.
//!
//! # Usage
//!
//! ```bash
//! capture-router < page-events.jsonl
//! capture-router --config /path/to/config.toml --socket /tmp/relay.sock
//! ```

use capture_router::{CaptureConfig, PageSession, SocketRelay};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Default)]
struct CliArgs {
    config_path: Option<PathBuf>,
    socket_path: Option<PathBuf>,
}

fn parse_args() -> CliArgs {
    let mut cli = CliArgs::default();
    let mut iter = std::env::args().skip(1);

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-v" => {
                println!("capture-router v{}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" | "-c" => cli.config_path = iter.next().map(PathBuf::from),
            "--socket" => cli.socket_path = iter.next().map(PathBuf::from),
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
        r#"Capture Router - detects submitted job applications on a page

USAGE:
    capture-router [OPTIONS] < events.jsonl

INPUT (one JSON object per line):
    {{"kind":"snapshot","url":"...","title":"...","body_text":"...","elements":{{...}}}}
    {{"kind":"click","node":"<node id>"}}

OPTIONS:
    -h, --help              Show this help message
    -v, --version           Show version
    -c, --config <PATH>     Path to configuration file
    --socket <PATH>         Relay server socket"#
    );
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = parse_args();

    let mut config = match &cli.config_path {
        Some(path) => CaptureConfig::load_from_path(path.clone()),
        None => CaptureConfig::load(),
    };
    if let Some(socket) = cli.socket_path {
        config.relay.socket_path = socket;
    }

    // stdout is left to the host; logs go to stderr
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.general.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if !config.general.enabled {
        info!("Capture is disabled in configuration, exiting");
        return Ok(());
    }

    info!("Relay socket: {:?}", config.relay.socket_path);
    let relay = Arc::new(SocketRelay::new(
        config.relay.socket_path.clone(),
        config.relay.reply_timeout(),
    ));

    let session = PageSession::new(config, relay);
    let report = session.run(BufReader::new(tokio::io::stdin())).await?;

    info!(
        "Session ended: role {:?}, state {:?}, {} input(s), {} rejected",
        report.role, report.state, report.inputs, report.rejected
    );
    Ok(())
}
