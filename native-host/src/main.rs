//! Native Messaging Host - Thin bridge to the relay server
//!
//! The browser extension talks to this binary over stdin/stdout using
//! native messaging frames; each message is forwarded to `relay-server` as
//! one JSON line on its Unix socket and the reply is framed back.

use serde::Serialize;
use serde_json::Value;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, warn};

const DEFAULT_SOCKET_PATH: &str = "/tmp/apptrack-relay.sock";
const SOCKET_ENV: &str = "APPTRACK_RELAY_SOCKET";
const SOCKET_TIMEOUT: Duration = Duration::from_secs(30);

/// Chrome caps host-bound messages at 1 MiB
const MAX_MESSAGE_BYTES: usize = 1024 * 1024;

#[derive(Debug, Serialize)]
struct ErrorReply<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<u64>,
    ok: bool,
    error: &'a str,
}

/// Read one frame. `None` on EOF or a zero-length frame.
fn read_message<R: Read>(input: &mut R) -> io::Result<Option<Vec<u8>>> {
    let mut length_bytes = [0u8; 4];

    match input.read_exact(&mut length_bytes) {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }

    let length = u32::from_ne_bytes(length_bytes) as usize;
    if length == 0 {
        return Ok(None);
    }
    if length > MAX_MESSAGE_BYTES {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "message of {} bytes exceeds {} byte limit",
                length, MAX_MESSAGE_BYTES
            ),
        ));
    }

    let mut message = vec![0u8; length];
    input.read_exact(&mut message)?;

    Ok(Some(message))
}

/// Write one frame
fn write_message<W: Write>(output: &mut W, message: &[u8]) -> io::Result<()> {
    if message.len() > MAX_MESSAGE_BYTES {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "reply of {} bytes exceeds {} byte limit",
                message.len(),
                MAX_MESSAGE_BYTES
            ),
        ));
    }

    let length = message.len() as u32;
    output.write_all(&length.to_ne_bytes())?;
    output.write_all(message)?;
    output.flush()?;

    Ok(())
}

/// Send one JSON line to the relay and read its one-line reply
fn forward_to_relay(socket_path: &Path, line: &str) -> io::Result<Vec<u8>> {
    let mut stream = UnixStream::connect(socket_path)?;
    stream.set_read_timeout(Some(SOCKET_TIMEOUT))?;
    stream.set_write_timeout(Some(SOCKET_TIMEOUT))?;

    stream.write_all(line.as_bytes())?;
    stream.write_all(b"\n")?;
    stream.flush()?;

    let mut reply = String::new();
    BufReader::new(stream).read_line(&mut reply)?;
    if reply.trim().is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "relay closed without replying",
        ));
    }

    Ok(reply.trim_end().as_bytes().to_vec())
}

fn error_reply(id: Option<u64>, message: &str) -> Vec<u8> {
    let reply = ErrorReply {
        id,
        ok: false,
        error: message,
    };
    serde_json::to_vec(&reply)
        .unwrap_or_else(|_| br#"{"ok":false,"error":"internal error"}"#.to_vec())
}

/// Turn one extension message into the reply frame body
fn handle_message(socket_path: &Path, message: &[u8]) -> Vec<u8> {
    let value: Value = match serde_json::from_slice(message) {
        Ok(value) => value,
        Err(e) => {
            warn!("Malformed message from extension: {}", e);
            return error_reply(None, &format!("invalid message: {}", e));
        }
    };
    let id = value.get("id").and_then(Value::as_u64);

    // Re-encode compactly so the relay always sees exactly one line
    let line = value.to_string();
    match forward_to_relay(socket_path, &line) {
        Ok(reply) if reply.len() > MAX_MESSAGE_BYTES => {
            warn!("Relay reply of {} bytes is too large to frame", reply.len());
            error_reply(id, "reply exceeds 1 MiB limit")
        }
        Ok(reply) => {
            debug!("Relay reply: {} bytes", reply.len());
            reply
        }
        Err(e) => {
            error!("Relay error: {}", e);
            error_reply(id, &format!("relay unavailable: {}", e))
        }
    }
}

/// Serve frames until the extension disconnects
fn run<R: Read, W: Write>(socket_path: &Path, input: &mut R, output: &mut W) -> io::Result<()> {
    while let Some(message) = read_message(input)? {
        debug!("Received {} bytes from extension", message.len());
        let reply = handle_message(socket_path, &message);
        write_message(output, &reply)?;
    }
    info!("Extension disconnected");
    Ok(())
}

fn socket_path() -> PathBuf {
    std::env::var_os(SOCKET_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SOCKET_PATH))
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let socket_path = socket_path();
    info!("Native host started, relaying to {:?}", socket_path);

    let stdin = io::stdin();
    let stdout = io::stdout();
    if let Err(e) = run(&socket_path, &mut stdin.lock(), &mut stdout.lock()) {
        error!("Native host stopped: {}", e);
        std::process::exit(1);
    }
}
