//! `frame-host` demo binary.
//!
//! Connects to a peer speaking the `@`-framed wire protocol, optionally
//! queues one single-shot command, and then drives the controller's
//! processing loop until the connection drops or the process is killed.
//!
//! # Usage
//!
//! ```bash
//! frame-host --connect 127.0.0.1:7878
//! frame-host --connect 127.0.0.1:7878 --send-id 0x01 --send-payload 0102
//! ```

use clap::Parser;
use frame_core::Data;
use frame_host::{Driver, HostConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Host process for `frame-core`'s command/response controller
#[derive(Parser, Debug)]
#[command(name = "frame-host")]
#[command(about = "Demo host driving frame-core's controller over TCP")]
#[command(version)]
struct Args {
    /// Address to connect to
    #[arg(short, long, default_value = "127.0.0.1:7878")]
    connect: String,

    /// Optional single-shot command id (decimal or 0x-prefixed hex) to
    /// queue immediately after connecting
    #[arg(long, value_parser = parse_byte)]
    send_id: Option<u8>,

    /// Hex-encoded payload bytes for `--send-id` (defaults to empty)
    #[arg(long, default_value = "")]
    send_payload: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn parse_byte(s: &str) -> Result<u8, String> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x") {
        u8::from_str_radix(hex, 16).map_err(|e| e.to_string())
    } else {
        s.parse::<u8>().map_err(|e| e.to_string())
    }
}

fn parse_hex_payload(s: &str) -> Result<Vec<u8>, String> {
    if s.len() % 2 != 0 {
        return Err("payload hex string must have an even length".to_string());
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).map_err(|e| e.to_string()))
        .collect()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("frame-host starting");
    tracing::info!(addr = %args.connect, "connecting");

    let config = HostConfig { connect_addr: args.connect.clone(), ..HostConfig::default() };
    let mut driver = Driver::connect(config)?;

    tracing::info!(state = ?driver.state(), "connected");

    if let Some(send_id) = args.send_id {
        let payload = parse_hex_payload(&args.send_payload)?;
        let data = Data::new(send_id, &payload)?;
        driver.single_queue().push(data)?;
        tracing::info!(id = send_id, "queued single-shot command");
    }

    loop {
        match driver.process() {
            Ok(_) => {}
            Err(err) => {
                tracing::error!(%err, "processing loop stopped");
                driver.shutdown()?;
                return Err(Box::new(err));
            }
        }
    }
}
