//! Simple gateway example with a synthetic publisher
//!
//! Run with: cargo run --example simple_gateway [BIND_ADDR]
//!
//! Examples:
//!   cargo run --example simple_gateway                   # binds to 0.0.0.0:8080
//!   cargo run --example simple_gateway localhost         # binds to 127.0.0.1:8080
//!   cargo run --example simple_gateway 127.0.0.1:8081    # binds to 127.0.0.1:8081
//!
//! ## Watching
//!
//! Open a WebSocket to ws://localhost:8080/live/test?type=1 and feed the
//! binary messages to any FLV-capable player, e.g. flv.js in a browser.
//!
//! The demo publishes a synthetic video unit to the stream `test` every
//! 40 ms, standing in for the device-protocol ingestion path.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use wsflv::{GatewayConfig, GatewayServer, MediaUnit, StreamRegistry};

/// Parse bind address from command line argument.
///
/// Accepts formats:
/// - "localhost" -> 127.0.0.1:8080
/// - "localhost:8081" -> 127.0.0.1:8081
/// - "127.0.0.1" -> 127.0.0.1:8080
/// - "0.0.0.0:8080" -> 0.0.0.0:8080
fn parse_bind_addr(arg: &str) -> Result<SocketAddr, String> {
    const DEFAULT_PORT: u16 = 8080;

    let normalized = arg.replace("localhost", "127.0.0.1");

    if let Ok(addr) = normalized.parse::<SocketAddr>() {
        return Ok(addr);
    }

    if let Ok(ip) = normalized.parse::<std::net::IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    Err(format!(
        "Invalid bind address: '{}'. Expected format: IP:PORT or IP or 'localhost'",
        arg
    ))
}

fn print_usage() {
    eprintln!("Usage: simple_gateway [BIND_ADDR]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  BIND_ADDR    Address to bind to (default: 0.0.0.0:8080)");
}

/// Stand-in for the ingestion path: publishes a counter pattern as video
/// units
async fn synthetic_publisher(registry: Arc<StreamRegistry>) {
    let mut ticker = tokio::time::interval(Duration::from_millis(40));
    let mut timestamp: u32 = 0;
    let mut counter: u8 = 0;

    loop {
        ticker.tick().await;

        let payload = Bytes::from(vec![0x17, 0x01, counter, counter, counter]);
        let delivered = registry
            .publish("test", MediaUnit::video(timestamp, payload))
            .await;

        if delivered > 0 {
            tracing::trace!(timestamp = timestamp, delivered = delivered, "Published unit");
        }

        timestamp = timestamp.wrapping_add(40);
        counter = counter.wrapping_add(1);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let bind_addr = match args.get(1) {
        Some(addr_str) => match parse_bind_addr(addr_str) {
            Ok(addr) => addr,
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        },
        None => "0.0.0.0:8080".parse().unwrap(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("wsflv=debug".parse()?)
                .add_directive("simple_gateway=debug".parse()?),
        )
        .init();

    let config = GatewayConfig {
        bind_addr,
        ..GatewayConfig::default()
    };

    println!("Starting gateway on {}", config.bind_addr);
    println!();
    println!("=== Watch the demo stream ===");
    println!("ws://localhost:{}/live/test?type=1", config.bind_addr.port());
    println!();

    let registry = Arc::new(StreamRegistry::new());
    let server = GatewayServer::with_registry(config, Arc::clone(&registry));

    tokio::spawn(synthetic_publisher(registry));

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                eprintln!("Gateway error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            println!("\nShutting down...");
        }
    }

    Ok(())
}
