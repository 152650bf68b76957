//! Live MJPEG streaming server demo
//!
//! Run with: cargo run --example live_server [BIND_ADDR]
//!
//! Examples:
//!   cargo run --example live_server                    # binds to 0.0.0.0:8080
//!   cargo run --example live_server localhost          # binds to 127.0.0.1:8080
//!   cargo run --example live_server 127.0.0.1:9000     # binds to 127.0.0.1:9000
//!
//! Uses the built-in synthetic test-pattern source; swap in a hardware
//! `FrameSource` implementation to stream a real camera.
//!
//! ## Viewing
//!
//! Browser: open http://localhost:8080/stream
//! ffplay:  ffplay http://localhost:8080/stream
//!
//! ## Runtime controls
//!
//! curl "http://localhost:8080/control?name=rotation&value=180"
//! curl "http://localhost:8080/control?name=brightness&value=30"
//! curl "http://localhost:8080/status"

use std::net::SocketAddr;
use std::sync::Arc;

use camcast::broadcast::{BroadcasterConfig, FrameBroadcaster};
use camcast::config::CaptureConfig;
use camcast::encode::JpegEncoder;
use camcast::server::{ServerConfig, StreamServer};
use camcast::source::SyntheticSource;

/// Parse bind address from command line argument.
///
/// Accepts formats:
/// - "localhost" -> 127.0.0.1:8080
/// - "127.0.0.1" -> 127.0.0.1:8080
/// - "127.0.0.1:9000" -> 127.0.0.1:9000
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
    eprintln!("Usage: live_server [BIND_ADDR]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  BIND_ADDR    Address to bind to (default: 0.0.0.0:8080)");
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

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("camcast=debug".parse()?)
                .add_directive("live_server=debug".parse()?),
        )
        .init();

    let capture = CaptureConfig::default().resolution(640, 480);
    let broadcaster = Arc::new(FrameBroadcaster::spawn(
        SyntheticSource::new(15),
        JpegEncoder::with_quality(80),
        capture.clone(),
        BroadcasterConfig::default().frame_rate_cap(15),
    ));

    let config = ServerConfig {
        bind_addr,
        ..ServerConfig::default()
    };

    println!("Starting stream server on {}", config.bind_addr);
    println!();
    println!("=== View the stream ===");
    println!("Browser: http://localhost:{}/stream", bind_addr.port());
    println!("ffplay:  ffplay http://localhost:{}/stream", bind_addr.port());
    println!();
    println!("=== Runtime controls ===");
    println!(
        "curl \"http://localhost:{}/control?name=rotation&value=180\"",
        bind_addr.port()
    );
    println!("curl \"http://localhost:{}/status\"", bind_addr.port());
    println!();

    let server = StreamServer::new(config, broadcaster, capture);

    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
            println!("\nShutting down...");
        })
        .await?;

    Ok(())
}
