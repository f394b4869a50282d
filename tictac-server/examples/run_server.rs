//! Example to run the TICTAC server standalone
//!
//! Run with: cargo run -p tictac-server --example run_server

use tictac_server::{run_server, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let config = ServerConfig {
        port: 5555,
        ..Default::default()
    };

    println!("Starting TICTAC server on port {}", config.port);
    println!("Connect with: nc localhost {}", config.port);

    run_server(config).await
}
