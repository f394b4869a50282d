//! Server command - start the match server
//!
//! ## Architecture (4-layer granularity)
//!
//! - Level 1: run() - orchestration
//! - Level 2: configure_server(), start_server()
//! - Level 3: (delegated to tictac-server crate)

use std::net::IpAddr;

use anyhow::Result;
use clap::Args;

use tictac_server::{run_server, ServerConfig};

// ============================================================================
// COMMAND ARGUMENTS (Level 4 - Configuration)
// ============================================================================

#[derive(Args)]
pub struct ServerArgs {
    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Port number to listen on
    #[arg(long, default_value = "5555")]
    pub port: u16,

    /// Keep sessions whose players have all left, so newcomers can resume them
    #[arg(long)]
    pub keep_empty_sessions: bool,
}

// ============================================================================
// LEVEL 1 - ORCHESTRATION
// ============================================================================

/// Run server command
///
/// 1. Configure server
/// 2. Start server (blocking until Ctrl-C)
pub fn run(args: ServerArgs) -> Result<()> {
    let config = configure_server(&args);

    tracing::info!(
        "Starting TICTAC server on {}",
        config.bind_addr()
    );

    start_server(config)
}

// ============================================================================
// LEVEL 2 - PHASES
// ============================================================================

/// Configure server from command arguments
fn configure_server(args: &ServerArgs) -> ServerConfig {
    ServerConfig {
        host: args.host,
        port: args.port,
        retire_empty_sessions: !args.keep_empty_sessions,
    }
}

/// Start the server (blocking)
fn start_server(config: ServerConfig) -> Result<()> {
    // Create tokio runtime for async server
    let runtime = tokio::runtime::Runtime::new()?;

    runtime.block_on(async {
        run_server(config).await
    })
}

// ============================================================================
// TESTS
// ============================================================================
