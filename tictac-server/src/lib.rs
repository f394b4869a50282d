//! TICTAC Server - networked two-player match server
//!
//! This crate provides the session server:
//! - FIFO pairing of clients into matches (session registry)
//! - Per-session serialized move application
//! - Eager state push to both seat-holders
//! - Line-oriented TCP protocol

pub mod error;
mod handler;
pub mod protocol;
pub mod registry;
pub mod session;

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;

pub use error::{ProtocolError, RequestError, RuleViolation, SessionError};
pub use protocol::{Command, ErrorCode, ServerMessage};
pub use registry::{Registry, SeatAssignment, SessionId};

/// Server configuration
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    /// Drop a session once both of its seats are empty
    pub retire_empty_sessions: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 5555,
            retire_empty_sessions: true,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// Accept connections forever, one task per connection
pub async fn serve(listener: TcpListener, registry: Arc<Registry>) -> anyhow::Result<()> {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let registry = Arc::clone(&registry);
                tokio::spawn(handler::handle_connection(stream, peer, registry));
            }
            Err(e) => {
                tracing::error!("Accept error: {}", e);
            }
        }
    }
}

/// Start the session server and run until Ctrl-C
pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let addr = config.bind_addr();
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    let registry = Arc::new(Registry::new(config.retire_empty_sessions));

    tracing::info!("TICTAC server listening on {}", listener.local_addr()?);
    if !config.retire_empty_sessions {
        tracing::info!("Empty sessions are kept open for new players");
    }

    tokio::select! {
        result = serve(listener, registry) => result,
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl-C")?;
            tracing::info!("Shutting down");
            Ok(())
        }
    }
}
