//! TICTAC CLI - Command-line interface
//!
//! Commands:
//! - serve: Run the match server
//! - bot: Join a match as a computer player

mod bot;
mod server;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tictac")]
#[command(about = "TICTAC networked two-player match server")]
struct Cli {
    /// Random seed for reproducible bots
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the match server
    Serve(server::ServerArgs),
    /// Join a match and play it with a computer player
    Bot(bot::BotArgs),
}

fn main() -> anyhow::Result<()> {
    // Initialize logging (RUST_LOG overrides the default level)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => server::run(args),
        Commands::Bot(args) => bot::run(args, cli.seed),
    }
}
