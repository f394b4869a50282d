//! Bot command - join a match on a running server and play it out
//!
//! ## Architecture (4-layer granularity)
//!
//! - Level 1: run() - orchestration
//! - Level 2: play_match(), report_outcome()
//! - Level 3: handle_message(), Brain::choose()
//! - Level 4: argument types

use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;

use tictac_core::{GameResult, GameState, MinimaxAI, Move, Player, RandomAI, Snapshot};
use tictac_server::{Command, ErrorCode, ServerMessage};

// ============================================================================
// COMMAND ARGUMENTS (Level 4 - Configuration)
// ============================================================================

#[derive(Args)]
pub struct BotArgs {
    /// Server address (host:port)
    #[arg(long, default_value = "127.0.0.1:5555")]
    pub addr: String,

    /// How the bot picks its moves
    #[arg(long, value_enum, default_value_t = Strategy::Minimax)]
    pub strategy: Strategy,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Strategy {
    /// Uniformly random empty cell
    Random,
    /// Perfect play
    Minimax,
}

/// How a bot's match ended
#[derive(Clone, Debug)]
pub struct BotOutcome {
    pub player: Player,
    pub result: GameResult,
    pub moves_sent: usize,
    pub final_state: Snapshot,
}

enum Brain {
    Random(RandomAI),
    Minimax(MinimaxAI),
}

impl Brain {
    fn new(strategy: Strategy, seed: u64) -> Self {
        match strategy {
            Strategy::Random => Brain::Random(RandomAI::with_seed(seed)),
            Strategy::Minimax => Brain::Minimax(MinimaxAI::with_seed(seed)),
        }
    }

    fn choose(&mut self, state: &GameState) -> Option<Move> {
        match self {
            Brain::Random(ai) => ai.best_move(state),
            Brain::Minimax(ai) => ai.best_move(state),
        }
    }
}

/// What the read loop should do after a message
enum Step {
    Continue,
    Finished(Snapshot),
}

// ============================================================================
// LEVEL 1 - ORCHESTRATION
// ============================================================================

/// Run bot command
///
/// 1. Connect and play until the game ends
/// 2. Report the outcome
pub fn run(args: BotArgs, seed: Option<u64>) -> Result<()> {
    let seed = seed.unwrap_or_else(rand::random);
    tracing::info!(
        "Starting {:?} bot against {} (seed={})",
        args.strategy,
        args.addr,
        seed
    );

    let runtime = tokio::runtime::Runtime::new()?;
    let outcome = runtime.block_on(play_match(&args.addr, args.strategy, seed))?;

    report_outcome(&outcome);

    Ok(())
}

// ============================================================================
// LEVEL 2 - PHASES
// ============================================================================

/// Connect, take a seat and play until the game is over
pub async fn play_match(addr: &str, strategy: Strategy, seed: u64) -> Result<BotOutcome> {
    let stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("Failed to connect to {}", addr))?;
    let (read_half, mut writer) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    let first = lines
        .next_line()
        .await?
        .context("Server closed the connection before assigning a seat")?;
    let player = match ServerMessage::decode(&first) {
        Some(ServerMessage::Assigned(player)) => player,
        _ => bail!("Expected a seat assignment, got {:?}", first),
    };
    tracing::info!("Seated as player {}", player);

    let mut bot = Bot {
        player,
        brain: Brain::new(strategy, seed),
        pending: None,
        moves_sent: 0,
    };

    while let Some(line) = lines.next_line().await? {
        let Some(msg) = ServerMessage::decode(&line) else {
            tracing::warn!("Ignoring unrecognized line: {:?}", line);
            continue;
        };
        if let Step::Finished(final_state) = bot.handle_message(msg, &mut writer).await? {
            let result = GameState::from_snapshot(&final_state)
                .context("Server sent an impossible final board")?
                .result();
            return Ok(BotOutcome {
                player,
                result,
                moves_sent: bot.moves_sent,
                final_state,
            });
        }
    }

    bail!("Server closed the connection before the game ended")
}

/// Print the final board and result
fn report_outcome(outcome: &BotOutcome) {
    println!("\n=== GAME OVER ===");
    for row in &outcome.final_state.board {
        let cells: Vec<&str> = row.iter().map(|&v| format_cell(v)).collect();
        println!("  {}", cells.join(" "));
    }
    println!();

    let verdict = match outcome.result {
        GameResult::Won(p) if p == outcome.player => "won",
        GameResult::Won(_) => "lost",
        GameResult::Draw => "drew",
        GameResult::Ongoing => "stopped",
    };
    println!(
        "Player {} {} after sending {} move(s)",
        outcome.player, verdict, outcome.moves_sent
    );
}

// ============================================================================
// LEVEL 3 - STEPS
// ============================================================================

struct Bot {
    player: Player,
    brain: Brain,
    /// `moves_played` of the state we already answered with a move
    pending: Option<u8>,
    moves_sent: usize,
}

impl Bot {
    async fn handle_message(&mut self, msg: ServerMessage, writer: &mut OwnedWriteHalf) -> Result<Step> {
        match msg {
            ServerMessage::State(snapshot) => {
                if snapshot.game_over {
                    return Ok(Step::Finished(snapshot));
                }
                if snapshot.current_player != self.player
                    || self.pending == Some(snapshot.moves_played)
                {
                    return Ok(Step::Continue);
                }

                let state = GameState::from_snapshot(&snapshot)
                    .context("Server sent an impossible board")?;
                let Some(mv) = self.brain.choose(&state) else {
                    return Ok(Step::Continue);
                };

                tracing::debug!("Player {} plays ({}, {})", self.player, mv.row, mv.col);
                let command = Command::Move {
                    row: mv.row as i64,
                    col: mv.col as i64,
                };
                send_command(writer, command).await?;
                self.pending = Some(snapshot.moves_played);
                self.moves_sent += 1;
            }
            ServerMessage::Error {
                code: code @ (ErrorCode::NotYourTurn | ErrorCode::InvalidMove),
                ..
            } => {
                tracing::warn!("Move rejected ({}), resyncing", code);
                self.pending = None;
                send_command(writer, Command::GetState).await?;
            }
            ServerMessage::Error { code, detail } => {
                bail!("Server error {}: {}", code, detail.unwrap_or_default());
            }
            ServerMessage::Assigned(player) => {
                tracing::warn!("Unexpected second seat assignment ({})", player);
            }
        }
        Ok(Step::Continue)
    }
}

async fn send_command(writer: &mut OwnedWriteHalf, command: Command) -> Result<()> {
    let line = format!("{}\n", command);
    writer
        .write_all(line.as_bytes())
        .await
        .context("Failed to send to server")
}

// ============================================================================
// LEVEL 4 - FORMATTING UTILITIES
// ============================================================================

fn format_cell(value: u8) -> &'static str {
    match value {
        1 => "X",
        2 => "O",
        _ => ".",
    }
}

// ============================================================================
// TESTS
// ============================================================================
