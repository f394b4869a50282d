//! TICTAC Core - Game engine and AI
//!
//! This crate provides the core game logic for TICTAC:
//! - Board geometry (3x3 grid, players, winning lines)
//! - Game state, move legality and win/draw detection
//! - Serializable state snapshots
//! - Random and minimax computer players

pub mod ai;
pub mod board;
pub mod game;

// Re-exports for convenient access
pub use ai::{MinimaxAI, RandomAI};
pub use board::{LineKind, Move, Player, WinningLine, BOARD_SIZE};
pub use game::{GameResult, GameState, MoveError, Snapshot, SnapshotError};
