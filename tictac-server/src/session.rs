//! One match: a board plus up to two seat-holders
//!
//! A `Session` always lives behind its own mutex (see [`crate::registry`]).
//! Every method that mutates the board also pushes the resulting state while
//! the caller still holds that lock, so the states a client receives for one
//! session are totally ordered.

use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Notify;

use tictac_core::{GameState, MoveError, Player, Snapshot};

use crate::error::RuleViolation;
use crate::protocol::ServerMessage;
use crate::registry::SessionId;

/// Process-unique id of an accepted connection
pub type ConnectionId = u64;

/// Messages a connection may have queued but not yet written
pub const OUTBOUND_QUEUE_CAPACITY: usize = 32;

/// Outbound message queue of one connection
pub type MessageSender = mpsc::Sender<ServerMessage>;

/// The connection bound to a seat
#[derive(Clone, Debug)]
pub struct SeatHandle {
    pub conn_id: ConnectionId,
    sender: MessageSender,
    /// Signalled when the queue is full; the connection is then dropped
    overflow: Arc<Notify>,
}

impl SeatHandle {
    pub fn new(conn_id: ConnectionId, sender: MessageSender, overflow: Arc<Notify>) -> Self {
        Self {
            conn_id,
            sender,
            overflow,
        }
    }

    /// Queue a message without blocking. Returns false if it was not queued,
    /// either because the writer is gone or because the peer stopped reading.
    pub fn send(&self, msg: ServerMessage) -> bool {
        match self.sender.try_send(msg) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.overflow.notify_one();
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

/// One in-progress or finished match
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    game: GameState,
    seats: [Option<SeatHandle>; 2],
}

impl Session {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            game: GameState::new(),
            seats: [None, None],
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        self.game.snapshot()
    }

    // ========================================================================
    // SEATS
    // ========================================================================

    /// Connection currently holding `player`'s seat
    pub fn occupant(&self, player: Player) -> Option<ConnectionId> {
        self.seats[player.index()].as_ref().map(|seat| seat.conn_id)
    }

    /// Lowest-numbered unfilled seat
    pub fn open_seat(&self) -> Option<Player> {
        Player::ALL
            .into_iter()
            .find(|player| self.seats[player.index()].is_none())
    }

    pub fn is_empty(&self) -> bool {
        self.seats.iter().all(Option::is_none)
    }

    /// Whether a new client may take a seat here
    pub fn accepts_joiners(&self) -> bool {
        !self.game.is_over() && self.open_seat().is_some()
    }

    /// Bind a connection to an unfilled seat. Returns false if the seat is taken.
    pub fn seat(&mut self, player: Player, handle: SeatHandle) -> bool {
        let slot = &mut self.seats[player.index()];
        if slot.is_some() {
            return false;
        }
        *slot = Some(handle);
        true
    }

    /// Clear a seat, but only if `conn_id` still holds it
    pub fn vacate(&mut self, player: Player, conn_id: ConnectionId) -> bool {
        let slot = &mut self.seats[player.index()];
        let held = matches!(slot, Some(seat) if seat.conn_id == conn_id);
        if held {
            *slot = None;
        }
        held
    }

    // ========================================================================
    // MESSAGING
    // ========================================================================

    /// Queue a message for one seat-holder, if the seat is filled
    pub fn send_to(&self, player: Player, msg: ServerMessage) {
        if let Some(seat) = &self.seats[player.index()] {
            if !seat.send(msg) {
                tracing::debug!(
                    "Session {}: seat {} (conn #{}) no longer reading",
                    self.id,
                    player,
                    seat.conn_id
                );
            }
        }
    }

    /// Queue a message for every seat-holder
    pub fn broadcast(&self, msg: &ServerMessage) {
        for player in Player::ALL {
            self.send_to(player, msg.clone());
        }
    }

    // ========================================================================
    // MOVES
    // ========================================================================

    /// Apply `player`'s move and push the new state to both seats.
    ///
    /// Rejections touch neither the board nor any other connection.
    pub fn apply_move(&mut self, player: Player, row: i64, col: i64) -> Result<Snapshot, RuleViolation> {
        if self.game.is_over() {
            return Err(RuleViolation::InvalidMove(MoveError::GameOver));
        }
        if self.game.current_player() != player {
            return Err(RuleViolation::NotYourTurn);
        }

        let (row, col) = match (usize::try_from(row), usize::try_from(col)) {
            (Ok(row), Ok(col)) => (row, col),
            // Negative coordinates are off the board
            _ => {
                return Err(RuleViolation::InvalidMove(MoveError::OutOfBounds {
                    row: usize::try_from(row).unwrap_or(usize::MAX),
                    col: usize::try_from(col).unwrap_or(usize::MAX),
                }))
            }
        };
        self.game.make_move(row, col)?;

        let snapshot = self.game.snapshot();
        tracing::debug!(
            "Session {}: player {} played ({}, {}), move {}",
            self.id,
            player,
            row,
            col,
            snapshot.moves_played
        );
        self.broadcast(&ServerMessage::State(snapshot.clone()));

        Ok(snapshot)
    }
}
